use anyhow::{Context, Result};

use crate::matching::MatchThresholds;

const DEFAULT_DIRECTORY_URL: &str = "http://universities.hipolabs.com";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Directory search results are cached in Redis only when this is set.
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    pub directory_url: String,
    pub directory_cache_ttl_secs: u64,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub allowed_origin: Option<String>,
    pub match_thresholds: MatchThresholds,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = MatchThresholds::default();
        let match_thresholds = MatchThresholds {
            safe: parse_env("MATCH_SAFE_THRESHOLD", defaults.safe)?,
            target: parse_env("MATCH_TARGET_THRESHOLD", defaults.target)?,
            ..defaults
        };
        if match_thresholds.target > match_thresholds.safe {
            anyhow::bail!("MATCH_TARGET_THRESHOLD must not exceed MATCH_SAFE_THRESHOLD");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            directory_url: optional_env("UNIVERSITY_DIRECTORY_URL")
                .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
            directory_cache_ttl_secs: parse_env("DIRECTORY_CACHE_TTL_SECS", 3600)?,
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 168)?,
            cookie_secure: parse_env("COOKIE_SECURE", false)?,
            allowed_origin: optional_env("ALLOWED_ORIGIN"),
            match_thresholds,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
