mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod guidance;
mod llm_client;
mod matching;
mod models;
mod profile;
mod routes;
mod shortlist;
mod state;
mod universities;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::matching::RuleBasedScorer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::universities::cache::DirectoryCache;
use crate::universities::directory::HipolabsDirectory;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Counsel API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and apply migrations
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize Redis (optional)
    let directory_cache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            info!(
                "Redis directory cache enabled (ttl {}s)",
                config.directory_cache_ttl_secs
            );
            DirectoryCache::new(Some(client), config.directory_cache_ttl_secs)
        }
        None => {
            warn!("REDIS_URL not set; directory results will not be cached");
            DirectoryCache::disabled()
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let directory = Arc::new(HipolabsDirectory::new(config.directory_url.clone()));
    info!("University directory: {}", config.directory_url);

    let match_scorer = Arc::new(RuleBasedScorer::new(config.match_thresholds));
    info!(
        "Match thresholds: safe >= {}, target >= {}",
        config.match_thresholds.safe, config.match_thresholds.target
    );

    // Build app state
    let state = AppState {
        db,
        llm,
        config: config.clone(),
        match_scorer,
        directory,
        directory_cache,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Session cookies need a credentialed CORS policy for one explicit origin;
/// without `ALLOWED_ORIGIN` the API is open (local development).
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let Some(origin) = &config.allowed_origin else {
        warn!("ALLOWED_ORIGIN not set; using permissive CORS");
        return Ok(CorsLayer::permissive());
    };

    let origin = HeaderValue::from_str(origin).context("Invalid ALLOWED_ORIGIN")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}
