use redis::{Client as RedisClient, RedisResult};
use tracing::warn;

use crate::universities::directory::DirectoryEntry;

/// Redis cache in front of the external directory.
///
/// Entries expire after `ttl_secs`; nothing else invalidates them. Redis
/// failures are logged and treated as a miss, never surfaced to the caller.
#[derive(Clone)]
pub struct DirectoryCache {
    client: Option<RedisClient>,
    ttl_secs: u64,
}

impl DirectoryCache {
    pub fn new(client: Option<RedisClient>, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    pub fn disabled() -> Self {
        Self::new(None, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some() && self.ttl_secs > 0
    }

    pub async fn get(&self, name: &str, country: Option<&str>) -> Option<Vec<DirectoryEntry>> {
        let client = self.client.as_ref().filter(|_| self.is_enabled())?;
        let key = cache_key(name, country);

        match read_key(client, &key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Discarding unreadable directory cache entry {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Directory cache read failed: {e}");
                None
            }
        }
    }

    pub async fn put(&self, name: &str, country: Option<&str>, entries: &[DirectoryEntry]) {
        let Some(client) = self.client.as_ref().filter(|_| self.is_enabled()) else {
            return;
        };
        let key = cache_key(name, country);
        let payload = match serde_json::to_string(entries) {
            Ok(p) => p,
            Err(e) => {
                warn!("Directory cache serialisation failed: {e}");
                return;
            }
        };

        if let Err(e) = write_key(client, &key, &payload, self.ttl_secs).await {
            warn!("Directory cache write failed: {e}");
        }
    }
}

async fn read_key(client: &RedisClient, key: &str) -> RedisResult<Option<String>> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("GET").arg(key).query_async(&mut conn).await
}

async fn write_key(
    client: &RedisClient,
    key: &str,
    payload: &str,
    ttl_secs: u64,
) -> RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("SET")
        .arg(key)
        .arg(payload)
        .arg("EX")
        .arg(ttl_secs)
        .query_async(&mut conn)
        .await
}

/// Case- and whitespace-insensitive key for a directory query.
pub fn cache_key(name: &str, country: Option<&str>) -> String {
    fn norm(s: &str) -> String {
        s.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
    format!(
        "directory:v1:{}:{}",
        norm(name),
        country.map(norm).unwrap_or_default()
    )
}
