use anyhow::{bail, Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, IntoConnectionInfo};
use std::time::Duration;
use tracing::info;

/// Connection settings for a Redis-compatible counter store.
#[derive(Clone)]
pub struct RedisSettings {
    pub url: String,
    /// Bearer/password credential for managed Redis offerings. Overrides any
    /// password embedded in `url`.
    pub auth_token: Option<String>,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSettings")
            .field("url", &redact_url(&self.url))
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Redis connection handle.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own;
/// cloning it is cheap and every clone shares the same socket.
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let info = connection_info(settings)?;
        let client = Client::open(info).context("failed to construct Redis client")?;

        let manager = tokio::time::timeout(settings.connect_timeout, ConnectionManager::new(client))
            .await
            .context("timed out connecting to Redis")?
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connected at {}", redact_url(&settings.url));
        Ok(Self { manager })
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn connection_info(settings: &RedisSettings) -> Result<ConnectionInfo> {
    if settings.url.trim().is_empty() {
        bail!("Redis URL is empty");
    }

    let mut info: ConnectionInfo = settings
        .url
        .as_str()
        .into_connection_info()
        .context("failed to parse Redis connection string")?;

    if let Some(token) = settings.auth_token.as_deref().filter(|t| !t.trim().is_empty()) {
        info.redis.password = Some(token.trim().to_string());
    }

    Ok(info)
}

/// Strip credentials from a connection URL so it can be logged.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => "<invalid redis url>".to_string(),
    }
}
