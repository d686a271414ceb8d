/// Process bootstrap: logging, secrets, backends and shared state
use actix_middleware::{
    ApiKeyGate, CounterStore, MemoryCounterStore, RateLimitConfig, RateLimiter,
    RedisCounterStore, TieredCounterStore,
};
use actix_web::web;
use anyhow::{bail, Context, Result};
use crypto_core::TokenSigner;
use redis_utils::{RedisPool, RedisSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::catalog::JsonCatalog;
use crate::config::{Config, LogFormat, PolicyConfig, RateLimitSettings};
use crate::routes::RouteDeps;
use crate::services::UpstreamClient;
use crate::settings::StaticSettings;
use crate::state::AppState;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Initialize tracing
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,playback_service=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Production refuses to start without a configured secret; elsewhere a
/// random per-process key is used and tokens do not survive a restart.
pub fn build_signer(config: &Config) -> Result<TokenSigner> {
    match config.tokens.secret.as_deref() {
        Some(secret) => {
            TokenSigner::new(secret).context("PLAYBACK_TOKEN_SECRET is unusable")
        }
        None if config.app.is_production() => {
            bail!("PLAYBACK_TOKEN_SECRET must be set when APP_ENV=production")
        }
        None => {
            warn!("PLAYBACK_TOKEN_SECRET not set; using an ephemeral signing key");
            TokenSigner::ephemeral().context("failed to generate ephemeral signing key")
        }
    }
}

/// Redis when configured and reachable, in-process counters otherwise.
pub async fn build_counter_store(settings: &RateLimitSettings) -> TieredCounterStore {
    let fallback = Arc::new(MemoryCounterStore::new());

    let Some(url) = settings.redis_url.clone() else {
        info!("RATE_LIMIT_REDIS_URL not set; rate limit counters are per-process");
        return TieredCounterStore::new(None, fallback, settings.redis_cooldown);
    };

    let redis_settings = RedisSettings {
        url,
        auth_token: settings.redis_token.clone(),
        connect_timeout: REDIS_CONNECT_TIMEOUT,
    };

    match RedisPool::connect(&redis_settings).await {
        Ok(pool) => {
            let primary: Arc<dyn CounterStore> =
                Arc::new(RedisCounterStore::new(pool.manager(), settings.redis_timeout));
            TieredCounterStore::new(Some(primary), fallback, settings.redis_cooldown)
        }
        Err(e) => {
            warn!(error = %e, "Rate limit Redis unavailable at startup; counters are per-process");
            TieredCounterStore::new(None, fallback, settings.redis_cooldown)
        }
    }
}

pub fn rate_limit_policy(
    namespace: &str,
    policy: &PolicyConfig,
    settings: &RateLimitSettings,
) -> RateLimitConfig {
    RateLimitConfig {
        namespace: namespace.to_string(),
        max_requests: policy.max_requests,
        window_seconds: policy.window_seconds,
        trusted_proxies: settings.trusted_proxies,
    }
}

/// Build everything the HTTP workers share
pub async fn build(config: &Config) -> Result<(web::Data<AppState>, RouteDeps)> {
    let signer = Arc::new(build_signer(config)?);
    let catalog = Arc::new(JsonCatalog::load(&config.catalog.dir)?);
    let settings = Arc::new(StaticSettings::new(config.playback));
    let upstream = UpstreamClient::new(config.upstream.timeout)?;

    let state = AppState::new(catalog, settings, signer, config.tokens.ttl_secs, upstream);

    let api_key_gate = ApiKeyGate::new(config.mobile.api_key.clone());
    if !api_key_gate.is_configured() {
        warn!("MOBILE_API_KEY not set; mobile API answers 503");
    }

    let limiter = RateLimiter::new(build_counter_store(&config.rate_limit).await);

    let deps = RouteDeps {
        api_key_gate: Arc::new(api_key_gate),
        limiter: Arc::new(limiter),
        playback_policy: rate_limit_policy(
            "playback",
            &config.rate_limit.playback,
            &config.rate_limit,
        ),
        license_policy: rate_limit_policy(
            "license",
            &config.rate_limit.license,
            &config.rate_limit,
        ),
    };

    Ok((web::Data::new(state), deps))
}
