/// Configuration management for playback-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Secrets are optional at this layer; startup decides whether their absence
/// is fatal.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub tokens: TokenConfig,
    pub mobile: MobileConfig,
    pub rate_limit: RateLimitSettings,
    pub upstream: UpstreamConfig,
    pub catalog: CatalogConfig,
    pub playback: PlaybackFlags,
    pub log_format: LogFormat,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Option<String>,
    pub ttl_secs: i64,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[derive(Clone)]
pub struct MobileConfig {
    pub api_key: Option<String>,
}

impl fmt::Debug for MobileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MobileConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct PolicyConfig {
    pub max_requests: u64,
    pub window_seconds: u64,
}

#[derive(Clone)]
pub struct RateLimitSettings {
    pub redis_url: Option<String>,
    pub redis_token: Option<String>,
    pub redis_timeout: Duration,
    /// How long to skip Redis after a failed call
    pub redis_cooldown: Duration,
    /// Proxies whose `X-Forwarded-For` entries identify the client
    pub trusted_proxies: usize,
    pub playback: PolicyConfig,
    pub license: PolicyConfig,
}

impl fmt::Debug for RateLimitSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitSettings")
            .field(
                "redis_url",
                &self.redis_url.as_deref().map(redis_utils::redact_url),
            )
            .field("redis_token", &self.redis_token.as_ref().map(|_| "<redacted>"))
            .field("redis_timeout", &self.redis_timeout)
            .field("redis_cooldown", &self.redis_cooldown)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("playback", &self.playback)
            .field("license", &self.license)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackFlags {
    pub web_enabled: bool,
    pub mobile_enabled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read on its own so tracing can be up before the rest of the
    /// configuration is parsed.
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("PLAYBACK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PLAYBACK_PORT", 8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            tokens: TokenConfig {
                secret: non_empty_var("PLAYBACK_TOKEN_SECRET"),
                ttl_secs: env_or("PLAYBACK_TOKEN_TTL_SECS", 3600),
            },
            mobile: MobileConfig {
                api_key: non_empty_var("MOBILE_API_KEY"),
            },
            rate_limit: RateLimitSettings {
                redis_url: non_empty_var("RATE_LIMIT_REDIS_URL"),
                redis_token: non_empty_var("RATE_LIMIT_REDIS_TOKEN"),
                redis_timeout: Duration::from_millis(env_or("RATE_LIMIT_REDIS_TIMEOUT_MS", 250)),
                redis_cooldown: Duration::from_secs(env_or("RATE_LIMIT_REDIS_COOLDOWN_SECS", 30)),
                trusted_proxies: env_or("RATE_LIMIT_TRUSTED_PROXIES", 0),
                playback: PolicyConfig {
                    max_requests: env_or("RATE_LIMIT_PLAYBACK_MAX", 30),
                    window_seconds: env_or("RATE_LIMIT_PLAYBACK_WINDOW_SECS", 60),
                },
                license: PolicyConfig {
                    max_requests: env_or("RATE_LIMIT_LICENSE_MAX", 120),
                    window_seconds: env_or("RATE_LIMIT_LICENSE_WINDOW_SECS", 60),
                },
            },
            upstream: UpstreamConfig {
                timeout: Duration::from_millis(env_or("UPSTREAM_TIMEOUT_MS", 10_000)),
            },
            catalog: CatalogConfig {
                dir: PathBuf::from(
                    std::env::var("CATALOG_DIR").unwrap_or_else(|_| "./data".to_string()),
                ),
            },
            playback: PlaybackFlags {
                web_enabled: env_flag("PLAYBACK_WEB_ENABLED", true),
                mobile_enabled: env_flag("PLAYBACK_MOBILE_ENABLED", true),
            },
            log_format: LogFormat::from_env(),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, "Invalid value in environment, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
