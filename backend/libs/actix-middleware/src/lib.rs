//! # Actix Middleware Library
//!
//! Shared middleware components for playback services
//!
//! ## Modules
//! - `counter_store`: Redis and in-process counters behind one trait
//! - `rate_limit`: Fixed-window rate limiting
//! - `api_key`: Shared-secret header gate
//! - `metrics`: Prometheus metrics middleware

pub mod api_key;
pub mod counter_store;
pub mod metrics;
pub mod rate_limit;

pub use api_key::{ApiKeyGate, ApiKeyMiddleware, GateRejection, API_KEY_HEADER};
pub use counter_store::{
    CounterError, CounterStore, Increment, MemoryCounterStore, RedisCounterStore,
    TieredCounterStore,
};
pub use metrics::MetricsMiddleware;
pub use rate_limit::{
    client_identifier, RateLimitConfig, RateLimitDecision, RateLimitMiddleware, RateLimiter,
};
