//! Counter backends for fixed-window rate limiting
//!
//! Two backends sit behind [`CounterStore`]:
//! - [`RedisCounterStore`]: shared across instances, `INCR` + `EXPIRE` on first hit
//! - [`MemoryCounterStore`]: per-process `DashMap`, pruned as windows expire
//!
//! [`TieredCounterStore`] combines them. Each call goes to the primary unless
//! it failed recently; any primary failure is answered by the in-process store,
//! so a counting problem never turns into a failed request.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

const PRUNE_INTERVAL_SECS: i64 = 60;

pub const MEMORY_PROVIDER: &str = "memory";
pub const REDIS_PROVIDER: &str = "redis";

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter backend error: {0}")]
    Backend(String),

    #[error("counter backend timed out after {0}ms")]
    Timeout(u64),
}

/// Post-increment count and the backend that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub count: u64,
    pub provider: &'static str,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Atomically add one to `key`. A key created by this call expires at
    /// `expires_at` (unix seconds).
    async fn increment(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<Increment, CounterError>;
}

// ============================================================================
// In-process backend
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    expires_at: i64,
}

pub struct MemoryCounterStore {
    entries: DashMap<String, WindowEntry>,
    last_prune: AtomicI64,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_prune: AtomicI64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Increment without a fallible signature; the map cannot fail.
    pub fn bump(&self, key: &str, expires_at: i64, now: i64) -> u64 {
        let count = {
            // The entry guard holds the shard lock, so concurrent bumps of the
            // same key serialize here.
            let mut entry = self
                .entries
                .entry(key.to_owned())
                .or_insert(WindowEntry {
                    count: 0,
                    expires_at,
                });

            if entry.expires_at <= now {
                *entry = WindowEntry {
                    count: 0,
                    expires_at,
                };
            }

            entry.count += 1;
            entry.count
        };

        self.maybe_prune(now);
        count
    }

    /// Drop every entry whose window has ended. Returns the number removed.
    pub fn prune(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn maybe_prune(&self, now: i64) {
        let last = self.last_prune.load(Ordering::Relaxed);
        if now - last < PRUNE_INTERVAL_SECS {
            return;
        }

        // Only one caller per interval wins the swap and pays for the sweep
        if self
            .last_prune
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let removed = self.prune(now);
            if removed > 0 {
                debug!(removed, remaining = self.entries.len(), "Pruned expired rate limit windows");
            }
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn provider(&self) -> &'static str {
        MEMORY_PROVIDER
    }

    async fn increment(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<Increment, CounterError> {
        Ok(Increment {
            count: self.bump(key, expires_at, now),
            provider: MEMORY_PROVIDER,
        })
    }
}

// ============================================================================
// Redis backend
// ============================================================================

pub struct RedisCounterStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager, timeout: Duration) -> Self {
        Self { conn, timeout }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn provider(&self) -> &'static str {
        REDIS_PROVIDER
    }

    async fn increment(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<Increment, CounterError> {
        // ConnectionManager clones share the same multiplexed connection
        let mut conn = self.conn.clone();
        let ttl_seconds = (expires_at - now).max(1);

        let pipeline = increment_pipeline(key, ttl_seconds);
        let op = async {
            let (count,): (u64,) = pipeline.query_async(&mut conn).await?;
            Ok::<u64, redis::RedisError>(count)
        };

        match timeout(self.timeout, op).await {
            Ok(Ok(count)) => Ok(Increment {
                count,
                provider: REDIS_PROVIDER,
            }),
            Ok(Err(e)) => Err(CounterError::Backend(e.to_string())),
            Err(_) => Err(CounterError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

/// `INCR` and `EXPIRE` in one `MULTI`/`EXEC`, so a counter never outlives
/// its window. The TTL is always the remaining window length.
fn increment_pipeline(key: &str, ttl_seconds: i64) -> redis::Pipeline {
    let mut pipeline = redis::pipe();
    pipeline
        .atomic()
        .incr(key, 1u64)
        .expire(key, ttl_seconds)
        .ignore();
    pipeline
}

// ============================================================================
// Primary + fallback
// ============================================================================

pub struct TieredCounterStore {
    primary: Option<Arc<dyn CounterStore>>,
    fallback: Arc<MemoryCounterStore>,
    cooldown_secs: i64,
    primary_down_until: AtomicI64,
}

impl TieredCounterStore {
    pub fn new(
        primary: Option<Arc<dyn CounterStore>>,
        fallback: Arc<MemoryCounterStore>,
        cooldown: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            cooldown_secs: cooldown.as_secs() as i64,
            primary_down_until: AtomicI64::new(i64::MIN),
        }
    }

    /// No distributed backend configured.
    pub fn memory_only() -> Self {
        Self::new(None, Arc::new(MemoryCounterStore::new()), Duration::ZERO)
    }

    /// Health check consulted on every call.
    pub fn primary_available(&self, now: i64) -> bool {
        self.primary.is_some() && now >= self.primary_down_until.load(Ordering::Relaxed)
    }

    pub fn fallback(&self) -> &MemoryCounterStore {
        &self.fallback
    }

    pub async fn increment(&self, key: &str, expires_at: i64, now: i64) -> Increment {
        if let Some(primary) = self.primary.as_ref().filter(|_| self.primary_available(now)) {
            match primary.increment(key, expires_at, now).await {
                Ok(increment) => return increment,
                Err(err) => {
                    warn!(
                        error = %err,
                        provider = primary.provider(),
                        cooldown_secs = self.cooldown_secs,
                        "Rate limit backend unavailable, counting in-process"
                    );
                    self.primary_down_until
                        .store(now.saturating_add(self.cooldown_secs), Ordering::Relaxed);
                }
            }
        }

        Increment {
            count: self.fallback.bump(key, expires_at, now),
            provider: MEMORY_PROVIDER,
        }
    }
}
