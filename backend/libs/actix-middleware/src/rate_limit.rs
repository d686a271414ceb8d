use crate::counter_store::TieredCounterStore;
use crate::metrics::RATE_LIMIT_DECISIONS_TOTAL;
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use error_types::responses;
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Counter namespace, e.g. `playback` or `license`
    pub namespace: String,
    pub max_requests: u64,
    pub window_seconds: u64,
    /// Reverse proxies in front of the service that append to
    /// `X-Forwarded-For`. Zero keys on the socket peer alone.
    #[serde(default)]
    pub trusted_proxies: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            max_requests: 60,
            window_seconds: 60,
            trusted_proxies: 0,
        }
    }
}

/// Outcome of a single rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub count: u64,
    pub limit: u64,
    pub retry_after_seconds: u64,
    pub provider: &'static str,
}

/// Fixed-window limiter over a [`TieredCounterStore`].
///
/// Windows start at multiples of `window_seconds` since the epoch, so every
/// instance sharing a backend agrees on the boundaries.
pub struct RateLimiter {
    counters: TieredCounterStore,
}

impl RateLimiter {
    pub fn new(counters: TieredCounterStore) -> Self {
        Self { counters }
    }

    pub fn in_memory() -> Self {
        Self::new(TieredCounterStore::memory_only())
    }

    pub async fn check(
        &self,
        namespace: &str,
        identifier: &str,
        limit: u64,
        window_seconds: u64,
    ) -> RateLimitDecision {
        let now = chrono::Utc::now().timestamp();
        self.check_at(namespace, identifier, limit, window_seconds, now)
            .await
    }

    pub async fn check_at(
        &self,
        namespace: &str,
        identifier: &str,
        limit: u64,
        window_seconds: u64,
        now: i64,
    ) -> RateLimitDecision {
        let window = window_seconds.max(1) as i64;
        let window_key = now.div_euclid(window);
        let window_end = (window_key + 1) * window;
        let key = format!("ratelimit:{}:{}:{}", namespace, window_key, identifier);

        let increment = self.counters.increment(&key, window_end, now).await;
        let allowed = increment.count <= limit;

        RATE_LIMIT_DECISIONS_TOTAL
            .with_label_values(&[
                namespace,
                increment.provider,
                if allowed { "allowed" } else { "rejected" },
            ])
            .inc();

        RateLimitDecision {
            allowed,
            count: increment.count,
            limit,
            retry_after_seconds: (window_end - now).max(1) as u64,
            provider: increment.provider,
        }
    }
}

/// Client identity used as the rate limit key.
///
/// Each trusted proxy appends the address it received the request from, so
/// the hop `trusted_proxies` entries from the right of `X-Forwarded-For` is
/// the one the outermost proxy saw. Anything left of it is client-supplied.
/// With no trusted proxies, or a header shorter than the proxy chain, the
/// socket peer is used.
pub fn client_identifier(req: &ServiceRequest, trusted_proxies: usize) -> String {
    if trusted_proxies > 0 {
        if let Some(ip) = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|forwarded| forwarded_hop(forwarded, trusted_proxies))
        {
            return ip.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_hop(forwarded: &str, trusted_proxies: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = forwarded.split(',').map(str::trim).collect();
    let index = hops.len().checked_sub(trusted_proxies)?;
    hops.get(index)?.parse().ok()
}

pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig, limiter: Arc<RateLimiter>) -> Self {
        Self { config, limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            config: self.config.clone(),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    config: RateLimitConfig,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let identifier = client_identifier(&req, config.trusted_proxies);
            let decision = limiter
                .check(
                    &config.namespace,
                    &identifier,
                    config.max_requests,
                    config.window_seconds,
                )
                .await;

            if !decision.allowed {
                tracing::warn!(
                    namespace = %config.namespace,
                    count = decision.count,
                    limit = decision.limit,
                    provider = decision.provider,
                    "Rate limit exceeded"
                );

                let response = HttpResponse::TooManyRequests()
                    .insert_header((
                        header::RETRY_AFTER,
                        decision.retry_after_seconds.to_string(),
                    ))
                    .json(responses::rate_limited(decision.retry_after_seconds));

                return Ok(req.into_response(response).map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
