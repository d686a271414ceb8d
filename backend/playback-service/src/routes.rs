/// Route table
///
/// The web surface lives under `/api`, the mobile surface under
/// `/api/mobile` behind the API key gate. Both serve the same handlers;
/// each scope tells them which `Surface` they are answering for.
use actix_middleware::{
    ApiKeyGate, ApiKeyMiddleware, RateLimitConfig, RateLimitMiddleware, RateLimiter,
};
use actix_web::{middleware::DefaultHeaders, web};
use std::sync::Arc;

use crate::handlers;
use crate::settings::Surface;

/// Middleware dependencies shared by every worker
#[derive(Clone)]
pub struct RouteDeps {
    pub api_key_gate: Arc<ApiKeyGate>,
    pub limiter: Arc<RateLimiter>,
    pub playback_policy: RateLimitConfig,
    pub license_policy: RateLimitConfig,
}

pub fn configure(cfg: &mut web::ServiceConfig, deps: &RouteDeps) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/metrics", web::get().to(handlers::metrics))
        // Must be registered before `/api`; a matched scope never falls through
        .service(
            web::scope("/api/mobile")
                .app_data(web::Data::new(Surface::Mobile))
                .wrap(ApiKeyMiddleware::new(deps.api_key_gate.clone()))
                .wrap(no_store())
                .configure(|cfg| surface_routes(cfg, deps)),
        )
        .service(
            web::scope("/api")
                .app_data(web::Data::new(Surface::Web))
                .wrap(no_store())
                .configure(|cfg| surface_routes(cfg, deps)),
        );
}

fn surface_routes(cfg: &mut web::ServiceConfig, deps: &RouteDeps) {
    cfg.route("/channels", web::get().to(handlers::list_channels))
        .service(
            web::resource("/playback")
                .wrap(RateLimitMiddleware::new(
                    deps.playback_policy.clone(),
                    deps.limiter.clone(),
                ))
                .route(web::get().to(handlers::resolve_playback)),
        )
        .service(
            web::resource("/license")
                .wrap(RateLimitMiddleware::new(
                    deps.license_policy.clone(),
                    deps.limiter.clone(),
                ))
                .route(web::get().to(handlers::redeem_license))
                .route(web::post().to(handlers::redeem_license)),
        )
        .route("/stream", web::get().to(handlers::proxy_stream));
}

/// Also covers error responses produced by inner middleware
fn no_store() -> DefaultHeaders {
    DefaultHeaders::new().add(handlers::NO_STORE)
}
