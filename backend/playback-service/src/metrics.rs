/// Service-level Prometheus metrics
///
/// HTTP and rate limit metrics live in `actix_middleware::metrics`; these
/// cover what only this service knows about.
use prometheus::IntCounterVec;

lazy_static::lazy_static! {
    pub static ref LICENSE_REDEMPTIONS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "playback_license_redemptions_total",
        "License proxy redemptions by surface, token kind and outcome",
        &["surface", "kind", "outcome"]
    ).unwrap();

    pub static ref STREAM_PROXY_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "playback_stream_proxy_requests_total",
        "Stream proxy requests by surface and body handling",
        &["surface", "mode"]
    ).unwrap();

    pub static ref PLAYBACK_RESOLUTIONS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "playback_resolutions_total",
        "Resolved playback descriptors by surface and DRM type",
        &["surface", "drm"]
    ).unwrap();
}
