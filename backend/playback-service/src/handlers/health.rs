/// Operational endpoints
use actix_web::HttpResponse;

use crate::error::{AppError, Result};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Prometheus scrape endpoint
pub async fn metrics() -> Result<HttpResponse> {
    let body = actix_middleware::metrics::gather_text()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
