/// License proxy endpoint
///
/// Redeems a license token: ClearKey grants are answered locally, upstream
/// grants are forwarded once with the sealed headers and relayed back as-is.
use actix_web::{http::header::CONTENT_TYPE, http::StatusCode, web, HttpRequest, HttpResponse};
use crypto_core::TokenGrant;

use super::{ensure_enabled, require_token, NO_STORE};
use crate::error::{AppError, Result};
use crate::metrics::LICENSE_REDEMPTIONS_TOTAL;
use crate::models::TokenQuery;
use crate::services::license::clearkey_license;
use crate::settings::Surface;
use crate::state::AppState;

fn record_outcome(surface: Surface, kind: &str, outcome: &str) {
    LICENSE_REDEMPTIONS_TOTAL
        .with_label_values(&[surface.as_str(), kind, outcome])
        .inc();
}

/// `GET|POST ?token=`; POST carries the DRM challenge
pub async fn redeem_license(
    req: HttpRequest,
    state: web::Data<AppState>,
    surface: web::Data<Surface>,
    query: web::Query<TokenQuery>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let surface = *surface.get_ref();
    ensure_enabled(&state, surface)?;
    let token = require_token(&query)?;

    let Some(grant) = state.signer.verify(token) else {
        record_outcome(surface, "unknown", "forbidden");
        return Err(AppError::Forbidden);
    };
    let kind = grant.kind();

    match grant {
        TokenGrant::ClearkeyLicense { key_id, key } => {
            let license = clearkey_license(&key_id, &key).map_err(|e| {
                record_outcome(surface, kind, "malformed");
                AppError::Unprocessable(e.to_string())
            })?;

            record_outcome(surface, kind, "issued");
            Ok(HttpResponse::Ok().insert_header(NO_STORE).json(license))
        }
        TokenGrant::WidevineLicense {
            license_url,
            license_headers,
        } => {
            let content_type = req
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());

            let upstream = state
                .upstream
                .forward(
                    req.method().as_str(),
                    &license_url,
                    &license_headers,
                    content_type,
                    body,
                )
                .await
                .map_err(|e| {
                    record_outcome(surface, kind, "upstream_error");
                    AppError::Upstream(e.to_string())
                })?;

            let status = StatusCode::from_u16(upstream.status)
                .map_err(|_| AppError::Upstream(format!("invalid status {}", upstream.status)))?;

            record_outcome(surface, kind, "forwarded");
            tracing::debug!(status = upstream.status, surface = surface.as_str(), "License forwarded");

            let mut response = HttpResponse::build(status);
            response.insert_header(NO_STORE);
            if let Some(content_type) = upstream.content_type {
                response.content_type(content_type);
            }
            Ok(response.body(upstream.body))
        }
        TokenGrant::StreamProxy { .. } => {
            record_outcome(surface, kind, "wrong_kind");
            Err(AppError::Unprocessable(format!(
                "{} token is not accepted here",
                kind
            )))
        }
    }
}
