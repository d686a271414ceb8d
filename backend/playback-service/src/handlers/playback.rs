/// Playback resolution endpoint
use actix_web::{web, HttpResponse};

use super::{ensure_enabled, NO_STORE};
use crate::error::{AppError, Result};
use crate::metrics::PLAYBACK_RESOLUTIONS_TOTAL;
use crate::models::{PlaybackQuery, PlaybackResponse};
use crate::settings::Surface;
use crate::state::AppState;

/// Resolve `?id=` into a playback descriptor
pub async fn resolve_playback(
    state: web::Data<AppState>,
    surface: web::Data<Surface>,
    query: web::Query<PlaybackQuery>,
) -> Result<HttpResponse> {
    let surface = *surface.get_ref();
    ensure_enabled(&state, surface)?;

    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing channel id".to_string()))?;

    let record = state
        .catalog
        .find(id)
        .await
        .ok_or_else(|| AppError::NotFound("Channel not found".to_string()))?;

    if record.secrets.stream_url.trim().is_empty() {
        return Err(AppError::StreamUnavailable);
    }

    let descriptor = state.resolver.resolve(&record, &surface.paths())?;

    PLAYBACK_RESOLUTIONS_TOTAL
        .with_label_values(&[surface.as_str(), descriptor.drm.drm_type.as_str()])
        .inc();
    tracing::info!(
        channel_id = %record.id,
        event = record.is_event(),
        surface = surface.as_str(),
        drm = descriptor.drm.drm_type.as_str(),
        should_proxy = descriptor.should_proxy,
        "Playback resolved"
    );

    Ok(HttpResponse::Ok().insert_header(NO_STORE).json(PlaybackResponse {
        channel_id: record.id,
        descriptor,
        proxy_token: None,
    }))
}
