/// HTTP handlers for playback endpoints
///
/// Every handler runs on both surfaces; the scope supplies the calling
/// `Surface` as app data.
pub mod catalog;
pub mod health;
pub mod license;
pub mod playback;
pub mod stream;

pub use catalog::list_channels;
pub use health::{health, metrics};
pub use license::redeem_license;
pub use playback::resolve_playback;
pub use stream::proxy_stream;

use crate::error::{AppError, Result};
use crate::models::TokenQuery;
use crate::settings::Surface;
use crate::state::AppState;

pub const NO_STORE: (&str, &str) = ("Cache-Control", "no-store");

fn ensure_enabled(state: &AppState, surface: Surface) -> Result<()> {
    if state.settings.playback_enabled(surface) {
        Ok(())
    } else {
        tracing::info!(surface = surface.as_str(), "Playback request while disabled");
        Err(AppError::PlaybackDisabled)
    }
}

fn require_token(query: &TokenQuery) -> Result<&str> {
    query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing token".to_string()))
}
