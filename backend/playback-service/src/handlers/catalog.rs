/// Catalog browse endpoint
use actix_web::{web, HttpResponse};

use crate::error::Result;
use crate::services::sanitizer::sanitize_many;
use crate::state::AppState;

/// List channels and events, public fields only
pub async fn list_channels(state: web::Data<AppState>) -> Result<HttpResponse> {
    let records = state.catalog.list().await;
    Ok(HttpResponse::Ok().json(sanitize_many(&records)))
}
