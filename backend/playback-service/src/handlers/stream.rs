/// Stream proxy endpoint
use actix_web::{http::StatusCode, web, HttpResponse};
use bytes::{Bytes, BytesMut};
use crypto_core::TokenGrant;
use futures::{stream, Stream, StreamExt};

use super::{ensure_enabled, require_token, NO_STORE};
use crate::error::{AppError, Result};
use crate::metrics::STREAM_PROXY_REQUESTS_TOTAL;
use crate::models::TokenQuery;
use crate::services::stream_proxy::{
    is_playlist, starts_like_playlist, MAX_PLAYLIST_BYTES, PLAYLIST_CONTENT_TYPE, SNIFF_BYTES,
};
use crate::services::upstream::content_type_of;
use crate::settings::Surface;
use crate::state::AppState;

/// Relay the stream resource sealed in `?token=`
pub async fn proxy_stream(
    state: web::Data<AppState>,
    surface: web::Data<Surface>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse> {
    let surface = *surface.get_ref();
    ensure_enabled(&state, surface)?;
    let token = require_token(&query)?;

    let grant = state.signer.verify(token).ok_or(AppError::Forbidden)?;
    let kind = grant.kind();
    let TokenGrant::StreamProxy {
        stream_url,
        stream_headers,
    } = grant
    else {
        return Err(AppError::Unprocessable(format!(
            "{} token is not accepted here",
            kind
        )));
    };

    let upstream = state
        .upstream
        .fetch(&stream_url, &stream_headers)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|_| AppError::Upstream("invalid upstream status".to_string()))?;
    let content_type = content_type_of(&upstream);
    let labelled_playlist = is_playlist(&stream_url, content_type.as_deref());
    let content_length = upstream.content_length();
    // Relative references resolve against the final URL after redirects
    let base = upstream.url().clone();
    let mut body = upstream.bytes_stream();

    let mut head = BytesMut::new();
    if status.is_success() && !labelled_playlist {
        while head.len() < SNIFF_BYTES {
            match body.next().await {
                Some(chunk) => head.extend_from_slice(&chunk.map_err(upstream_body_error)?),
                None => break,
            }
        }
    }

    if status.is_success() && (labelled_playlist || starts_like_playlist(&head)) {
        if content_length.is_some_and(|len| len > MAX_PLAYLIST_BYTES as u64) {
            return Err(playlist_too_large());
        }
        let playlist = read_capped(head, &mut body).await?;
        let playlist = String::from_utf8(playlist.to_vec())
            .map_err(|_| AppError::Upstream("playlist is not valid UTF-8".to_string()))?;

        let rewritten = state.rewriter.rewrite(
            &playlist,
            &base,
            &stream_headers,
            &surface.paths().proxy_path,
            chrono::Utc::now().timestamp(),
        )?;

        STREAM_PROXY_REQUESTS_TOTAL
            .with_label_values(&[surface.as_str(), "playlist"])
            .inc();

        return Ok(HttpResponse::build(status)
            .insert_header(NO_STORE)
            .content_type(PLAYLIST_CONTENT_TYPE)
            .body(rewritten));
    }

    STREAM_PROXY_REQUESTS_TOTAL
        .with_label_values(&[surface.as_str(), "passthrough"])
        .inc();

    let mut response = HttpResponse::build(status);
    response.insert_header(NO_STORE);
    if let Some(content_type) = content_type {
        response.content_type(content_type);
    }

    // Sniffed bytes go out first, then the rest of the upstream body
    let head = stream::iter((!head.is_empty()).then(|| Ok(head.freeze())));
    Ok(response.streaming(head.chain(body)))
}

async fn read_capped<S>(head: BytesMut, body: &mut S) -> Result<Bytes>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut buffer = head;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(upstream_body_error)?;
        if buffer.len() + chunk.len() > MAX_PLAYLIST_BYTES {
            return Err(playlist_too_large());
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn upstream_body_error(err: reqwest::Error) -> AppError {
    AppError::Upstream(err.without_url().to_string())
}

fn playlist_too_large() -> AppError {
    AppError::Upstream(format!("playlist exceeds {} bytes", MAX_PLAYLIST_BYTES))
}
