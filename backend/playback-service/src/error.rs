/// Error types for Playback Service
///
/// Every variant maps to a fixed status and error code. Authorization and
/// upstream failures answer with generic messages; the detail only goes to
/// the log.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use error_types::{error_codes, HttpErrorResponse};
use thiserror::Error;

/// Result type for playback-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Required parameter missing or malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown channel or event
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record exists but carries no stream
    #[error("Stream source unavailable")]
    StreamUnavailable,

    /// Well-formed request the endpoint cannot act on
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Invalid or expired token
    #[error("Forbidden")]
    Forbidden,

    /// Playback switched off for the calling surface
    #[error("Playback is disabled")]
    PlaybackDisabled,

    /// License server or stream origin unreachable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => error_codes::MISSING_PARAMETER,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::StreamUnavailable => error_codes::STREAM_UNAVAILABLE,
            AppError::Unprocessable(_) => error_codes::UNPROCESSABLE,
            AppError::Forbidden => error_codes::FORBIDDEN,
            AppError::PlaybackDisabled => error_codes::PLAYBACK_DISABLED,
            AppError::Upstream(_) => error_codes::UPSTREAM_ERROR,
            AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Forbidden => "Invalid or expired token".to_string(),
            AppError::PlaybackDisabled => "Playback is temporarily unavailable".to_string(),
            AppError::Upstream(_) => "Upstream request failed".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StreamUnavailable | AppError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::PlaybackDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            AppError::Upstream(detail) => tracing::warn!(error = %detail, "Upstream request failed"),
            AppError::Internal(detail) => tracing::error!(error = %detail, "Internal error"),
            _ => {}
        }

        let body = HttpErrorResponse::new(status.as_u16(), self.code(), self.public_message());
        HttpResponse::build(status).json(body)
    }
}

impl From<crypto_core::TokenError> for AppError {
    fn from(err: crypto_core::TokenError) -> Self {
        AppError::Internal(format!("token issuance failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::BadRequest("id".into()), 400),
            (AppError::NotFound("c1".into()), 404),
            (AppError::StreamUnavailable, 422),
            (AppError::Unprocessable("kind".into()), 422),
            (AppError::Forbidden, 403),
            (AppError::PlaybackDisabled, 503),
            (AppError::Upstream("connect".into()), 502),
            (AppError::Internal("boom".into()), 500),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code().as_u16(), status, "{:?}", error);
        }
    }

    #[test]
    fn test_upstream_detail_is_not_exposed() {
        let error = AppError::Upstream("connect to https://lic.example/secret failed".into());
        assert!(!error.public_message().contains("lic.example"));
    }

    #[test]
    fn test_stream_unavailable_has_distinct_code() {
        assert_eq!(AppError::StreamUnavailable.code(), "STREAM_UNAVAILABLE");
        assert_eq!(AppError::Unprocessable("x".into()).code(), "UNPROCESSABLE");
    }
}
