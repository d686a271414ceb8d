//! Shared HTTP error body for playback services
//!
//! Every rejection produced by the service or its middleware is rendered with
//! [`HttpErrorResponse`], so clients see one error shape regardless of which
//! layer refused the request.
//!
//! # Design Principles
//!
//! 1. **Stable codes**: clients branch on `code`, never on `message`
//! 2. **No secrets**: messages never echo stream URLs, headers or key material
//! 3. **Generic auth failures**: 401/403 bodies do not explain why

use serde::{Deserialize, Serialize};

/// Standard HTTP error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error code for client handling
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional structured context (retry hints and similar)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Timestamp of the error
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HttpErrorResponse {
    /// Create new HTTP error response
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Error codes shared between the service and the middleware crate
pub mod error_codes {
    pub const MISSING_PARAMETER: &str = "MISSING_PARAMETER";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STREAM_UNAVAILABLE: &str = "STREAM_UNAVAILABLE";
    pub const UNPROCESSABLE: &str = "UNPROCESSABLE";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const PLAYBACK_DISABLED: &str = "PLAYBACK_DISABLED";
    pub const NOT_CONFIGURED: &str = "NOT_CONFIGURED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Helper functions for the responses produced outside the service handlers
pub mod responses {
    use super::*;

    /// Create an unauthorized response
    pub fn unauthorized() -> HttpErrorResponse {
        HttpErrorResponse::new(401, error_codes::UNAUTHORIZED, "Authentication required")
    }

    /// Create a "not configured" response for a server-side misconfiguration
    pub fn not_configured(what: &str) -> HttpErrorResponse {
        HttpErrorResponse::new(
            503,
            error_codes::NOT_CONFIGURED,
            format!("{} is not configured on this server", what),
        )
    }

    /// Create a rate limit response
    pub fn rate_limited(retry_after_seconds: u64) -> HttpErrorResponse {
        HttpErrorResponse::new(429, error_codes::RATE_LIMITED, "Too many requests")
            .with_details(serde_json::json!({ "retry_after": retry_after_seconds }))
    }
}
