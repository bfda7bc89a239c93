//! Custom error types for the portal service
//!
//! Every handler error is converted to a user-facing Turkish message at
//! the endpoint boundary; internals are only logged. Voice endpoints do
//! not use this type at all: a phone call cannot render an HTTP error,
//! so they always answer with a spoken message document instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use common::error::RowStoreError;

/// Custom error type for the portal service
#[derive(Error, Debug)]
pub enum PortalError {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No matching record, session or code
    #[error("Not found: {0}")]
    NotFound(String),

    /// A time-boxed resource lapsed
    #[error("Expired: {0}")]
    Expired(String),

    /// Too many OTP requests inside the rolling window
    #[error("Rate limited, retry in {minutes} minutes")]
    RateLimited { minutes: i64 },

    /// Too many failed verification attempts; a fresh code is required
    #[error("Attempts exceeded")]
    AttemptsExceeded,

    /// Session cookie missing, invalid or expired
    #[error("Unauthorized")]
    Unauthorized,

    /// Row-store or telephony gateway failure
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<RowStoreError> for PortalError {
    fn from(err: RowStoreError) -> Self {
        PortalError::Upstream(err.to_string())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PortalError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PortalError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            // Expired and NotFound share a status family; they are only
            // distinguished in the logs.
            PortalError::Expired(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PortalError::RateLimited { minutes } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("Çok fazla deneme yapıldı. {minutes} dakika sonra tekrar deneyin."),
            ),
            PortalError::AttemptsExceeded => (
                StatusCode::BAD_REQUEST,
                "Çok fazla hatalı deneme. Yeni kod talep edin.".to_string(),
            ),
            PortalError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Oturum geçersiz veya süresi dolmuş".to_string(),
            ),
            PortalError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "Sunucu hatası. Lütfen tekrar deneyin.".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for portal results
pub type PortalResult<T> = Result<T, PortalError>;
