//! Error types for the MUSE adapters

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::permissions::Permission;

/// Failures of the local key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failures of the hosted backend.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote backend is not configured")]
    NotConfigured,

    #[error("Remote backend has no realtime channel")]
    RealtimeUnavailable,

    #[error("Remote backend rejected the request: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Permission requests the user refused or the host could not satisfy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Permission denied: {0}")]
    Denied(Permission),

    #[error("Permission unavailable on this device: {0}")]
    Unavailable(Permission),
}

impl PermissionError {
    pub fn permission(&self) -> Permission {
        match self {
            PermissionError::Denied(p) | PermissionError::Unavailable(p) => *p,
        }
    }
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Incorrect admin passphrase")]
    Unauthorized,

    #[error("Voting has ended")]
    VotingClosed,

    #[error("{0} has already voted")]
    AlreadyVoted(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::VotingClosed => StatusCode::FORBIDDEN,
            ApiError::AlreadyVoted(_) => StatusCode::CONFLICT,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
