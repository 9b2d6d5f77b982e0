//! Error types for the vault notes service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use vault_notes_types::RpcResponse;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials, unknown agent or signature mismatch.
    /// Deliberately carries no detail.
    #[error("Forbidden")]
    AuthenticationDenied,

    #[error("{0}")]
    NotFound(&'static str),

    /// Durable storage error during append/list or an index lookup
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The room actor stopped before answering
    #[error("Room unavailable: {0}")]
    RoomUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthenticationDenied => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            other => {
                log::error!("[HTTP] Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(RpcResponse::<()>::err(other.to_string())),
                )
                    .into_response()
            }
        }
    }
}
