use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use arcade_ingest::IngestError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("sync error: {0}")]
    Sync(#[from] arcade_sync::SyncError),

    #[error("store error: {0}")]
    Store(#[from] arcade_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) | Self::Ingest(IngestError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Ingest(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the client. Server-side failures get a fixed message;
    /// their details, which may include local paths, only go to the log.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "internal server error".to_string()
        } else {
            match self {
                Self::Ingest(e) => e.to_string(),
                other => other.to_string(),
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = Json(json!({ "ok": false, "error": self.public_message() }));
        (status, body).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
