//! Server and ingress error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use logrelay_core::RecordError;
use serde_json::json;
use thiserror::Error;

/// Errors from starting or running the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// The bound listener has no usable local address.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
    /// The metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}

/// Why a `POST /log` request was refused.
#[derive(Debug, Error)]
pub enum IngressError {
    /// Body is not a valid record.
    #[error(transparent)]
    Invalid(#[from] RecordError),
    /// The broadcast queue is full.
    #[error("broadcast queue is full")]
    Busy,
    /// The relay is shutting down.
    #[error("relay is shutting down")]
    ShuttingDown,
}

impl IngressError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Busy | Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
