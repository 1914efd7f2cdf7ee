use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use beamline_protocol::{CodecError, SdpType};
use serde_json::json;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed session description: {0}")]
    Decode(#[from] CodecError),

    #[error("Expected an offer, got {0}")]
    UnexpectedDescription(SdpType),

    #[error("Negotiation failed during {stage}: {source}")]
    Negotiation {
        stage: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Relay failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Publisher session ended before producing a relay track")]
    RelayUnavailable,

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Session request queue closed")]
    QueueClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a transport failure with the negotiation step it happened in
    pub(crate) fn during(stage: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| Error::Negotiation { stage, source }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Error::QueueClosed => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
