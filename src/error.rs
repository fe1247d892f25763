//! Request-level error taxonomy.
//!
//! Every failure a handler can produce maps to a conventional HTTP status
//! with a short plain-text body. Nothing here propagates past the request
//! boundary.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the media delivery paths.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Asset absent, or its resolved path escapes the media root.
    #[error("File not found")]
    NotFound,

    /// Extension is not in any handled set.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    /// Requested quality tier is not in the fixed tier table.
    #[error("Invalid quality setting: {0}")]
    InvalidQuality(String),

    /// Range header present but unparsable or unsatisfiable.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Still-image codec normalization failed.
    #[error("Error converting image: {0}")]
    Decode(String),

    /// External encoder failed before producing a response.
    #[error("Error transcoding video: {0}")]
    Transcode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// io::Error is not Clone; rebuild it from kind and message so one failure
// can be fanned out to coalesced requests without losing its variant.
impl Clone for MediaError {
    fn clone(&self) -> Self {
        match self {
            MediaError::NotFound => MediaError::NotFound,
            MediaError::UnsupportedType(s) => MediaError::UnsupportedType(s.clone()),
            MediaError::InvalidQuality(s) => MediaError::InvalidQuality(s.clone()),
            MediaError::InvalidRange(s) => MediaError::InvalidRange(s.clone()),
            MediaError::Decode(s) => MediaError::Decode(s.clone()),
            MediaError::Transcode(s) => MediaError::Transcode(s.clone()),
            MediaError::Io(e) => MediaError::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl MediaError {
    /// HTTP status code for this error class.
    pub fn status(&self) -> StatusCode {
        match self {
            MediaError::NotFound => StatusCode::NOT_FOUND,
            MediaError::UnsupportedType(_)
            | MediaError::InvalidQuality(_)
            | MediaError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            MediaError::Decode(_) | MediaError::Transcode(_) | MediaError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(self.to_string()))
            .unwrap_or_else(|_| status.into_response())
    }
}
