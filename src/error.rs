//! Server-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mixdown_lib::{FfmpegError, MixError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Mix(#[from] MixError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// The multipart form is missing fields or carries the wrong files
    #[error("{0}")]
    BadUpload(String),

    #[error("File not found")]
    NotFound,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Server busy, try again later")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Mix(MixError::Metadata(_)) | ServerError::BadUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ServerError::Mix(e @ MixError::Metadata(_)) => e.to_string(),
            ServerError::Mix(e) => format!("Error processing audio: {}", e),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_lib::{CompositionError, MetadataFormatError, RenderError};

    #[test]
    fn test_status_mapping() {
        let metadata: ServerError =
            MixError::from(MetadataFormatError::new("expected a JSON array")).into();
        assert_eq!(metadata.status(), StatusCode::BAD_REQUEST);

        let composition: ServerError =
            MixError::from(CompositionError::NoUsableBackgrounds { supplied: 2 }).into();
        assert_eq!(composition.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let render: ServerError = MixError::from(RenderError::Cancelled).into();
        assert_eq!(render.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ServerError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::PayloadTooLarge.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ServerError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServerError::BadUpload("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_messages() {
        let render: ServerError = MixError::from(RenderError::Timeout { secs: 600 }).into();
        assert_eq!(
            render.message(),
            "Error processing audio: Render failed: render timed out after 600s"
        );

        let metadata: ServerError = MixError::from(MetadataFormatError::new("bad")).into();
        assert_eq!(metadata.message(), "Invalid background audio metadata: bad");
    }
}
