use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use station_proto::protocol::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

/// Per-request failures.  None of these touch the shared playhead or the
/// presence registry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid admin action: {0:?}")]
    InvalidAction(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("not a playlist track: {0}")]
    TrackNotFound(String),

    #[error("media file missing: {0}")]
    MediaMissing(String),

    #[error("range not satisfiable for {size}-byte file")]
    RangeNotSatisfiable { size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidAction(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::TrackNotFound(_) | ApiError::MediaMissing(_) => StatusCode::NOT_FOUND,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients.  Internal detail stays in the log.
    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidAction(_) => "Invalid action",
            ApiError::InvalidBody(_) => "Invalid request body",
            ApiError::TrackNotFound(_) | ApiError::MediaMissing(_) => "Audio file not found",
            ApiError::RangeNotSatisfiable { .. } => "Range not satisfiable",
            ApiError::Io(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let mut response = (status, Json(ErrorBody::new(self.public_message()))).into_response();
        if let ApiError::RangeNotSatisfiable { size } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
