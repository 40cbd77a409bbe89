//! HTTP error type and its mapping from [`VoiceError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use spoke_voice::VoiceError;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict (requested engine cannot be loaded).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::BadRequest(msg) | Self::Conflict(msg) | Self::Internal(msg) => msg,
        };

        let body = ErrorBody {
            error,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<VoiceError> for HttpError {
    fn from(err: VoiceError) -> Self {
        match err {
            e @ VoiceError::InvalidSetting { .. } => Self::BadRequest(e.to_string()),
            e @ VoiceError::EngineUnavailable { .. } => Self::Conflict(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for HttpError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_errors_map_to_status_codes() {
        let cases = [
            (
                VoiceError::InvalidSetting {
                    field: "speed",
                    reason: "too fast".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                VoiceError::EngineUnavailable {
                    engine: "alternate".into(),
                    reason: "no model".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                VoiceError::Persistence("read-only".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (VoiceError::ShutDown, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status(), expected);
        }
    }
}
