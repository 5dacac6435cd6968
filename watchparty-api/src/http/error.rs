use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<watchparty_core::Error> for AppError {
    fn from(err: watchparty_core::Error) -> Self {
        use watchparty_core::Error;

        let message = err.client_message();
        match err {
            Error::RoomNotFound(_) => Self::not_found(message),
            Error::InvalidPassword | Error::NotAuthorized(_) => Self::forbidden(message),
            Error::RoomFull => Self::conflict(message),
            Error::InvalidPoll(_)
            | Error::PollNotFound(_)
            | Error::PollClosed
            | Error::InvalidOption(_)
            | Error::InvalidContent(_)
            | Error::InvalidInput(_)
            | Error::NotInRoom
            | Error::Serialization(_) => Self::bad_request(message),
            Error::Internal(_) => Self::internal(message),
        }
    }
}
