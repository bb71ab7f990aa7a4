//! HTTP error mapping for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quickpoll_core::{AppError, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Request timed out")]
    Timeout,
}

/// Status and client-facing message of an error response.
///
/// Attached to every error response as an extension so the request pipeline
/// can re-render it for clients that asked for HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::App(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            HttpError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            HttpError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn client_message(&self) -> String {
        match self {
            HttpError::App(
                AppError::Validation(msg)
                | AppError::Conflict(msg)
                | AppError::NotFound(msg)
                | AppError::Unauthorized(msg),
            ) => msg.clone(),
            HttpError::App(err) => match err.kind() {
                ErrorKind::StoreUnavailable => "Storage unavailable".to_string(),
                _ => "Internal server error".to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} error: {}", status.as_u16(), self);
        }

        let message = self.client_message();
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        response
            .extensions_mut()
            .insert(ErrorMessage { status, message });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorMessage, HttpError};
    use axum::{http::StatusCode, response::IntoResponse};
    use quickpoll_core::AppError;

    #[test]
    fn app_errors_map_to_statuses() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (
                AppError::StoreMessage("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status(), expected);
        }
        assert_eq!(
            HttpError::UnsupportedMediaType("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            HttpError::MalformedRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(HttpError::Timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn server_errors_hide_details() {
        let response =
            HttpError::from(AppError::Internal("disk on fire".into())).into_response();
        let message = response
            .extensions()
            .get::<ErrorMessage>()
            .expect("error message extension");
        assert_eq!(message.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message.message, "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let response =
            HttpError::from(AppError::Conflict("Poll 'beer' already exists".into()))
                .into_response();
        let message = response
            .extensions()
            .get::<ErrorMessage>()
            .expect("error message extension");
        assert_eq!(message.message, "Poll 'beer' already exists");
    }
}
