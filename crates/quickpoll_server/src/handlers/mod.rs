//! HTTP request handlers.

pub(crate) mod normalize;
/// Poll endpoints.
pub mod poll;
/// Signup, login and logout endpoints.
pub mod user;

use crate::error::HttpError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use quickpoll_core::AppError;

/// `302 Found` pointing at `location`, as form flows expect.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub(crate) fn poll_location(name: &str) -> String {
    format!("/polls/{}", name)
}

pub(crate) fn blocking_failed(err: tokio::task::JoinError) -> HttpError {
    AppError::Internal(format!("Background task failed: {}", err)).into()
}
