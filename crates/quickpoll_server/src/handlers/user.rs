//! Signup, login and logout handlers.

use super::normalize::normalize_field;
use super::{blocking_failed, found};
use crate::context::{
    Negotiated, RequestBody, RequestContext, ResponseFormat, TOKEN_COOKIE, TOKEN_HEADER,
};
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cookie::{Cookie, SameSite};
use quickpoll_core::models::user::Credentials;
use serde::Deserialize;
use serde_json::json;

/// Where form flows land after signup, login and logout.
const HOME_LOCATION: &str = "/polls";

/// Signup payload: credentials plus the shared secret when one is configured.
#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "pass")]
    pub password: String,
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RequestBody for SignupRequest {}
impl RequestBody for Credentials {}

/// Gate signup behind the configured secret.
///
/// # Errors
/// Returns [`AppError::Validation`] when a secret is configured and the
/// request omits it or supplies a different one.
fn check_signup_secret(configured: Option<&str>, supplied: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = configured else {
        return Ok(());
    };
    match supplied.map(str::trim).filter(|value| !value.is_empty()) {
        None => Err(AppError::Validation("Secret is required".to_string())),
        Some(value) if value == expected => Ok(()),
        Some(_) => Err(AppError::Validation("Incorrect secret".to_string())),
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Create an account.
///
/// # Returns
/// `201` with the user name as JSON, or a redirect for form posts.
///
/// # Errors
/// Returns 400 for missing fields or a wrong secret and 409 when the name is
/// taken.
pub async fn signup(
    State(state): State<AppState>,
    context: RequestContext,
    Negotiated(req): Negotiated<SignupRequest>,
) -> Result<Response, HttpError> {
    let credentials = Credentials::new(normalize_field(req.name), req.password);
    credentials.validate()?;
    check_signup_secret(state.config.signup_secret.as_deref(), req.secret.as_deref())?;

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || db.users.create(&credentials))
        .await
        .map_err(blocking_failed)??;

    Ok(match context.response {
        ResponseFormat::Html => found(HOME_LOCATION),
        ResponseFormat::Json => {
            (StatusCode::CREATED, Json(json!({ "name": user.name }))).into_response()
        }
    })
}

/// Check credentials and hand out a token.
///
/// Form posts receive it as an `HttpOnly` `jwt` cookie; JSON posts receive it
/// in the `X-JWT` header and as `{"token": ...}`.
///
/// # Errors
/// Returns 404 for unknown users and 401 for a wrong password.
pub async fn login(
    State(state): State<AppState>,
    context: RequestContext,
    Negotiated(credentials): Negotiated<Credentials>,
) -> Result<Response, HttpError> {
    let credentials = Credentials::new(normalize_field(credentials.name), credentials.password);
    credentials.validate()?;

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        db.users.verify(&credentials.name, &credentials.password)
    })
    .await
    .map_err(blocking_failed)??;

    let token = state.tokens.issue(&user.name).map_err(AppError::from)?;
    tracing::info!(user = %user.name, "user logged in");

    Ok(match context.response {
        ResponseFormat::Html => (
            StatusCode::FOUND,
            [
                (header::LOCATION, HOME_LOCATION.to_string()),
                (header::SET_COOKIE, session_cookie(token).to_string()),
            ],
        )
            .into_response(),
        ResponseFormat::Json => (
            [(HeaderName::from_static(TOKEN_HEADER), token.clone())],
            Json(json!({ "token": token })),
        )
            .into_response(),
    })
}

/// Clear the token cookie.
pub async fn logout(context: RequestContext) -> Response {
    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    if let Some(user) = context.user() {
        tracing::info!(user = %user, "user logged out");
    }

    match context.response {
        ResponseFormat::Html => (
            StatusCode::FOUND,
            [
                (header::LOCATION, HOME_LOCATION.to_string()),
                (header::SET_COOKIE, cookie.to_string()),
            ],
        )
            .into_response(),
        ResponseFormat::Json => (
            StatusCode::NO_CONTENT,
            [(header::SET_COOKIE, cookie.to_string())],
        )
            .into_response(),
    }
}
