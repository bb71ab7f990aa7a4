//! Request context pipeline: content negotiation and token identity.
//!
//! [`negotiate`] runs for every request and stores a [`RequestContext`] as a
//! typed request extension. Handlers read it back through extractors
//! ([`RequestContext`], [`AuthUser`], [`Negotiated`]).

use crate::{error::ErrorMessage, error::HttpError, AppState};
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use cookie::Cookie;
use quickpoll_core::{AppError, TokenError, TokenService};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

/// Cookie carrying the token for browser (form) clients.
pub const TOKEN_COOKIE: &str = "jwt";
/// Header carrying the token for API (JSON) clients.
pub const TOKEN_HEADER: &str = "x-jwt";

/// How the request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// No body, or a body type that reads ignore.
    None,
    Form,
    Json,
}

/// How responses (including errors) are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Html,
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No token was presented.
    Anonymous,
    /// A valid token was presented for this user.
    User(String),
    /// A token was presented and failed verification.
    Rejected(TokenError),
}

/// Request-scoped values computed once by [`negotiate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub format: BodyFormat,
    pub response: ResponseFormat,
    pub identity: Identity,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            format: BodyFormat::None,
            response: ResponseFormat::Json,
            identity: Identity::Anonymous,
        }
    }
}

impl RequestContext {
    /// Name of the authenticated user, if any.
    pub fn user(&self) -> Option<&str> {
        match &self.identity {
            Identity::User(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn quality(media: &mime::Mime) -> f32 {
    media
        .get_param("q")
        .and_then(|q| q.as_str().parse::<f32>().ok())
        .map(|q| q.clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

/// Whether the `Accept` header ranks `text/html` ahead of JSON.
///
/// Ranges are compared by `q`; on a tie the one listed first wins. A range
/// with `q=0` is refused outright.
fn prefers_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let mut html: Option<(f32, usize)> = None;
    let mut json: Option<(f32, usize)> = None;
    for (position, range) in accept.split(',').enumerate() {
        let Ok(media) = range.trim().parse::<mime::Mime>() else {
            continue;
        };
        let slot = match (media.type_(), media.subtype()) {
            (mime::TEXT, mime::HTML) => &mut html,
            (mime::APPLICATION, mime::JSON) => &mut json,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some((quality(&media), position));
        }
    }
    match (html, json) {
        (Some((html_q, _)), None) => html_q > 0.0,
        (Some((html_q, html_at)), Some((json_q, json_at))) => {
            html_q > json_q || (html_q > 0.0 && html_q == json_q && html_at < json_at)
        }
        (None, _) => false,
    }
}

/// Decide body and response formats from the request headers.
///
/// # Errors
/// Returns [`HttpError::MalformedRequest`] when a mutating request has no
/// `Content-Type` or any request carries an unparseable one, and
/// [`HttpError::UnsupportedMediaType`] when a mutating request uses a type
/// other than form or JSON.
pub fn negotiate_format(
    method: &Method,
    headers: &HeaderMap,
) -> Result<(BodyFormat, ResponseFormat), HttpError> {
    let mutating = is_mutating(method);
    let body = match headers.get(header::CONTENT_TYPE) {
        None if mutating => {
            return Err(HttpError::MalformedRequest(
                "Content-Type is required".to_string(),
            ))
        }
        None => BodyFormat::None,
        Some(value) => {
            let media = value
                .to_str()
                .ok()
                .and_then(|raw| raw.parse::<mime::Mime>().ok())
                .ok_or_else(|| {
                    HttpError::MalformedRequest("Unparseable Content-Type".to_string())
                })?;
            match (media.type_(), media.subtype()) {
                (mime::APPLICATION, mime::WWW_FORM_URLENCODED) => BodyFormat::Form,
                (mime::APPLICATION, mime::JSON) => BodyFormat::Json,
                _ if mutating => {
                    return Err(HttpError::UnsupportedMediaType(format!(
                        "{} (supported types are form, json)",
                        media.essence_str()
                    )))
                }
                _ => BodyFormat::None,
            }
        }
    };

    let response = match body {
        BodyFormat::Form => ResponseFormat::Html,
        BodyFormat::Json => ResponseFormat::Json,
        BodyFormat::None if prefers_html(headers) => ResponseFormat::Html,
        BodyFormat::None => ResponseFormat::Json,
    };
    Ok((body, response))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Find the raw token: `jwt` cookie first, then `X-JWT`, then a bearer
/// `Authorization` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse(raw).flatten() {
            if cookie.name() == TOKEN_COOKIE {
                if let Some(token) = non_empty(cookie.value()) {
                    return Some(token);
                }
            }
        }
    }

    if let Some(token) = headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(non_empty)
    {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(non_empty)
}

/// Verify whatever token the request carries.
pub fn resolve_identity(tokens: &TokenService, headers: &HeaderMap) -> Identity {
    match extract_token(headers) {
        None => Identity::Anonymous,
        Some(token) => match tokens.verify(&token) {
            Ok(name) => Identity::User(name),
            Err(err) => Identity::Rejected(err),
        },
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn html_error_page(error: &ErrorMessage) -> Response {
    let code = error.status.as_u16();
    let body = format!(
        "<html><head><title>{code} error</title></head><body><h1>{code}</h1><h4>{}</h4></body></html>",
        escape_html(&error.message)
    );
    (error.status, Html(body)).into_response()
}

/// Re-render error responses as HTML for clients that asked for it.
fn render_for(format: ResponseFormat, response: Response) -> Response {
    if format != ResponseFormat::Html {
        return response;
    }
    match response.extensions().get::<ErrorMessage>() {
        Some(error) => html_error_page(error),
        None => response,
    }
}

/// Middleware computing the [`RequestContext`] for every request.
pub async fn negotiate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (format, response_format) = match negotiate_format(request.method(), request.headers())
    {
        Ok(formats) => formats,
        Err(err) => {
            tracing::debug!(
                method = %request.method(),
                path = %request.uri().path(),
                "rejected during content negotiation: {}",
                err
            );
            let fallback = if prefers_html(request.headers()) {
                ResponseFormat::Html
            } else {
                ResponseFormat::Json
            };
            return render_for(fallback, err.into_response());
        }
    };

    let identity = resolve_identity(&state.tokens, request.headers());
    if let Identity::Rejected(err) = &identity {
        tracing::debug!(path = %request.uri().path(), "ignoring presented token: {}", err);
    }

    request.extensions_mut().insert(RequestContext {
        format,
        response: response_format,
        identity,
    });
    let response = next.run(request).await;
    render_for(response_format, response)
}

fn unauthorized(identity: &Identity) -> HttpError {
    match identity {
        Identity::Rejected(err) => AppError::from(err.clone()).into(),
        _ => AppError::Unauthorized("Login required".to_string()).into(),
    }
}

/// Route layer refusing requests without a verified token.
///
/// # Errors
/// Returns 401 for anonymous requests and rejected tokens.
pub async fn require_user(request: Request, next: Next) -> Result<Response, HttpError> {
    let identity = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.identity.clone())
        .unwrap_or(Identity::Anonymous);

    match identity {
        Identity::User(_) => Ok(next.run(request).await),
        other => {
            if let Identity::Rejected(err) = &other {
                tracing::warn!(path = %request.uri().path(), "rejected token: {}", err);
            }
            Err(unauthorized(&other))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Name of the user a verified token was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestContext>().map(|c| &c.identity) {
            Some(Identity::User(name)) => Ok(AuthUser(name.clone())),
            Some(identity) => Err(unauthorized(identity)),
            None => Err(unauthorized(&Identity::Anonymous)),
        }
    }
}

/// A request payload decodable from either negotiated body format.
pub trait RequestBody: DeserializeOwned + Send + Sized {
    /// Decode a `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    /// Returns [`HttpError::MalformedRequest`] when the body does not decode.
    fn from_form(bytes: &[u8]) -> Result<Self, HttpError> {
        serde_urlencoded::from_bytes(bytes)
            .map_err(|err| HttpError::MalformedRequest(format!("Invalid form body: {}", err)))
    }
}

/// Extractor decoding the body with the format chosen by [`negotiate`].
#[derive(Debug)]
pub struct Negotiated<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Negotiated<T>
where
    S: Send + Sync,
    T: RequestBody,
{
    type Rejection = HttpError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let format = request
            .extensions()
            .get::<RequestContext>()
            .map(|context| context.format)
            .unwrap_or(BodyFormat::None);

        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    HttpError::PayloadTooLarge
                } else {
                    HttpError::MalformedRequest(rejection.body_text())
                }
            })?;

        let value = match format {
            BodyFormat::Json => serde_json::from_slice(&bytes).map_err(|err| {
                HttpError::MalformedRequest(format!("Invalid JSON body: {}", err))
            })?,
            BodyFormat::Form => T::from_form(&bytes)?,
            BodyFormat::None => {
                return Err(HttpError::MalformedRequest(
                    "Content-Type is required".to_string(),
                ))
            }
        };
        Ok(Negotiated(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"context-test-secret-context-test";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).expect("header value"));
        }
        map
    }

    #[test]
    fn mutating_requests_need_a_content_type() {
        let err = negotiate_format(&Method::POST, &HeaderMap::new()).expect_err("missing type");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let read = negotiate_format(&Method::GET, &HeaderMap::new()).expect("read");
        assert_eq!(read, (BodyFormat::None, ResponseFormat::Json));
    }

    #[test]
    fn body_type_selects_response_format() {
        let form = headers(&[(
            "content-type",
            "application/x-www-form-urlencoded; charset=utf-8",
        )]);
        assert_eq!(
            negotiate_format(&Method::POST, &form).expect("form"),
            (BodyFormat::Form, ResponseFormat::Html)
        );

        let json = headers(&[("content-type", "application/json")]);
        assert_eq!(
            negotiate_format(&Method::POST, &json).expect("json"),
            (BodyFormat::Json, ResponseFormat::Json)
        );
    }

    #[test]
    fn unsupported_and_unparseable_types_are_rejected() {
        let plain = headers(&[("content-type", "text/plain")]);
        let err = negotiate_format(&Method::POST, &plain).expect_err("text/plain");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(negotiate_format(&Method::GET, &plain).is_ok());

        let garbage = headers(&[("content-type", "not a mime")]);
        for method in [Method::GET, Method::POST] {
            let err = negotiate_format(&method, &garbage).expect_err("garbage type");
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn reads_follow_accept_header() {
        let browser = headers(&[("accept", "text/html,application/xhtml+xml,*/*;q=0.8")]);
        assert_eq!(
            negotiate_format(&Method::GET, &browser).expect("browser"),
            (BodyFormat::None, ResponseFormat::Html)
        );
        let api = headers(&[("accept", "application/json, text/html")]);
        assert_eq!(
            negotiate_format(&Method::GET, &api).expect("api"),
            (BodyFormat::None, ResponseFormat::Json)
        );
    }

    #[test]
    fn accept_quality_outranks_list_order() {
        let cases = [
            ("text/html;q=0.1, application/json", ResponseFormat::Json),
            ("application/json;q=0.5, text/html", ResponseFormat::Html),
            ("text/html;q=0.9, application/json;q=0.9", ResponseFormat::Html),
            ("text/html;q=0", ResponseFormat::Json),
            ("text/html;q=bogus, application/json", ResponseFormat::Html),
        ];
        for (accept, expected) in cases {
            let (_, response) = negotiate_format(&Method::GET, &headers(&[("accept", accept)]))
                .expect("negotiate");
            assert_eq!(response, expected, "accept: {}", accept);
        }
    }

    #[test]
    fn token_sources_in_priority_order() {
        assert_eq!(extract_token(&HeaderMap::new()), None);

        let cookie = headers(&[
            ("cookie", "theme=dark; jwt=from-cookie"),
            ("x-jwt", "from-header"),
        ]);
        assert_eq!(extract_token(&cookie).as_deref(), Some("from-cookie"));

        let header_only = headers(&[("x-jwt", "from-header"), ("authorization", "Bearer b")]);
        assert_eq!(extract_token(&header_only).as_deref(), Some("from-header"));

        let bearer = headers(&[("authorization", "Bearer from-bearer")]);
        assert_eq!(extract_token(&bearer).as_deref(), Some("from-bearer"));

        let cleared = headers(&[("cookie", "jwt=")]);
        assert_eq!(extract_token(&cleared), None);
    }

    #[test]
    fn identity_reflects_token_verification() {
        let tokens = TokenService::new(SECRET);
        assert_eq!(
            resolve_identity(&tokens, &HeaderMap::new()),
            Identity::Anonymous
        );

        let token = tokens.issue("alice").expect("issue");
        let valid = headers(&[("x-jwt", token.as_str())]);
        assert_eq!(
            resolve_identity(&tokens, &valid),
            Identity::User("alice".to_string())
        );

        let forged = headers(&[("x-jwt", "abc.def.ghi")]);
        assert!(matches!(
            resolve_identity(&tokens, &forged),
            Identity::Rejected(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn html_errors_are_escaped() {
        let page = escape_html("<script>alert('x')</script> & more");
        assert_eq!(
            page,
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"
        );
    }

    #[test]
    fn context_user_accessor() {
        let mut context = RequestContext::default();
        assert_eq!(context.user(), None);
        context.identity = Identity::User("bob".to_string());
        assert_eq!(context.user(), Some("bob"));
    }
}
