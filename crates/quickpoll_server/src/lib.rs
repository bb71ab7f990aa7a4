//! HTTP server wiring for quickpoll (request pipeline, handlers, shared state).

/// Content negotiation, token identity and body extraction.
pub mod context;
/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for poll and account endpoints.
pub mod handlers;

pub use quickpoll_core::{
    auth, config, db, models, AppError, Config, Database, TokenService, AUTH_BODY_LIMIT,
    DEFAULT_PORT, REQUEST_TIMEOUT_SECS,
};

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Router,
};
use error::HttpError;
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Header carrying the per-request id, generated when the client sends none.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Construct shared application state.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    /// - `tokens`: Token service signing with the server key.
    ///
    /// # Returns
    /// A new [`AppState`].
    pub fn new(config: Config, db: Database, tokens: TokenService) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            tokens: Arc::new(tokens),
        }
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from env var overrides and security policy.
///
/// # Arguments
/// - `config`: Server configuration containing the configured `port`.
/// - `allow_public_access`: Whether non-loopback bind targets are permitted.
///
/// # Returns
/// A validated socket address that enforces loopback when public access is disabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn poll_routes(max_body_size: usize) -> Router<AppState> {
    let public = Router::new()
        .route("/polls", get(handlers::poll::list_polls))
        .route("/polls/:name", get(handlers::poll::get_poll))
        .route("/polls/:name/results", get(handlers::poll::poll_results));

    let protected = Router::new()
        .route("/polls", post(handlers::poll::create_poll))
        .route("/polls/:name/options", post(handlers::poll::add_option))
        .route("/polls/:name/vote", post(handlers::poll::vote))
        .route_layer(middleware::from_fn(context::require_user))
        .layer(DefaultBodyLimit::max(max_body_size));

    public.merge(protected)
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(handlers::user::signup))
        .route("/login", post(handlers::user::login))
        .route("/logout", get(handlers::user::logout))
        .layer(DefaultBodyLimit::max(AUTH_BODY_LIMIT))
}

fn cors_layer(allow_public_access: bool, cors_port: u16) -> CorsLayer {
    let methods = [Method::GET, Method::POST];
    let token_header = HeaderName::from_static(context::TOKEN_HEADER);
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    if allow_public_access {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
            .expose_headers([token_header, request_id]);
    }

    let origins: Vec<HeaderValue> = [
        format!("http://localhost:{}", cors_port),
        format!("http://127.0.0.1:{}", cors_port),
    ]
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            token_header.clone(),
        ])
        .expose_headers([token_header, request_id])
}

async fn timeout_response(err: BoxError) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        HttpError::Timeout
    } else {
        AppError::Internal(format!("Unhandled middleware error: {}", err)).into()
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    HttpError::from(AppError::Internal(format!("Handler panicked: {}", detail))).into_response()
}

fn request_span(request: &axum::extract::Request) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Wrap a stateful router in the transport middleware stack.
///
/// Outermost first: request id assignment, tracing, request id propagation,
/// compression, CORS, security headers, panic recovery, then the request
/// deadline closest to the handlers.
fn with_service_layers(
    router: Router,
    allow_public_access: bool,
    cors_port: u16,
    request_timeout: Duration,
) -> Router {
    router
        .layer(
            tower::ServiceBuilder::new()
                .layer(HandleErrorLayer::new(timeout_response))
                .layer(tower::timeout::TimeoutLayer::new(request_timeout)),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            tower::ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CompressionLayer::new())
                .layer(cors_layer(allow_public_access, cors_port))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(
                        "default-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'",
                    ),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    let router = Router::new()
        .merge(poll_routes(state.config.max_body_size))
        .merge(account_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            context::negotiate,
        ))
        .with_state(state);
    with_service_layers(
        router,
        allow_public_access,
        cors_port,
        Duration::from_secs(REQUEST_TIMEOUT_SECS),
    )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// # Arguments
/// - `listener`: Bound TCP listener for the server.
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
/// - `shutdown_signal`: Future that resolves when shutdown should start.
///
/// # Returns
/// `Ok(())` when the server exits cleanly.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

#[cfg(test)]
mod tests {
    use super::listener_cors_port;
    use super::resolve_bind_address;
    use super::{with_service_layers, REQUEST_ID_HEADER};
    use axum::{http::StatusCode, routing::get, Router};
    use axum_test::TestServer;
    use quickpoll_core::env::{env_lock, EnvGuard};
    use quickpoll_core::{Config, DEFAULT_PORT};
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn boom() -> &'static str {
        panic!("vote tally exploded");
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    fn layered_server(timeout: Duration) -> TestServer {
        let router = Router::new()
            .route("/boom", get(boom))
            .route("/slow", get(slow))
            .route("/ok", get(|| async { "ok" }));
        TestServer::new(with_service_layers(router, false, DEFAULT_PORT, timeout))
            .expect("server")
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_error() {
        let server = layered_server(Duration::from_secs(10));
        let response = server.get("/boom").await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Internal server error");
        assert!(response.contains_header(REQUEST_ID_HEADER));
        response.assert_header("x-content-type-options", "nosniff");

        let after = server.get("/ok").await;
        assert_eq!(after.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn slow_handler_times_out_with_gateway_timeout() {
        let server = layered_server(Duration::from_millis(50));
        let response = server.get("/slow").await;
        assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Request timed out");
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let server = layered_server(Duration::from_secs(10));
        let response = server
            .get("/ok")
            .add_header(REQUEST_ID_HEADER, "poll-req-42")
            .await;
        response.assert_header(REQUEST_ID_HEADER, "poll-req-42");
    }

    fn config_with_port(port: u16) -> Config {
        Config {
            db_path: String::from("/tmp/quickpoll-db/polls.redb"),
            port,
            max_body_size: 4096,
            key_path: String::from("/tmp/quickpoll-keys"),
            key_name: String::from("quickpoll"),
            signup_secret: None,
            require_poll_options: false,
            password_hash_cost: 4,
        }
    }

    #[tokio::test]
    async fn listener_cors_port_uses_bound_listener_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener");
        let expected = listener.local_addr().expect("listener addr").port();
        let resolved = listener_cors_port(&listener, DEFAULT_PORT);
        assert_eq!(resolved, expected);
    }

    #[test]
    fn resolve_bind_address_enforces_loopback_when_public_access_disabled() {
        let _lock = env_lock().lock().expect("env lock");
        let config = config_with_port(4040);
        let _bind = EnvGuard::set("BIND", "0.0.0.0:4040");

        let resolved = resolve_bind_address(&config, false);
        assert_eq!(resolved.ip().to_string(), "127.0.0.1");
        assert_eq!(resolved.port(), 4040);

        let public = resolve_bind_address(&config, true);
        assert_eq!(public, SocketAddr::from(([0, 0, 0, 0], 4040)));
    }

    #[test]
    fn resolve_bind_address_allows_loopback_and_invalid_fallback() {
        let _lock = env_lock().lock().expect("env lock");
        let config = config_with_port(4041);
        {
            let _bind = EnvGuard::remove("BIND");
            let loopback = resolve_bind_address(&config, false);
            assert_eq!(loopback, SocketAddr::from(([127, 0, 0, 1], 4041)));
        }

        let _bind = EnvGuard::set("BIND", "bad:host");
        let fallback = resolve_bind_address(&config, false);
        assert_eq!(fallback, SocketAddr::from(([127, 0, 0, 1], 4041)));
    }
}
