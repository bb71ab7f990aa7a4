//! Shared integration-test server bootstrap helpers.

#![allow(dead_code)]

use axum::http::StatusCode;
use axum_test::TestServer;
use quickpoll_server::{create_app, AppState, Config, Database, TokenService};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

pub(crate) const TEST_SECRET: &[u8] = b"integration-test-signing-key-000";

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        db_path: db_path.to_str().expect("db path").to_string(),
        max_body_size: 4096,
        key_path: db_path
            .parent()
            .expect("db parent")
            .join("keys")
            .to_string_lossy()
            .to_string(),
        key_name: "quickpoll".to_string(),
        signup_secret: None,
        require_poll_options: false,
        password_hash_cost: 4,
    }
}

pub(crate) fn test_server_for_config(config: Config) -> TestServer {
    let db = Database::with_options(config.db_path.as_str(), config.store_options())
        .expect("open db");
    let state = AppState::new(config, db, TokenService::new(TEST_SECRET));
    let app = create_app(state, false);
    TestServer::new(app).expect("server")
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir) {
    setup_test_server_with(|_| {})
}

pub(crate) fn setup_test_server_with(adjust: impl FnOnce(&mut Config)) -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.redb");
    let mut config = test_config_for_db_path(&db_path);
    adjust(&mut config);
    let server = test_server_for_config(config);
    (server, temp_dir)
}

/// Sign up `name` over JSON and return a token from a JSON login.
pub(crate) async fn signup_and_login(server: &TestServer, name: &str) -> String {
    let signup = server
        .post("/signup")
        .json(&json!({ "name": name, "password": "hunter2" }))
        .await;
    assert_eq!(signup.status_code(), StatusCode::CREATED, "signup {}", name);

    let login = server
        .post("/login")
        .json(&json!({ "name": name, "password": "hunter2" }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK, "login {}", name);
    login
        .header("x-jwt")
        .to_str()
        .expect("token header")
        .to_string()
}
