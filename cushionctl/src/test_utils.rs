//! Test utilities for integration testing (available with `test-utils` feature).

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;

use crate::{
    Application, BackgroundServices,
    api::models::users::{Role, UserResponse},
    auth::password,
    config::{Config, DatabaseConfig, PasswordConfig, SessionConfig},
    db::{
        errors::{DbError, Result},
        models::{
            operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
            users::UserCreateDBRequest,
        },
    },
    store::{AuditStore, Stores},
};

/// Password given to every user made by [`create_test_user`]
pub const TEST_PASSWORD: &str = "password123";

/// In-memory storage, plain-HTTP cookies and cheap argon2 parameters
pub fn create_test_config() -> Config {
    let mut config = Config {
        database: DatabaseConfig::Memory,
        ..Default::default()
    };
    config.auth.session = SessionConfig {
        cookie_secure: false,
        ..Default::default()
    };
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config
}

/// Application over the given stores, wrapped in a test server
pub async fn create_test_app_with_stores(config: Config, stores: Stores) -> (TestServer, BackgroundServices) {
    Application::with_stores(config, stores, None)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Application over fresh in-memory stores. The stores are returned for direct inspection.
pub async fn create_test_app() -> (TestServer, Stores, BackgroundServices) {
    let stores = Stores::in_memory();
    let (server, bg) = create_test_app_with_stores(create_test_config(), stores.clone()).await;
    (server, stores, bg)
}

/// Insert a user with [`TEST_PASSWORD`] straight into the credential store
pub async fn create_test_user(stores: &Stores, email: &str, role: Role) -> UserResponse {
    let params = create_test_config().auth.password.argon2_params();
    let password_hash = password::hash_password(TEST_PASSWORD, params).expect("Failed to hash test password");
    stores
        .users
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password_hash,
            role,
        })
        .await
        .expect("Failed to create test user")
        .into()
}

/// The `name=value` pair of the session cookie set by a response
pub fn session_cookie_from(response: &axum_test::TestResponse) -> String {
    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().expect("Set-Cookie is not ASCII");
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

/// `Cookie` header carrying a session cookie
pub fn cookie_header(cookie: &str) -> (HeaderName, HeaderValue) {
    (header::COOKIE, HeaderValue::from_str(cookie).expect("Invalid cookie header"))
}

/// Log in over HTTP and return the session cookie
pub async fn login(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/api/login")
        .json(&serde_json::json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();
    session_cookie_from(&response)
}

/// Create a user with `role` and log them in
pub async fn create_logged_in_user(server: &TestServer, stores: &Stores, email: &str, role: Role) -> (UserResponse, String) {
    let user = create_test_user(stores, email, role).await;
    let cookie = login(server, email, TEST_PASSWORD).await;
    (user, cookie)
}

/// Audit store whose every call fails
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _request: &OperationLogCreateDBRequest) -> Result<OperationLogDBResponse> {
        Err(DbError::Other(anyhow::anyhow!("audit store unavailable")))
    }

    async fn query(&self, _filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>> {
        Err(DbError::Other(anyhow::anyhow!("audit store unavailable")))
    }
}
