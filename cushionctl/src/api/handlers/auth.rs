use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    AppState,
    api::{
        extract::{Payload, RequestTarget},
        models::{
            auth::{AuthSuccessResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, WithCookie},
            users::{CurrentUser, Role, UserResponse, validate_email, validate_name},
        },
    },
    auth::{password, session},
    db::models::{
        operation_logs::{OperationAction, OperationLogCreateDBRequest},
        users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
};

/// Register a new account. The account is always created as `guest` and logged in straight away.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered and logged in", body = UserResponse),
        (status = 400, description = "Invalid input or duplicate email", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Payload(request): Payload<RegisterRequest>) -> Result<WithCookie<UserResponse>> {
    let auth_config = &state.config.auth;
    if !auth_config.allow_registration {
        return Err(Error::Validation {
            field: None,
            message: "User registration is disabled".to_string(),
        });
    }

    validate_email(&request.email)?;
    validate_name(&request.name)?;
    password::check_policy(&request.password, &auth_config.password)?;

    // The unique constraint still backs this up if two registrations race
    if state.users.get_user_by_email(&request.email).await?.is_some() {
        return Err(Error::DuplicateEmail);
    }

    let password_hash = password::hash_password_blocking(request.password, auth_config.password.argon2_params()).await?;
    let created = state
        .users
        .create_user(&UserCreateDBRequest {
            email: request.email,
            name: request.name,
            password_hash,
            role: Role::Guest,
        })
        .await?;
    info!("Registered user {}", crate::types::abbrev_uuid(&created.id));

    let token = session::create_session(state.sessions.as_ref(), created.id, &auth_config.session).await?;

    Ok(WithCookie {
        status: StatusCode::CREATED,
        cookie: session::session_cookie(&token, &auth_config.session),
        body: created.into(),
    })
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Logged in", body = UserResponse),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Payload(request): Payload<LoginRequest>) -> Result<WithCookie<UserResponse>> {
    let auth_config = &state.config.auth;

    let Some(user) = state.users.get_user_by_email(&request.email).await? else {
        // Burn the same verification cost as a real account before failing
        let dummy = password::dummy_digest(auth_config.password.argon2_params())?;
        password::verify_password_blocking(request.password, dummy).await?;
        debug!("Login attempt for unknown email");
        return Err(Error::InvalidCredentials);
    };

    if !password::verify_password_blocking(request.password, user.password_hash.clone()).await? {
        debug!("Login attempt with wrong password for user {}", crate::types::abbrev_uuid(&user.id));
        return Err(Error::InvalidCredentials);
    }

    let token = session::create_session(state.sessions.as_ref(), user.id, &auth_config.session).await?;

    Ok(WithCookie {
        status: StatusCode::OK,
        cookie: session::session_cookie(&token, &auth_config.session),
        body: user.into(),
    })
}

/// Log out. Always succeeds and always clears the session cookie.
#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logged out", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> WithCookie<AuthSuccessResponse> {
    let session_config = &state.config.auth.session;
    if let Some(token) = session::token_from_headers(&headers, &session_config.cookie_name) {
        session::destroy_session(state.sessions.as_ref(), token).await;
    }

    WithCookie {
        status: StatusCode::OK,
        cookie: session::clear_session_cookie(session_config),
        body: AuthSuccessResponse {
            message: "Logged out".to_string(),
        },
    }
}

/// Profile of the logged-in user
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(current_user: CurrentUser) -> Json<UserResponse> {
    Json(current_user.into())
}

/// Change the caller's password. Every other session of the caller is revoked.
#[utoipa::path(
    post,
    path = "/api/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 400, description = "New password violates the policy", body = crate::errors::ErrorBody),
        (status = 401, description = "Not logged in, or wrong current password", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    target: RequestTarget,
    headers: HeaderMap,
    current_user: CurrentUser,
    Payload(request): Payload<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>> {
    let auth_config = &state.config.auth;

    let user = state
        .users
        .get_user(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    if !password::verify_password_blocking(request.current_password, user.password_hash).await? {
        return Err(Error::InvalidCredentials);
    }
    password::check_policy(&request.new_password, &auth_config.password)?;

    let password_hash = password::hash_password_blocking(request.new_password, auth_config.password.argon2_params()).await?;
    state
        .users
        .update_user(current_user.id, &UserUpdateDBRequest::password(password_hash))
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    let keep = session::token_from_headers(&headers, &auth_config.session.cookie_name).map(session::hash_token);
    let revoked = state.sessions.delete_user_sessions(current_user.id, keep.as_deref()).await?;
    info!(
        "Password changed for user {}, revoked {} other session(s)",
        crate::types::abbrev_uuid(&current_user.id),
        revoked
    );

    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(current_user.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(OperationAction::Update)
                .entity_type("users")
                .entity_id(current_user.id.to_string())
                .metadata(json!({ "passwordChanged": true, "sessionsRevoked": revoked }))
                .build(),
        )
        .await;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};

    use crate::{
        api::models::users::{Role, UserResponse},
        auth::session::hash_token,
        db::models::{
            operation_logs::{OperationAction, OperationLogFilter},
            sessions::SessionCreateDBRequest,
            users::UserUpdateDBRequest,
        },
        errors::ErrorBody,
        store::Stores,
        test_utils::*,
    };

    #[test_log::test(tokio::test)]
    async fn test_register_forces_guest_and_logs_in() {
        let (server, stores, _bg) = create_test_app().await;

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "alice@example.com", "name": "Alice", "password": "secret1", "role": "admin" }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let user: UserResponse = response.json();
        assert_eq!(user.role, Role::Guest);
        assert_eq!(user.email, "alice@example.com");

        let set_cookie = response.header(header::SET_COOKIE);
        let set_cookie = set_cookie.to_str().unwrap();
        assert!(set_cookie.starts_with("cushionctl_session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Path=/"));

        let stored = stores.users.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Guest);
        assert_ne!(stored.password_hash, "secret1");

        let body: Value = response.json();
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("password_hash").is_none());

        let (name, value) = cookie_header(&session_cookie_from(&response));
        let me = server.get("/api/user").add_header(name, value).await;
        me.assert_status_ok();
        assert_eq!(me.json::<UserResponse>().id, user.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_register_duplicate_email() {
        let (server, stores, _bg) = create_test_app().await;
        create_test_user(&stores, "taken@example.com", Role::Guest).await;

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "taken@example.com", "name": "Again", "password": "secret1" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.kind, "duplicate_email");
        assert_eq!(body.field.as_deref(), Some("email"));
    }

    #[test_log::test(tokio::test)]
    async fn test_register_validates_input() {
        let (server, _stores, _bg) = create_test_app().await;

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "short@example.com", "name": "Short", "password": "abc" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.kind, "validation");
        assert_eq!(body.field.as_deref(), Some("password"));

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "not-an-email", "name": "Nobody", "password": "secret1" }))
            .await;
        assert_eq!(response.json::<ErrorBody>().field.as_deref(), Some("email"));

        // Malformed JSON maps to a validation error too
        let response = server
            .post("/api/register")
            .content_type("application/json")
            .bytes(axum::body::Bytes::from_static(b"{ not json"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorBody>().kind, "validation");
    }

    #[test_log::test(tokio::test)]
    async fn test_register_disabled() {
        let mut config = create_test_config();
        config.auth.allow_registration = false;
        let (server, _bg) = create_test_app_with_stores(config, Stores::in_memory()).await;

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "a@example.com", "name": "A", "password": "secret1" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_failures_are_indistinguishable() {
        let (server, _stores, _bg) = create_test_app().await;

        // Unregistered bob
        let unknown = server
            .post("/api/login")
            .json(&json!({ "email": "bob@example.com", "password": "secret1" }))
            .await;
        unknown.assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/api/register")
            .json(&json!({ "email": "bob@example.com", "name": "Bob", "password": "secret1" }))
            .await
            .assert_status(StatusCode::CREATED);

        let wrong = server
            .post("/api/login")
            .json(&json!({ "email": "bob@example.com", "password": "wrong-password" }))
            .await;
        wrong.assert_status(StatusCode::UNAUTHORIZED);

        let unknown: Value = unknown.json();
        let wrong: Value = wrong.json();
        assert_eq!(unknown, wrong);
        assert_eq!(wrong, json!({ "kind": "unauthenticated", "message": "Invalid email or password" }));

        let ok = server
            .post("/api/login")
            .json(&json!({ "email": "bob@example.com", "password": "secret1" }))
            .await;
        ok.assert_status_ok();
        assert_eq!(ok.json::<UserResponse>().role, Role::Guest);
    }

    #[test_log::test(tokio::test)]
    async fn test_login_email_is_case_sensitive() {
        let (server, stores, _bg) = create_test_app().await;
        create_test_user(&stores, "carol@example.com", Role::Editor).await;

        server
            .post("/api/login")
            .json(&json!({ "email": "Carol@Example.com", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_current_user_requires_session() {
        let (server, _stores, _bg) = create_test_app().await;

        let response = server.get("/api/user").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ErrorBody = response.json();
        assert_eq!(body.kind, "unauthenticated");
        assert_eq!(body.message, "Authentication required");

        let (name, value) = cookie_header("cushionctl_session=made-up-token");
        server
            .get("/api/user")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_session_is_no_session() {
        let (server, stores, _bg) = create_test_app().await;
        let user = create_test_user(&stores, "dave@example.com", Role::Admin).await;

        stores
            .sessions
            .create_session(&SessionCreateDBRequest {
                user_id: user.id,
                token_hash: hash_token("stale-token"),
                expires_at: Utc::now() - Duration::minutes(1),
            })
            .await
            .unwrap();

        let (name, value) = cookie_header("cushionctl_session=stale-token");
        server
            .get("/api/user")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        // Admin role does not help once the session has expired
        server
            .get("/api/users")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Logging out an expired session is fine
        server.post("/api/logout").add_header(name, value).await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_logout_destroys_session_and_clears_cookie() {
        let (server, stores, _bg) = create_test_app().await;
        let (_user, cookie) = create_logged_in_user(&server, &stores, "erin@example.com", Role::Guest).await;
        let (name, value) = cookie_header(&cookie);

        let response = server.post("/api/logout").add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();
        let set_cookie = response.header(header::SET_COOKIE);
        assert!(set_cookie.to_str().unwrap().contains("Max-Age=0"));

        server
            .get("/api/user")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Revoked session, and no session at all: still 200
        server.post("/api/logout").add_header(name, value).await.assert_status_ok();
        server.post("/api/logout").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_guest_promoted_in_store_gains_admin_routes() {
        let (server, stores, _bg) = create_test_app().await;

        let response = server
            .post("/api/register")
            .json(&json!({ "email": "alice@example.com", "name": "Alice", "password": "secret1" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let alice: UserResponse = response.json();
        assert_eq!(alice.role, Role::Guest);
        let (name, value) = cookie_header(&session_cookie_from(&response));

        let me = server.get("/api/user").add_header(name.clone(), value.clone()).await;
        me.assert_status_ok();
        assert_eq!(me.json::<UserResponse>().role, Role::Guest);

        let forbidden = server.get("/api/users").add_header(name, value).await;
        forbidden.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(forbidden.json::<ErrorBody>().kind, "forbidden");

        stores
            .users
            .update_user(
                alice.id,
                &UserUpdateDBRequest {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cookie = login(&server, "alice@example.com", "secret1").await;
        let (name, value) = cookie_header(&cookie);
        let users = server.get("/api/users").add_header(name, value).await;
        users.assert_status_ok();
        let users: Vec<UserResponse> = users.json();
        assert!(users.iter().any(|u| u.id == alice.id && u.role == Role::Admin));
    }

    #[test_log::test(tokio::test)]
    async fn test_change_password_revokes_other_sessions() {
        let (server, stores, _bg) = create_test_app().await;
        let (user, first) = create_logged_in_user(&server, &stores, "frank@example.com", Role::Editor).await;
        let second = login(&server, "frank@example.com", TEST_PASSWORD).await;
        let (name, first_value) = cookie_header(&first);
        let (_, second_value) = cookie_header(&second);

        // Wrong current password: the generic credential failure
        let response = server
            .post("/api/password-change")
            .add_header(name.clone(), first_value.clone())
            .json(&json!({ "currentPassword": "nope-nope", "newPassword": "brand-new-1" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<ErrorBody>().message, "Invalid email or password");

        // Too short
        server
            .post("/api/password-change")
            .add_header(name.clone(), first_value.clone())
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": "abc" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/password-change")
            .add_header(name.clone(), first_value.clone())
            .json(&json!({ "currentPassword": TEST_PASSWORD, "newPassword": "brand-new-1" }))
            .await
            .assert_status_ok();

        server
            .get("/api/user")
            .add_header(name.clone(), first_value)
            .await
            .assert_status_ok();
        server
            .get("/api/user")
            .add_header(name, second_value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        login(&server, "frank@example.com", "brand-new-1").await;

        let logs = stores.audit.query(&OperationLogFilter::default()).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, OperationAction::Update);
        assert_eq!(logs[0].entity_type.as_deref(), Some("users"));
        assert_eq!(logs[0].user_id, Some(user.id));
        assert_eq!(logs[0].route, "/api/password-change");
    }

    #[test_log::test(tokio::test)]
    async fn test_security_headers_on_every_response() {
        let (server, _stores, _bg) = create_test_app().await;

        for response in [server.get("/healthz").await, server.get("/api/user").await] {
            assert_eq!(response.header("x-content-type-options"), "nosniff");
            assert_eq!(response.header("x-frame-options"), "DENY");
            assert_eq!(response.header("x-xss-protection"), "1; mode=block");
            assert_eq!(response.header("referrer-policy"), "strict-origin-when-cross-origin");
        }
    }
}
