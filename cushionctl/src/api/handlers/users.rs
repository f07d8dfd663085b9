use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;

use crate::{
    AppState,
    api::{
        extract::{PathParams, Payload, RequestTarget},
        models::users::{Role, UserCreate, UserResponse, UserUpdate, validate_email, validate_name},
    },
    auth::{
        gate::{Admins, Authorized},
        password,
    },
    db::models::{
        operation_logs::{OperationAction, OperationLogCreateDBRequest},
        users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
};

/// List all users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Not logged in", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, _: Authorized<Admins>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Provision a user with an explicit role
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input or duplicate email", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user: admin, .. }: Authorized<Admins>,
    Payload(request): Payload<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    validate_email(&request.email)?;
    validate_name(&request.name)?;
    password::check_policy(&request.password, &state.config.auth.password)?;

    if state.users.get_user_by_email(&request.email).await?.is_some() {
        return Err(Error::DuplicateEmail);
    }

    let password_hash = password::hash_password_blocking(request.password, state.config.auth.password.argon2_params()).await?;
    let created = state
        .users
        .create_user(&UserCreateDBRequest {
            email: request.email,
            name: request.name,
            password_hash,
            role: request.role,
        })
        .await?;

    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(admin.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(OperationAction::Create)
                .entity_type("users")
                .entity_id(created.id.to_string())
                .metadata(json!({ "email": created.email, "name": created.name, "role": created.role }))
                .build(),
        )
        .await;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Change a user's name and/or role
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    request_body = UserUpdate,
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid name, or an admin demoting themselves", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
        (status = 404, description = "User not found", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user: admin, .. }: Authorized<Admins>,
    PathParams(user_id): PathParams<UserId>,
    Payload(request): Payload<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if let Some(name) = &request.name {
        validate_name(name)?;
    }
    if user_id == admin.id && request.role.is_some_and(|role| role != Role::Admin) {
        return Err(Error::validation("role", "You cannot remove your own admin role"));
    }

    let metadata = serde_json::to_value(&request).ok();
    let updated = state
        .users
        .update_user(user_id, &UserUpdateDBRequest::from(request))
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        })?;

    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(admin.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(OperationAction::Update)
                .entity_type("users")
                .entity_id(user_id.to_string())
                .maybe_metadata(metadata)
                .build(),
        )
        .await;

    Ok(Json(updated.into()))
}

/// Delete a user. Their sessions go with them; their audit entries stay with a null actor.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Admins cannot delete their own account", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
        (status = 404, description = "User not found", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user: admin, .. }: Authorized<Admins>,
    PathParams(user_id): PathParams<UserId>,
) -> Result<StatusCode> {
    if user_id == admin.id {
        return Err(Error::validation("id", "You cannot delete your own account"));
    }

    if !state.users.delete_user(user_id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(admin.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(OperationAction::Delete)
                .entity_type("users")
                .entity_id(user_id.to_string())
                .build(),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every session of a user, logging them out everywhere
#[utoipa::path(
    delete,
    path = "/api/users/{id}/sessions",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "Sessions revoked"),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
        (status = 404, description = "User not found", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user: admin, .. }: Authorized<Admins>,
    PathParams(user_id): PathParams<UserId>,
) -> Result<StatusCode> {
    if state.users.get_user(user_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    let revoked = state.sessions.delete_user_sessions(user_id, None).await?;
    tracing::info!("Revoked {} session(s) for user {}", revoked, crate::types::abbrev_uuid(&user_id));

    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(admin.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(OperationAction::Delete)
                .entity_type("sessions")
                .entity_id(user_id.to_string())
                .metadata(json!({ "revoked": revoked }))
                .build(),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
