//! OpenAPI document for the authentication, user, audit and statistics routes.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Session cookie authentication
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "cushionctl_session",
                    "Opaque session token set by `POST /api/login` or `POST /api/register`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "cushionctl",
        description = "Inventory and workflow service for cushion manufacturing. Reads of catalog data are public; \
                       mutations require an editor or admin session and are recorded in the operation log."
    ),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::get_current_user,
        api::handlers::auth::change_password,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::revoke_user_sessions,
        api::handlers::operation_logs::list_operation_logs,
        api::handlers::statistics::get_statistics,
    ),
    components(schemas(
        api::models::auth::RegisterRequest,
        api::models::auth::LoginRequest,
        api::models::auth::ChangePasswordRequest,
        api::models::auth::AuthSuccessResponse,
        api::models::users::Role,
        api::models::users::UserCreate,
        api::models::users::UserUpdate,
        api::models::users::UserResponse,
        api::models::operation_logs::OperationLogResponse,
        api::models::statistics::CatalogStatistics,
        crate::db::models::operation_logs::OperationAction,
        crate::errors::ErrorBody,
    )),
    modifiers(&SessionCookieAddon),
    security(("SessionCookie" = [])),
    tags(
        (name = "authentication", description = "Registration, login and session management"),
        (name = "users", description = "User administration (admin only)"),
        (name = "operation_logs", description = "Audit trail of mutating operations (admin only)"),
        (name = "statistics", description = "Catalog totals for the dashboard (public)"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_auth_and_audit_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/api/register", "/api/login", "/api/users/{id}", "/api/operation-logs", "/api/statistics"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("SessionCookie"));
    }
}
