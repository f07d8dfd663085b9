use crate::api::models::users::Role;
use crate::db::errors::DbError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Message returned for every failed login, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the session is gone
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Submitted credentials did not match a user
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Caller is authenticated but their role is not in the allowed set
    #[error("Insufficient permissions: requires one of {}", format_roles(.required))]
    InsufficientPermissions { required: Vec<Role> },

    /// Registration or provisioning with an email that is already taken
    #[error("An account with this email address already exists")]
    DuplicateEmail,

    /// Invalid request data or business rule violation
    #[error("{message}")]
    Validation { field: Option<String>, message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict error, e.g. for unique constraint violations on catalog data
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorBody {
    /// Machine-readable error category
    #[schema(example = "unauthenticated")]
    pub kind: String,
    /// Human-readable message, safe to show to end users
    pub message: String,
    /// The offending request field, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn format_roles(roles: &[Role]) -> String {
    let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    format!("[{}]", names.join(", "))
}

fn is_email_constraint(table: Option<&str>, constraint: Option<&str>) -> bool {
    matches!((table, constraint), (Some("users"), Some(c)) if c.contains("email"))
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::DuplicateEmail | Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { table, constraint, .. } => {
                    if is_email_constraint(table.as_deref(), constraint.as_deref()) {
                        StatusCode::BAD_REQUEST
                    } else {
                        StatusCode::CONFLICT
                    }
                }
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Wire `kind` tag for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials => "unauthenticated",
            Error::InsufficientPermissions { .. } => "forbidden",
            Error::DuplicateEmail => "duplicate_email",
            Error::Validation { .. } => "validation",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::Internal { .. } | Error::Other(_) => "internal",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "not_found",
                DbError::UniqueViolation { table, constraint, .. } => {
                    if is_email_constraint(table.as_deref(), constraint.as_deref()) {
                        "duplicate_email"
                    } else {
                        "conflict"
                    }
                }
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => "validation",
                DbError::Other(_) => "internal",
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InvalidCredentials => INVALID_CREDENTIALS.to_string(),
            Error::InsufficientPermissions { required } => {
                format!("Insufficient permissions: requires one of {}", format_roles(required))
            }
            Error::DuplicateEmail => "An account with this email address already exists".to_string(),
            Error::Validation { message, .. } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation {
                    table,
                    constraint,
                    conflicting_value,
                    ..
                } => match (table.as_deref(), constraint.as_deref()) {
                    (t, c) if is_email_constraint(t, c) => "An account with this email address already exists".to_string(),
                    (Some("products"), Some("products_code_unique")) => match conflicting_value {
                        Some(code) => format!("A product with code '{code}' already exists"),
                        None => "A product with this code already exists".to_string(),
                    },
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { constraint, message, .. } => {
                    // Violations raised by record validation carry a readable message; raw
                    // Postgres check messages do not.
                    match constraint {
                        Some(c) if !c.ends_with("_check") => message.clone(),
                        _ => "Invalid data provided".to_string(),
                    }
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }

    /// The offending request field, when known
    pub fn field(&self) -> Option<String> {
        match self {
            Error::Validation { field, .. } => field.clone(),
            Error::DuplicateEmail => Some("email".to_string()),
            Error::Database(DbError::UniqueViolation { table, constraint, .. }) => {
                match (table.as_deref(), constraint.as_deref()) {
                    (t, c) if is_email_constraint(t, c) => Some("email".to_string()),
                    (Some("products"), Some("products_code_unique")) => Some("code".to_string()),
                    _ => None,
                }
            }
            Error::Database(DbError::CheckViolation { constraint: Some(c), .. }) if !c.ends_with("_check") => Some(c.clone()),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            message: self.user_message(),
            field: self.field(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InvalidCredentials | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::DuplicateEmail | Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation {
            field: None,
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation {
            field: Some("id".to_string()),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::Validation {
            field: None,
            message: rejection.body_text(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
