//! Database models for users.

use crate::api::models::users::{Role, UserUpdate};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use std::fmt;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Database request for updating a user; `None` leaves a column unchanged
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

impl From<UserUpdate> for UserUpdateDBRequest {
    fn from(update: UserUpdate) -> Self {
        Self {
            name: update.name,
            role: update.role,
            password_hash: None, // Regular updates don't include password changes
        }
    }
}

impl UserUpdateDBRequest {
    pub fn password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            ..Default::default()
        }
    }
}

/// Database response for a user
#[derive(Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for UserDBResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDBResponse")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl UserDBResponse {
    /// Apply an update in place (used by the in-memory backend)
    pub fn apply(&mut self, update: &UserUpdateDBRequest) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(hash) = &update.password_hash {
            self.password_hash = hash.clone();
        }
    }
}
