//! Database models for login sessions.

use crate::types::{SessionId, UserId};
use chrono::{DateTime, Utc};

/// Lifecycle state of a session as seen by request resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Expiry has passed but the row has not been swept yet
    Expired,
    /// No row: destroyed by logout or an administrator, swept, or never issued
    Revoked,
}

impl SessionState {
    /// Classify a looked-up session at instant `now`. A session is active iff `now < expires_at`.
    pub fn of(session: Option<&SessionDBResponse>, now: DateTime<Utc>) -> Self {
        match session {
            None => SessionState::Revoked,
            Some(s) if now < s.expires_at => SessionState::Active,
            Some(_) => SessionState::Expired,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub user_id: UserId,
    /// SHA-256 digest of the bearer token; the token itself is never stored
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionDBResponse {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn session(expires_at: DateTime<Utc>) -> SessionDBResponse {
        SessionDBResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "h".to_string(),
            expires_at,
            created_at: expires_at - Duration::hours(24),
        }
    }

    #[test]
    fn test_session_state() {
        let now = Utc::now();
        assert_eq!(SessionState::of(None, now), SessionState::Revoked);
        assert_eq!(
            SessionState::of(Some(&session(now + Duration::seconds(1))), now),
            SessionState::Active
        );
        // Expiry is exclusive: at the exact instant the session is no longer valid
        assert_eq!(SessionState::of(Some(&session(now)), now), SessionState::Expired);
        assert_eq!(
            SessionState::of(Some(&session(now - Duration::hours(1))), now),
            SessionState::Expired
        );
    }
}
