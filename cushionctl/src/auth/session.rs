//! Server-side sessions bound to an opaque cookie.
//!
//! The cookie carries 32 random bytes (base64url). Only the SHA-256 digest of that token is
//! stored, so a leaked sessions table cannot be replayed. Expiry is checked when a session is
//! resolved; the periodic sweep only reclaims space.

use axum::http::{HeaderMap, header};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{
    api::models::users::CurrentUser,
    auth::password::generate_token,
    config::SessionConfig,
    db::models::sessions::{SessionCreateDBRequest, SessionDBResponse, SessionState},
    errors::{Error, Result},
    store::{CredentialStore, SessionStore},
    types::UserId,
};

/// Digest under which a session token is persisted
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn same_site_attribute(value: &str) -> &'static str {
    match value.to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

/// `Set-Cookie` value binding a session token to the client
pub fn session_cookie(token: &str, config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly{}; SameSite={}; Max-Age={}",
        config.cookie_name,
        token,
        secure,
        same_site_attribute(&config.cookie_same_site),
        config.timeout.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie from the client
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}=; Path=/; HttpOnly{}; SameSite={}; Max-Age=0",
        config.cookie_name,
        secure,
        same_site_attribute(&config.cookie_same_site)
    )
}

/// Find the session token in the `Cookie` headers
pub fn token_from_headers<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Establish a new session and return the bearer token for the cookie
#[instrument(skip_all, fields(user_id = %crate::types::abbrev_uuid(&user_id)), err)]
pub async fn create_session(sessions: &dyn SessionStore, user_id: UserId, config: &SessionConfig) -> Result<String> {
    let token = generate_token();
    let timeout = chrono::Duration::from_std(config.timeout).map_err(|e| Error::Internal {
        operation: format!("compute session expiry: {e}"),
    })?;

    sessions
        .create_session(&SessionCreateDBRequest {
            user_id,
            token_hash: hash_token(&token),
            expires_at: Utc::now() + timeout,
        })
        .await?;

    Ok(token)
}

/// An active session together with the identity it resolves to
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub user: CurrentUser,
    pub session: SessionDBResponse,
}

/// Resolve a bearer token to its user at instant `now`.
///
/// Expired, revoked and unknown tokens all resolve to `None`, as does a session whose user has
/// since been deleted. An expired row found on the way is removed.
#[instrument(skip_all, err)]
pub async fn resolve_session(
    sessions: &dyn SessionStore,
    users: &dyn CredentialStore,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<ResolvedSession>> {
    let token_hash = hash_token(token);
    let session = sessions.get_session(&token_hash).await?;

    let session = match (SessionState::of(session.as_ref(), now), session) {
        (SessionState::Active, Some(session)) => session,
        (SessionState::Expired, _) => {
            debug!("Session expired, removing");
            if let Err(e) = sessions.delete_session(&token_hash).await {
                warn!("Failed to remove expired session: {}", e);
            }
            return Ok(None);
        }
        _ => return Ok(None),
    };

    let Some(user) = users.get_user(session.user_id).await? else {
        return Ok(None);
    };

    Ok(Some(ResolvedSession {
        user: user.into(),
        session,
    }))
}

/// Destroy the session behind a token. Missing, expired and already revoked sessions are fine.
#[instrument(skip_all)]
pub async fn destroy_session(sessions: &dyn SessionStore, token: &str) {
    match sessions.delete_session(&hash_token(token)).await {
        Ok(true) => debug!("Session destroyed"),
        Ok(false) => debug!("No session to destroy"),
        Err(e) => warn!("Failed to destroy session: {}", e),
    }
}
