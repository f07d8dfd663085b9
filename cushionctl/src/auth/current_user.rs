use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, ResolvedSession},
    errors::{Error, Result},
};
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use chrono::Utc;
use tracing::{debug, instrument, trace};

/// Resolve the session cookie on a request, if any. The result is cached in the request
/// extensions so several extractors on one handler share a single lookup.
#[instrument(skip_all)]
pub async fn resolve_request(parts: &mut Parts, state: &AppState) -> Result<Option<ResolvedSession>> {
    if let Some(cached) = parts.extensions.get::<Option<ResolvedSession>>() {
        return Ok(cached.clone());
    }

    let cookie_name = &state.config.auth.session.cookie_name;
    let resolved = match session::token_from_headers(&parts.headers, cookie_name) {
        Some(token) => session::resolve_session(state.sessions.as_ref(), state.users.as_ref(), token, Utc::now()).await?,
        None => {
            trace!("No session cookie present");
            None
        }
    };

    if let Some(resolved) = &resolved {
        debug!("Resolved session for user {}", crate::types::abbrev_uuid(&resolved.user.id));
    }
    parts.extensions.insert(resolved.clone());
    Ok(resolved)
}

/// Requires a valid session; 401 otherwise
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve_request(parts, state)
            .await?
            .map(|resolved| resolved.user)
            .ok_or(Error::Unauthenticated { message: None })
    }
}

/// `Option<CurrentUser>`: `None` without a valid session. Storage failures still reject.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        Ok(resolve_request(parts, state).await?.map(|resolved| resolved.user))
    }
}
