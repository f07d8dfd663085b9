//! Role checks in front of handlers.
//!
//! Every protected route names an explicit set of allowed roles. `admin` passes a check only when
//! the set lists it; there is no hierarchy between roles.
//!
//! ```ignore
//! async fn delete_fabric(Authorized { user, .. }: Authorized<Editors>, ...) -> Result<...>
//! ```

use std::marker::PhantomData;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
};

/// Roles allowed to mutate catalog data
pub const EDITOR_ROLES: &[Role] = &[Role::Editor, Role::Admin];
/// Roles allowed on administrative routes
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];

/// Decide a request. `allowed: None` admits any authenticated user.
///
/// No user is always 401, whatever the policy; a user with a role outside `allowed` is 403.
pub fn authorize(user: Option<CurrentUser>, allowed: Option<&[Role]>) -> Result<CurrentUser> {
    let user = user.ok_or(Error::Unauthenticated { message: None })?;
    match allowed {
        Some(roles) if !roles.contains(&user.role) => Err(Error::InsufficientPermissions {
            required: roles.to_vec(),
        }),
        _ => Ok(user),
    }
}

/// A route's access rule, as a type
pub trait AccessPolicy: Send + Sync + 'static {
    const ALLOWED: Option<&'static [Role]>;
}

/// Any authenticated user
pub struct AnyUser;

/// Editors and admins
pub struct Editors;

/// Admins only
pub struct Admins;

impl AccessPolicy for AnyUser {
    const ALLOWED: Option<&'static [Role]> = None;
}

impl AccessPolicy for Editors {
    const ALLOWED: Option<&'static [Role]> = Some(EDITOR_ROLES);
}

impl AccessPolicy for Admins {
    const ALLOWED: Option<&'static [Role]> = Some(ADMIN_ROLES);
}

/// The caller, admitted by policy `P`
pub struct Authorized<P: AccessPolicy> {
    pub user: CurrentUser,
    _policy: PhantomData<P>,
}

impl<P: AccessPolicy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = <CurrentUser as OptionalFromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        let user = authorize(user, P::ALLOWED)?;
        Ok(Self {
            user,
            _policy: PhantomData,
        })
    }
}
