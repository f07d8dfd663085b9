//! Authentication and authorization.
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`session`]: cookie-bound server-side sessions
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`gate`]: role policies in front of handlers

pub mod current_user;
pub mod gate;
pub mod password;
pub mod session;
