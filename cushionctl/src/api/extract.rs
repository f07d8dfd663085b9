//! Extractors that report malformed input as validation errors instead of axum's plain-text
//! rejections.

use std::convert::Infallible;

use axum::extract::{FromRequest, FromRequestParts, OriginalUri};
use axum::http::{Method, request::Parts};

use crate::errors::Error;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Payload<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct PathParams<T>(pub T);

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct QueryParams<T>(pub T);

/// Method and full route path of the request, as recorded in the audit trail
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub method: Method,
    pub route: String,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestTarget {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Inside nested routers `uri` has the prefix stripped; `OriginalUri` keeps it
        let route = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(Self {
            method: parts.method.clone(),
            route,
        })
    }
}
