//! Caller identity, as forwarded by the authentication layer in front of
//! the server.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use scriptflow_core::api::OWNER_HEADER;
use scriptflow_core::OwnerId;

use crate::error::ServerError;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub OwnerId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(OwnerId::new(v)))
            .ok_or_else(|| ServerError::Unauthorized(format!("missing {OWNER_HEADER} header")))
    }
}
