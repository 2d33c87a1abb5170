use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::MarketError;
use crate::ids::Id;

/// Authenticated principal attached to a request.
///
/// The upstream gateway resolves accounts and hands us the principal id as an
/// opaque bearer token, so extraction is just `Authorization: Bearer <id>`.
/// A missing, malformed, or non-id token is rejected before any handler
/// logic runs; handlers that take a [`Principal`] can assume it is
/// well-formed.
#[derive(Debug, Clone, Copy)]
pub struct Principal(pub Id);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(MarketError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(MarketError::Unauthenticated)?;
        token
            .trim()
            .parse()
            .map(Principal)
            .map_err(|_| MarketError::Unauthenticated)
    }
}
