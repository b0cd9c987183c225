//! Request extractors.
//!
//! Authentication is out of scope for this service; an upstream proxy
//! resolves the session and forwards the acting user's id in the
//! `X-Actor-Id` header. Role checks stay in the domain services, which read
//! the stored role for that id.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use homestead_core::types::UserId;
use uuid::Uuid;

/// Header carrying the authenticated actor's user id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The acting user, resolved from the `X-Actor-Id` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing X-Actor-Id header"))?;

        let uuid = Uuid::parse_str(value)
            .map_err(|_| AppError::unauthorized("X-Actor-Id is not a valid user id"))?;
        Ok(Self(UserId::from_uuid(uuid)))
    }
}
