use axum::{extract::FromRequestParts, http::request::Parts};
use crate::error::AppError;

/// Header naming the user a request acts for
pub const ACTOR_HEADER: &str = "x-user-id";

/// The acting user. Owner-only and per-user operations require it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthenticated)?;
        Ok(Actor(user_id.to_string()))
    }
}
