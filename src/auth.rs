use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::{
    error::AppError,
    models::user::{Actor, Role},
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller as established by the authentication layer in front of us.
///
/// An [`Actor`] placed in the request extensions wins; otherwise the
/// identity headers set by the gateway are used.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Actor>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(Self(Some(actor.clone())));
        }

        Ok(Self(actor_from_headers(&parts.headers)))
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let id = headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
    if id.is_empty() {
        return None;
    }
    let role: Role = headers.get(USER_ROLE_HEADER)?.to_str().ok()?.parse().ok()?;
    Some(Actor {
        id: id.to_string(),
        role,
    })
}

impl CurrentUser {
    pub fn require_actor(&self) -> Result<&Actor, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}
