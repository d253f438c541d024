//! Caller identity resolved by the upstream platform.
//!
//! An external resolver authenticates requests and forwards `{userId,
//! username}` as headers; this core trusts them as given.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the caller's stable user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's display name.
pub const USERNAME_HEADER: &str = "x-username";

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

fn header_value(parts: &Parts, name: &'static str) -> Result<String, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized {
            message: format!("missing identity header `{name}`"),
        })
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity {
            user_id: header_value(parts, USER_ID_HEADER)?,
            username: header_value(parts, USERNAME_HEADER)?,
        })
    }
}

/// Identity extractor for routes that work both anonymously and
/// authenticated (e.g. viewing a game).
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(
            Identity::from_request_parts(parts, state).await.ok(),
        ))
    }
}
