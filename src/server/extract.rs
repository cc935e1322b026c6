use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::{Identity, Role};
use crate::server::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Reads the caller from the `x-user-id` and `x-user-role` headers set by the
/// upstream gateway. A missing role means `member`.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_str(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized(format!("{} header is required", USER_ID_HEADER)))?
            .parse::<i32>()
            .map_err(|_| {
                ApiError::Unauthorized(format!("{} must be an integer", USER_ID_HEADER))
            })?;

        let role = match header_str(parts, USER_ROLE_HEADER)? {
            Some(raw) => Role::from_str(&raw.to_lowercase()).map_err(|_| {
                ApiError::Unauthorized(format!("unknown role '{}'", raw))
            })?,
            None => Role::Member,
        };

        Ok(Identity::new(user_id, role))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    match parts.headers.get(name) {
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| ApiError::Unauthorized(format!("{} is not valid text", name))),
        None => Ok(None),
    }
}
