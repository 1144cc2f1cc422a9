use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, models::UserId};

/// Header set by the upstream gateway once the caller is authenticated
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, taken from the `x-user-id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthenticated("Missing user id".to_string()))?;

        parse_user_id(raw.to_str().unwrap_or_default())
            .map(CallerId)
            .ok_or_else(|| AppError::Unauthenticated("Invalid user id".to_string()))
    }
}

fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("42"), Some(42));
        assert_eq!(parse_user_id(" 7 "), Some(7));
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("-3"), None);
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id(""), None);
    }
}
