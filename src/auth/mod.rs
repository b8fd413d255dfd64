mod extract;
mod verifier;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

pub use extract::CurrentUser;
pub use verifier::{Claims, Verifier};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token not provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidOrExpiredToken,
    #[error("User not found")]
    AccountNotFound,
    #[error("User account is not active")]
    AccountInactive,
    #[error("Account lookup failed")]
    LookupFailed,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        use AuthError::*;
        match self {
            MissingToken => "missing_token",
            InvalidOrExpiredToken => "invalid_or_expired_token",
            AccountNotFound => "account_not_found",
            AccountInactive => "account_inactive",
            LookupFailed => "lookup_failed",
        }
    }
}

/// `Authorization: Bearer <token>`, if present and non-empty.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_needs_the_scheme_and_a_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer(&headers), Some("abc.def"));
    }
}
