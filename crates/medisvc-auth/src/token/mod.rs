//! Token issuance and validation.
//!
//! This module provides:
//!
//! - Class-tagged access and refresh tokens
//! - Signing key rings with rotation support
//! - Bearer token extraction for request middleware

pub mod jwt;

pub use jwt::{
    IssuedToken, JwtError, JwtService, KeyRing, SigningAlgorithm, SigningKey, TokenClaims,
    TokenClass, TokenLifetimes,
};

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for other schemes
/// or an empty token.
///
/// ```
/// use medisvc_auth::token::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
/// ```
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("BEARER  abc "), Some("abc"));
    }

    #[test]
    fn test_extract_bearer_token_rejects() {
        assert_eq!(extract_bearer_token(""), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Bearer   "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
