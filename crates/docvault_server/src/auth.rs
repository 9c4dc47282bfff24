//! Bearer token access control.
//!
//! The expected token is kept only as its SHA-256 digest. Presented tokens
//! are hashed and the fixed-size digests compared, so the comparison does not
//! depend on where the first differing byte is.

use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

/// Checks `Authorization: Bearer <token>` against a shared secret.
#[derive(Clone, Default)]
pub struct TokenGuard {
    expected: Option<[u8; 32]>,
}

impl TokenGuard {
    /// Creates a guard for `token`; `None` lets every request through.
    pub fn new(token: Option<&str>) -> Self {
        Self {
            expected: token.map(digest),
        }
    }

    /// Returns true if requests must carry the token.
    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// Validates the request headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };

        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(ApiError::unauthorized)?;

        let actual = digest(presented);
        let diff = actual
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Ok(())
        } else {
            Err(ApiError::unauthorized())
        }
    }
}

impl std::fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware rejecting requests that fail [`TokenGuard::check`].
pub async fn require_token(
    State(guard): State<TokenGuard>,
    request: Request,
    next: Next,
) -> Response {
    match guard.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn disabled_guard_allows_everything() {
        let guard = TokenGuard::new(None);
        assert!(!guard.is_enabled());
        assert!(guard.check(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn accepts_matching_token() {
        let guard = TokenGuard::new(Some("s3cret"));
        assert!(guard.check(&headers("Bearer s3cret")).is_ok());
        assert!(guard.check(&headers("bearer s3cret")).is_ok());
    }

    #[test]
    fn rejects_missing_or_wrong_token() {
        let guard = TokenGuard::new(Some("s3cret"));
        assert!(guard.check(&HeaderMap::new()).is_err());
        assert!(guard.check(&headers("Bearer nope")).is_err());
        assert!(guard.check(&headers("Basic s3cret")).is_err());
        assert!(guard.check(&headers("Bearer ")).is_err());
        assert!(guard.check(&headers("s3cret")).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let guard = TokenGuard::new(Some("s3cret"));
        assert!(!format!("{guard:?}").contains("s3cret"));
    }
}
