/// Request authentication helpers
///
/// The API server wraps protected routes in a layer that reads the
/// `Authorization` header, validates the session token and stores an
/// [`AuthContext`] in the request extensions. Handlers pick it up with
/// `Extension<AuthContext>`.
///
/// The header value may carry the token bare or with a `Bearer ` prefix.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use solfa_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.username)
/// }
/// ```

use serde::{Deserialize, Serialize};

use super::jwt::{validate_token, Claims, JwtError};

/// Identity of the caller, added to request extensions after authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Username carried by the session token
    pub username: String,

    /// Email carried by the session token
    pub email: String,
}

impl AuthContext {
    /// Creates auth context from validated claims
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            username: claims.username,
            email: claims.email,
        }
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token in the header (absent, empty, or only the prefix)
    #[error("Missing token")]
    MissingToken,

    /// Token validation failed
    #[error("Invalid or expired token: {0}")]
    InvalidToken(#[from] JwtError),
}

/// Extracts the raw token from an `Authorization` header value
///
/// Strips one optional leading `"Bearer "`. Absent or blank values yield
/// `AuthError::MissingToken`.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.unwrap_or_default();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

/// Authenticates an `Authorization` header value
///
/// # Errors
///
/// - `AuthError::MissingToken` if there is no token
/// - `AuthError::InvalidToken` if the token fails validation
pub fn authenticate(header: Option<&str>, secret: &str) -> Result<AuthContext, AuthError> {
    let token = extract_bearer(header)?;
    let claims = validate_token(token, secret)?;

    Ok(AuthContext::from_claims(claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::create_token;
    use chrono::Duration;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_extract_bearer_with_and_without_prefix() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(extract_bearer(Some("abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_missing() {
        assert!(matches!(extract_bearer(None), Err(AuthError::MissingToken)));
        assert!(matches!(extract_bearer(Some("")), Err(AuthError::MissingToken)));
        assert!(matches!(extract_bearer(Some("Bearer ")), Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_authenticate_valid_token() {
        let token = create_token(&Claims::new("alice", "alice@example.com"), SECRET).unwrap();
        let header = format!("Bearer {}", token);

        let ctx = authenticate(Some(&header), SECRET).unwrap();
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.email, "alice@example.com");
    }

    #[test]
    fn test_authenticate_expired_token() {
        let claims = Claims::with_expiration("a", "a@example.com", Duration::hours(-2));
        let token = create_token(&claims, SECRET).unwrap();

        let result = authenticate(Some(&token), SECRET);
        assert!(matches!(result, Err(AuthError::InvalidToken(JwtError::Expired))));
    }
}
