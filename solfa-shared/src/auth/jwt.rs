/// Session token generation and validation module
///
/// Session tokens are JWTs signed with a single shared secret. They carry the
/// identity of the user (username and email), the issuer, and an absolute
/// expiry 24 hours after issuance. Nothing is persisted server-side: a token
/// is valid for as long as its signature and expiry check out.
///
/// # Security
///
/// - **Signing**: HS256 (HMAC-SHA256)
/// - **Accepted on validation**: HMAC family only (HS256, HS384, HS512)
/// - **Expiration**: 24 hours
/// - **Validation**: Signature, algorithm, expiration, not-before and issuer
///
/// # Example
///
/// ```
/// use solfa_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = Claims::new("alice", "alice@example.com");
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.username, "alice");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Issuer written into and required from every session token
pub const ISSUER: &str = "solfa";

/// Session lifetime
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature does not match the secret
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token was signed with an algorithm outside the HMAC family
    #[error("Unexpected signing algorithm")]
    InvalidAlgorithm,

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    /// Anything else: bad encoding, missing claims, immature token
    #[error("Invalid token: {0}")]
    Malformed(String),
}

/// Session claims
///
/// # Standard Claims
///
/// - `iss`: Issuer (always "solfa")
/// - `iat`: Issued at timestamp
/// - `nbf`: Not before timestamp
/// - `exp`: Expiration timestamp
///
/// # Identity Claims
///
/// - `username`: Display name at login time
/// - `email`: Account email, used to look the user up on each request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the authenticated user
    pub username: String,

    /// Email of the authenticated user
    pub email: String,

    /// Issuer - Always "solfa"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims expiring 24 hours from now
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self::with_expiration(username, email, Duration::hours(TOKEN_LIFETIME_HOURS))
    }

    /// Creates claims with a custom lifetime
    ///
    /// A negative duration yields claims that are already expired, which is
    /// handy in tests.
    pub fn with_expiration(
        username: impl Into<String>,
        email: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            username: username.into(),
            email: email.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Creates a signed session token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a session token and extracts its claims
///
/// Verifies:
/// - Signature is valid for `secret`
/// - Algorithm is HS256, HS384 or HS512
/// - Token hasn't expired and is not used before its nbf time
/// - Issuer is "solfa"
///
/// # Example
///
/// ```
/// use solfa_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes";
/// let token = create_token(&Claims::new("bob", "bob@example.com"), secret)?;
///
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.email, "bob@example.com");
/// assert!(validate_token(&token, "another-secret").is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => JwtError::InvalidAlgorithm,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: ISSUER.to_string(),
            },
            _ => JwtError::Malformed(e.to_string()),
        }
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new("alice", "alice@example.com");

        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.iss, "solfa");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_with_custom_expiration() {
        let claims = Claims::with_expiration("alice", "alice@example.com", Duration::hours(1));

        let time_left = claims.time_until_expiration().unwrap();
        assert!(time_left.num_seconds() > 3500);
        assert!(time_left.num_seconds() <= 3600);
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = Claims::new("alice", "alice@example.com");
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated, claims);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new("a", "a@example.com"), SECRET).unwrap();

        let result = validate_token(&token, "another-secret-key-at-least-32-bytes");
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_validate_expired_token() {
        // Expired well beyond the default validation leeway
        let claims = Claims::with_expiration("a", "a@example.com", Duration::seconds(-3600));
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        let result = validate_token(&token, SECRET);

        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let token = create_token(&Claims::new("a", "a@example.com"), SECRET).unwrap();

        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[5] = if chars[5] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}", unsigned, chars.into_iter().collect::<String>());

        assert!(validate_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = create_token(&Claims::new("a", "a@example.com"), SECRET).unwrap();
        let other = create_token(&Claims::new("mallory", "mallory@example.com"), SECRET).unwrap();

        // Swap in another token's payload while keeping the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(matches!(
            validate_token(&forged, SECRET),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_other_hmac_algorithms_are_accepted() {
        let claims = Claims::new("a", "a@example.com");
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(validate_token(&token, SECRET).unwrap(), claims);
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let mut claims = Claims::new("a", "a@example.com");
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::InvalidIssuer { .. })
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            validate_token("not-a-jwt", SECRET),
            Err(JwtError::Malformed(_))
        ));
    }
}
