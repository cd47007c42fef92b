/// Authentication utilities
///
/// This module provides the authentication primitives for Solfa:
///
/// # Modules
///
/// - [`password`]: Argon2 password hashing and verification tokens
/// - [`jwt`]: Session token issuing and validation
/// - [`middleware`]: Bearer header parsing and the per-request `AuthContext`
///
/// # Example
///
/// ```
/// use solfa_shared::auth::password::{hash_password, verify_password};
/// use solfa_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new("alice", "alice@example.com");
/// let token = create_token(&claims, "secret-key")?;
/// let decoded = validate_token(&token, "secret-key")?;
/// assert_eq!(decoded.email, "alice@example.com");
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
