/// Credential and token primitives
///
/// Pure functions and one external seam, no storage:
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing, verification and strength rules
/// - [`jwt`]: HS256 access/refresh token issuance and validation
/// - [`oauth`]: provider token verification behind the [`oauth::OAuthVerifier`] trait
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use quadrant_shared::auth::jwt::{issue_refresh_token, validate_refresh_token};
/// use quadrant_shared::auth::password::{hash_password, verify_password};
/// use quadrant_shared::config::HashingParams;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let params = HashingParams { memory_kib: 4096, iterations: 1, parallelism: 1 };
/// let hash = hash_password("Passw0rd", &params)?;
/// assert!(verify_password("Passw0rd", &hash)?);
///
/// let secret = "secret-key-that-is-at-least-32-bytes";
/// let now = Utc::now();
/// let token = issue_refresh_token(Uuid::new_v4(), now, Duration::days(7), secret)?;
/// validate_refresh_token(&token, secret, now)?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod oauth;
pub mod password;
