/// JWT token generation and validation module
///
/// Tokens are signed with HS256 using the process-wide secret and carry the
/// claims `{sub, iat, exp, type}`. Tokens are stateless: nothing is stored
/// server-side, so a refresh token stays valid until it expires.
///
/// Time is always supplied by the caller. `iat`/`exp` are computed from the
/// issuing instant and expiry is checked against the validating instant, so
/// the services can drive both from their injected clock.
///
/// # Token Types
///
/// - **Access Token**: short-lived (default 30 minutes), authorizes requests
/// - **Refresh Token**: long-lived (default 7 days), obtains new access tokens
///
/// Signature validity and token type are separate checks: a refresh token is
/// a perfectly valid signed token, so callers that expect an access token must
/// use [`validate_access_token`] (or check `token_type` themselves).
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use quadrant_shared::auth::jwt::{issue_access_token, validate_token, JwtError, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes-long";
/// let user_id = Uuid::new_v4();
/// let now = Utc::now();
///
/// let token = issue_access_token(user_id, now, Duration::minutes(30), secret)?;
/// let claims = validate_token(&token, secret, now)?;
/// assert_eq!(claims.sub, user_id);
/// assert_eq!(claims.token_type, TokenType::Access);
///
/// let later = now + Duration::minutes(31);
/// assert!(matches!(validate_token(&token, secret, later), Err(JwtError::Expired)));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature mismatch or malformed token
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Structurally valid token used for the wrong purpose
    #[error("Expected {expected} token, got {actual} token")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Access or refresh
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims issued at `issued_at` and expiring `ttl` later
    ///
    /// A negative `ttl` produces claims that are already expired.
    ///
    /// # Errors
    ///
    /// `JwtError::CreateError` if the expiry falls outside the representable
    /// date range
    pub fn new(
        user_id: Uuid,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, JwtError> {
        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            JwtError::CreateError(format!("Token lifetime {} is out of range", ttl))
        })?;

        Ok(Self {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_type,
        })
    }

    /// Checks if the token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// Gets time left until expiration, measured from `now`
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        let now = now.timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Issues an access token for `subject`
pub fn issue_access_token(
    subject: Uuid,
    issued_at: DateTime<Utc>,
    ttl: Duration,
    secret: &str,
) -> Result<String, JwtError> {
    create_token(&Claims::new(subject, TokenType::Access, issued_at, ttl)?, secret)
}

/// Issues a refresh token for `subject`
pub fn issue_refresh_token(
    subject: Uuid,
    issued_at: DateTime<Utc>,
    ttl: Duration,
    secret: &str,
) -> Result<String, JwtError> {
    create_token(&Claims::new(subject, TokenType::Refresh, issued_at, ttl)?, secret)
}

/// Validates the signature, then checks expiry against `now`
///
/// jsonwebtoken's own expiry check reads the wall clock, so it is disabled
/// and `exp` is compared here instead. No leeway is granted: a token is
/// rejected from its `exp` second onwards.
///
/// # Errors
///
/// - `JwtError::Expired` once `exp` has passed
/// - `JwtError::Invalid` on signature mismatch or malformed structure
pub fn validate_token(token: &str, secret: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| JwtError::Invalid(e.to_string()))?
        .claims;

    if claims.is_expired_at(now) {
        return Err(JwtError::Expired);
    }

    Ok(claims)
}

/// Validates token and requires it to be an access token
pub fn validate_access_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret, now)?, TokenType::Access)
}

/// Validates token and requires it to be a refresh token
pub fn validate_refresh_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret, now)?, TokenType::Refresh)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access, at(), Duration::minutes(30)).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iat, at().timestamp());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
        assert!(!claims.is_expired_at(at()));
        assert!(claims.is_expired_at(at() + Duration::minutes(30)));

        let left = claims.time_until_expiration(at() + Duration::minutes(10)).unwrap();
        assert_eq!(left, Duration::minutes(20));
    }

    #[test]
    fn test_claims_reject_out_of_range_lifetime() {
        let result = Claims::new(
            Uuid::new_v4(),
            TokenType::Access,
            at(),
            Duration::minutes(1_000_000_000_000),
        );
        assert!(matches!(result, Err(JwtError::CreateError(_))));

        let result = issue_refresh_token(Uuid::new_v4(), at(), Duration::days(200_000_000), SECRET);
        assert!(matches!(result, Err(JwtError::CreateError(_))));
    }

    #[test]
    fn test_type_claim_serialized_as_type() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Refresh, at(), Duration::days(7)).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert!(json.get("token_type").is_none());
    }

    #[test]
    fn test_access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_access_token(user_id, at(), Duration::minutes(30), SECRET).unwrap();

        let claims = validate_token(&token, SECRET, at()).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_refresh_token(user_id, at(), Duration::days(7), SECRET).unwrap();

        let claims = validate_refresh_token(&token, SECRET, at() + Duration::days(6)).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = issue_access_token(Uuid::new_v4(), at(), Duration::minutes(5), SECRET).unwrap();
        let result = validate_token(&token, "another-secret-key-that-is-32-bytes!!", at());
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_validate_malformed_token() {
        assert!(matches!(
            validate_token("not.a.token", SECRET, at()),
            Err(JwtError::Invalid(_))
        ));
        assert!(matches!(validate_token("", SECRET, at()), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expiry_follows_the_supplied_time() {
        let token = issue_access_token(Uuid::new_v4(), at(), Duration::minutes(30), SECRET).unwrap();

        assert!(validate_token(&token, SECRET, at() + Duration::minutes(29)).is_ok());
        assert!(matches!(
            validate_token(&token, SECRET, at() + Duration::minutes(30)),
            Err(JwtError::Expired)
        ));
        assert!(matches!(
            validate_token(&token, SECRET, at() + Duration::days(30)),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims =
            Claims::new(Uuid::new_v4(), TokenType::Access, at(), Duration::seconds(-3600)).unwrap();
        assert!(claims.is_expired_at(at()));
        assert!(claims.time_until_expiration(at()).is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET, at()), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_type_is_checked_separately() {
        let user_id = Uuid::new_v4();
        let access = issue_access_token(user_id, at(), Duration::minutes(5), SECRET).unwrap();
        let refresh = issue_refresh_token(user_id, at(), Duration::days(1), SECRET).unwrap();

        // Both are validly signed
        assert!(validate_token(&access, SECRET, at()).is_ok());
        assert!(validate_token(&refresh, SECRET, at()).is_ok());

        assert!(validate_access_token(&access, SECRET, at()).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET, at()),
            Err(JwtError::WrongType { expected: "access", actual: "refresh" })
        ));
        assert!(validate_refresh_token(&refresh, SECRET, at()).is_ok());
        assert!(matches!(
            validate_refresh_token(&access, SECRET, at()),
            Err(JwtError::WrongType { expected: "refresh", actual: "access" })
        ));
    }
}
