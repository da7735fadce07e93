/// Authentication settings
///
/// Immutable configuration established once at startup and handed to the
/// services behind an `Arc`. Nothing in the crate reads these values from a
/// global.
///
/// # Environment Variables
///
/// - `JWT_SECRET`: HS256 signing secret, at least 32 characters (required)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: access token lifetime (default: 30)
/// - `REFRESH_TOKEN_EXPIRE_DAYS`: refresh token lifetime (default: 7)
/// - `ARGON2_MEMORY_KIB`: Argon2id memory cost (default: 65536)
/// - `ARGON2_ITERATIONS`: Argon2id time cost (default: 3)
/// - `ARGON2_PARALLELISM`: Argon2id lanes (default: 4)
/// - `GOOGLE_CLIENT_ID`: OAuth client id; OAuth login is disabled when unset
///
/// # Example
///
/// ```no_run
/// use quadrant_shared::config::AuthSettings;
///
/// # fn example() -> Result<(), quadrant_shared::config::ConfigError> {
/// let settings = AuthSettings::from_env()?;
/// assert_eq!(settings.access_token_ttl.num_minutes(), 30);
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Minimum accepted length of the signing secret
pub const MIN_SECRET_LEN: usize = 32;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// A variable is present but unusable
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Process-wide authentication settings
#[derive(Clone)]
pub struct AuthSettings {
    /// HS256 signing secret. Never logged, never serialized.
    pub jwt_secret: String,

    /// Lifetime of access tokens
    pub access_token_ttl: Duration,

    /// Lifetime of refresh tokens
    pub refresh_token_ttl: Duration,

    /// Password hashing cost
    pub hashing: HashingParams,

    /// OAuth client id the provider tokens must be issued for
    pub oauth_client_id: Option<String>,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[redacted]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("hashing", &self.hashing)
            .field("oauth_client_id", &self.oauth_client_id)
            .finish()
    }
}

impl AuthSettings {
    /// Creates settings with default TTLs and hashing cost
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the secret is shorter than 32 characters
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {} characters long", MIN_SECRET_LEN),
            });
        }

        Ok(Self {
            jwt_secret,
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
            hashing: HashingParams::default(),
            oauth_client_id: None,
        })
    }

    /// Loads settings from environment variables (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        let mut settings = Self::new(secret)?;

        settings.access_token_ttl = ttl(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", 30i64)?,
            Duration::try_minutes,
        )?;
        settings.refresh_token_ttl = ttl(
            "REFRESH_TOKEN_EXPIRE_DAYS",
            parse_var("REFRESH_TOKEN_EXPIRE_DAYS", 7i64)?,
            Duration::try_days,
        )?;
        settings.hashing = HashingParams {
            memory_kib: parse_var("ARGON2_MEMORY_KIB", 65536u32)?,
            iterations: parse_var("ARGON2_ITERATIONS", 3u32)?,
            parallelism: parse_var("ARGON2_PARALLELISM", 4u32)?,
        };
        settings.oauth_client_id = env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty());

        if settings.access_token_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_EXPIRE_MINUTES",
                reason: "must be positive".to_string(),
            });
        }
        if settings.refresh_token_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_EXPIRE_DAYS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(settings)
    }

    /// Overrides the hashing cost (tests use cheap parameters)
    pub fn with_hashing(mut self, hashing: HashingParams) -> Self {
        self.hashing = hashing;
        self
    }

    /// Sets the OAuth client id
    pub fn with_oauth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.oauth_client_id = Some(client_id.into());
        self
    }
}

/// Converts a configured amount into a TTL, rejecting values chrono cannot represent
fn ttl(
    name: &'static str,
    amount: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    unit(amount).ok_or_else(|| ConfigError::Invalid {
        name,
        reason: format!("{} is out of range", amount),
    })
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
