/// Authentication service
///
/// Registration, password login, OAuth login, token issuance, refresh and
/// caller resolution. Sessions are stateless: every request re-authenticates
/// by decoding its bearer token and re-reading the user.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use quadrant_shared::auth::oauth::DisabledOAuthVerifier;
/// use quadrant_shared::clock::SystemClock;
/// use quadrant_shared::config::AuthSettings;
/// use quadrant_shared::services::auth::{AuthService, Registration};
/// use quadrant_shared::store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = AuthService::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(AuthSettings::from_env()?),
///     Arc::new(DisabledOAuthVerifier),
///     Arc::new(SystemClock),
/// );
///
/// let user = service
///     .register(Registration {
///         email: "a@x.com".to_string(),
///         password: "Passw0rd".to_string(),
///         full_name: None,
///     })
///     .await?;
/// let tokens = service.create_session_tokens(user.id)?;
/// let caller = service.resolve_caller(&tokens.access_token).await?;
/// assert_eq!(caller.id, user.id);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::jwt::{
    issue_access_token, issue_refresh_token, validate_access_token, validate_refresh_token,
};
use crate::auth::oauth::{OAuthIdentity, OAuthVerifier};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::clock::Clock;
use crate::config::{AuthSettings, HashingParams};
use crate::error::{CoreError, CoreResult};
use crate::models::user::{NewUser, User, UserChanges};
use crate::store::constraints::USERS_EXTERNAL_ID;
use crate::store::UserStore;

/// Registration input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 100, message = "must be 8 to 100 characters"))]
    pub password: String,

    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub full_name: Option<String>,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Hashes off the async runtime; Argon2id is deliberately slow
pub(crate) async fn hash_blocking(password: String, params: HashingParams) -> CoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, &params))
        .await
        .map_err(|e| CoreError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(CoreError::from)
}

pub(crate) async fn verify_blocking(password: String, hash: String) -> CoreResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| CoreError::Internal(format!("Verification task failed: {}", e)))?
        .map_err(CoreError::from)
}

/// Password checked against the placeholder hash; never a real credential
const PLACEHOLDER_PASSWORD: &str = "placeholder-credential";

/// Orchestrates credentials, tokens and the identity store
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    settings: Arc<AuthSettings>,
    oauth: Arc<dyn OAuthVerifier>,
    clock: Arc<dyn Clock>,
    /// Hash with the configured cost, verified when there is no real one
    placeholder_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        settings: Arc<AuthSettings>,
        oauth: Arc<dyn OAuthVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            settings,
            oauth,
            clock,
            placeholder_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Creates a password account
    ///
    /// The email pre-check is only a fast path. Two concurrent registrations
    /// can both pass it; the unique constraint then rejects the loser, which
    /// surfaces as `EmailTaken` as well.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed email or weak password
    /// - `EmailTaken` if the email is already registered
    pub async fn register(&self, input: Registration) -> CoreResult<User> {
        input.validate()?;
        validate_password_strength(&input.password).map_err(CoreError::InvalidInput)?;

        if self.users.find_user_by_email(&input.email).await?.is_some() {
            return Err(CoreError::EmailTaken);
        }

        let password_hash = hash_blocking(input.password, self.settings.hashing).await?;

        let user = self
            .users
            .create_user(&NewUser {
                email: input.email,
                password_hash: Some(password_hash),
                full_name: input.full_name,
                is_verified: false,
                external_id: None,
                avatar_url: None,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verifies email and password
    ///
    /// Every failure is the same `InvalidCredentials`: unknown email,
    /// OAuth-only account, wrong password, inactive account.
    pub async fn login(&self, email: &str, password: &str) -> CoreResult<User> {
        let Some(user) = self.users.find_user_by_email(email).await? else {
            self.burn_verification(password).await;
            warn!("Login attempt for unknown account");
            return Err(CoreError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.clone() else {
            self.burn_verification(password).await;
            warn!(user_id = %user.id, "Password login attempt for OAuth-only account");
            return Err(CoreError::InvalidCredentials);
        };

        if !verify_blocking(password.to_string(), hash).await? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(CoreError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for inactive account");
            return Err(CoreError::InvalidCredentials);
        }

        let user = self.record_login(user).await;
        info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Signs in with a provider token, creating or linking the account
    ///
    /// Resolution order: linked external id, then matching email (the
    /// identity is linked onto that account), then a new pre-verified
    /// OAuth-only account.
    ///
    /// # Errors
    ///
    /// - `InvalidOAuthToken` if the provider token fails verification
    /// - `InvalidCredentials` if the resolved account is deactivated
    pub async fn login_with_oauth(&self, token: &str) -> CoreResult<User> {
        let identity = self.oauth.verify(token).await.map_err(|e| {
            warn!(error = %e, "OAuth token rejected");
            CoreError::from(e)
        })?;

        let user = self.resolve_oauth_identity(&identity).await?;

        if !user.is_active {
            warn!(user_id = %user.id, "OAuth login attempt for inactive account");
            return Err(CoreError::InvalidCredentials);
        }

        Ok(self.record_login(user).await)
    }

    /// Spends one Argon2 verification so a login without a stored hash takes
    /// as long as a wrong password
    async fn burn_verification(&self, password: &str) {
        let hashing = self.settings.hashing;
        let placeholder = self
            .placeholder_hash
            .get_or_try_init(|| hash_blocking(PLACEHOLDER_PASSWORD.to_string(), hashing))
            .await;

        match placeholder {
            Ok(hash) => {
                if let Err(e) = verify_blocking(password.to_string(), hash.clone()).await {
                    warn!(error = %e, "Placeholder verification failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to prepare placeholder hash"),
        }
    }

    async fn resolve_oauth_identity(&self, identity: &OAuthIdentity) -> CoreResult<User> {
        if let Some(user) = self
            .users
            .find_user_by_external_id(&identity.external_id)
            .await?
        {
            return Ok(user);
        }

        if let Some(existing) = self.users.find_user_by_email(&identity.email).await? {
            let changes = UserChanges {
                external_id: Some(identity.external_id.clone()),
                avatar_url: match (&existing.avatar_url, &identity.avatar_url) {
                    (None, Some(url)) => Some(Some(url.clone())),
                    _ => None,
                },
                ..Default::default()
            };
            let linked = match self.users.update_user(existing.id, &changes).await {
                Ok(Some(user)) => user,
                Ok(None) => return Err(CoreError::Internal("Linked user vanished".to_string())),
                Err(e) if e.is_unique_violation_on(USERS_EXTERNAL_ID) => {
                    return self.reload_by_external_id(&identity.external_id).await;
                }
                Err(e) => return Err(e.into()),
            };
            info!(user_id = %linked.id, "Linked OAuth identity to existing account");
            return Ok(linked);
        }

        let created = self
            .users
            .create_user(&NewUser {
                email: identity.email.clone(),
                password_hash: None,
                full_name: identity.name.clone(),
                is_verified: true,
                external_id: Some(identity.external_id.clone()),
                avatar_url: identity.avatar_url.clone(),
            })
            .await;

        match created {
            Ok(user) => {
                info!(user_id = %user.id, "Created account from OAuth identity");
                Ok(user)
            }
            // A concurrent login for the same identity won the insert
            Err(e) if e.is_unique_violation_on(USERS_EXTERNAL_ID) => {
                self.reload_by_external_id(&identity.external_id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reload_by_external_id(&self, external_id: &str) -> CoreResult<User> {
        self.users
            .find_user_by_external_id(external_id)
            .await?
            .ok_or_else(|| CoreError::Internal("OAuth account vanished after conflict".to_string()))
    }

    /// Stamps `last_login`; a failure is logged and otherwise ignored
    async fn record_login(&self, mut user: User) -> User {
        let now = self.clock.now();
        match self.users.touch_last_login(user.id, now).await {
            Ok(()) => user.last_login = Some(now),
            Err(e) => warn!(user_id = %user.id, error = %e, "Failed to record last login"),
        }
        user
    }

    /// Issues a fresh access/refresh pair for `user_id`, stamped with the clock
    pub fn create_session_tokens(&self, user_id: Uuid) -> CoreResult<TokenPair> {
        let now = self.clock.now();
        let secret = &self.settings.jwt_secret;
        let access = issue_access_token(user_id, now, self.settings.access_token_ttl, secret)?;
        let refresh = issue_refresh_token(user_id, now, self.settings.refresh_token_ttl, secret)?;
        Ok(TokenPair::bearer(access, refresh))
    }

    /// Exchanges a refresh token for a new access token
    ///
    /// Nothing is revoked: the presented refresh token stays valid until it
    /// expires.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for a bad, expired or non-refresh token, or when the
    /// user is gone or inactive
    pub async fn refresh(&self, refresh_token: &str) -> CoreResult<String> {
        let user = self.refresh_subject(refresh_token).await?;
        let access = issue_access_token(
            user.id,
            self.clock.now(),
            self.settings.access_token_ttl,
            &self.settings.jwt_secret,
        )?;
        Ok(access)
    }

    /// Like [`refresh`](Self::refresh), but also hands out a new refresh token
    ///
    /// The presented refresh token is not revoked.
    pub async fn refresh_session(&self, refresh_token: &str) -> CoreResult<TokenPair> {
        let user = self.refresh_subject(refresh_token).await?;
        let tokens = self.create_session_tokens(user.id)?;
        info!(user_id = %user.id, "Tokens refreshed");
        Ok(tokens)
    }

    async fn refresh_subject(&self, refresh_token: &str) -> CoreResult<User> {
        let claims =
            validate_refresh_token(refresh_token, &self.settings.jwt_secret, self.clock.now())?;
        self.active_user(claims.sub).await
    }

    /// Resolves the user behind an access token
    pub async fn resolve_caller(&self, access_token: &str) -> CoreResult<User> {
        let claims =
            validate_access_token(access_token, &self.settings.jwt_secret, self.clock.now())?;
        self.active_user(claims.sub).await
    }

    async fn active_user(&self, id: Uuid) -> CoreResult<User> {
        match self.users.find_user_by_id(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(CoreError::InvalidToken),
        }
    }
}
