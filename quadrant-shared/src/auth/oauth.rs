/// OAuth identity verification
///
/// The core never talks to an identity provider directly. It hands the opaque
/// provider token to an [`OAuthVerifier`] and trusts the returned
/// [`OAuthIdentity`] entirely; issuer and audience checks are the verifier's
/// job.
///
/// [`GoogleTokenVerifier`] checks Google ID tokens: it fetches the provider's
/// JWKS over HTTPS, picks the key named by the token's `kid`, and validates the
/// RS256 signature, expiry, audience (the configured client id) and issuer.
/// The key set is cached for [`JWKS_CACHE_TTL`] and refetched early when a
/// token names a key id the cache does not know (provider key rotation).
///
/// # Example
///
/// ```no_run
/// use quadrant_shared::auth::oauth::{GoogleTokenVerifier, OAuthVerifier};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = GoogleTokenVerifier::new("my-client-id.apps.googleusercontent.com");
/// let identity = verifier.verify("eyJhbGciOiJSUzI1NiIs...").await?;
/// println!("{} <{}>", identity.external_id, identity.email);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Google's JWKS endpoint
pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// How long a fetched key set is reused
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Issuers Google signs ID tokens with
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Error type for provider token verification
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// No client id configured, OAuth login is disabled
    #[error("OAuth login is not configured")]
    NotConfigured,

    /// Provider keys could not be fetched
    #[error("Failed to fetch provider keys: {0}")]
    Fetch(String),

    /// Token failed verification
    #[error("Invalid provider token: {0}")]
    Invalid(String),
}

/// Identity extracted from a verified provider token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    /// Provider's stable subject identifier
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Verifies opaque provider tokens
#[async_trait]
pub trait OAuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<OAuthIdentity, OAuthError>;
}

/// Verifier used when no OAuth client id is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOAuthVerifier;

#[async_trait]
impl OAuthVerifier for DisabledOAuthVerifier {
    async fn verify(&self, _token: &str) -> Result<OAuthIdentity, OAuthError> {
        Err(OAuthError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug)]
struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Google ID token verifier
///
/// Clones share one key cache.
#[derive(Debug, Clone)]
pub struct GoogleTokenVerifier {
    client_id: String,
    certs_url: String,
    http: reqwest::Client,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            certs_url: GOOGLE_CERTS_URL.to_string(),
            http: reqwest::Client::new(),
            cache_ttl: JWKS_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Overrides how long fetched keys are reused
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Points the verifier at a different JWKS endpoint
    pub fn with_certs_url(mut self, url: impl Into<String>) -> Self {
        self.certs_url = url.into();
        self
    }

    /// Returns the cached key set while it is fresh, fetching otherwise
    async fn keys(&self, force_refresh: bool) -> Result<JwkSet, OAuthError> {
        if !force_refresh {
            if let Some(cached) = self.cache.read().await.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys = self.fetch_keys().await?;
        tracing::debug!(count = keys.keys.len(), "Fetched provider signing keys");
        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, OAuthError> {
        let response = self
            .http
            .get(&self.certs_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::Fetch(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| OAuthError::Fetch(e.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation
    }
}

#[async_trait]
impl OAuthVerifier for GoogleTokenVerifier {
    async fn verify(&self, token: &str) -> Result<OAuthIdentity, OAuthError> {
        let header = decode_header(token).map_err(|e| OAuthError::Invalid(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OAuthError::Invalid("token header has no key id".to_string()))?;

        let jwk = match self.keys(false).await?.find(&kid) {
            Some(jwk) => jwk.clone(),
            None => self
                .keys(true)
                .await?
                .find(&kid)
                .cloned()
                .ok_or_else(|| OAuthError::Invalid(format!("unknown key id {}", kid)))?,
        };
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| OAuthError::Invalid(e.to_string()))?;

        let data = decode::<GoogleClaims>(token, &key, &self.validation())
            .map_err(|e| OAuthError::Invalid(e.to_string()))?;

        identity_from_claims(data.claims)
    }
}

fn identity_from_claims(claims: GoogleClaims) -> Result<OAuthIdentity, OAuthError> {
    let email = claims
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| OAuthError::Invalid("token carries no email".to_string()))?;

    if claims.sub.is_empty() {
        return Err(OAuthError::Invalid("token carries no subject".to_string()));
    }

    Ok(OAuthIdentity {
        external_id: claims.sub,
        email,
        name: claims.name,
        avatar_url: claims.picture,
    })
}
