/// User model
///
/// A user is an identity plus credentials. Password-only accounts carry a
/// `password_hash`; OAuth-only accounts carry an `external_id` and no hash;
/// linked accounts carry both. Users are never hard-deleted here: deactivation
/// flips `is_active`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255),
///     full_name VARCHAR(255),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     external_id VARCHAR(255),
///     avatar_url VARCHAR(500),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
///     last_login TIMESTAMPTZ,
///     CONSTRAINT users_email_key UNIQUE (email),
///     CONSTRAINT users_external_id_key UNIQUE (external_id),
///     CONSTRAINT users_credential_check
///         CHECK (password_hash IS NOT NULL OR external_id IS NOT NULL)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique; compared exactly as stored
    pub email: String,

    /// Argon2id PHC string, absent for OAuth-only accounts
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub full_name: Option<String>,

    pub is_active: bool,

    pub is_verified: bool,

    /// Provider subject of the linked OAuth identity
    #[serde(skip_serializing, default)]
    pub external_id: Option<String>,

    pub avatar_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// True when the account can only sign in through its OAuth provider
    pub fn is_oauth_only(&self) -> bool {
        self.password_hash.is_none()
    }
}

/// Input for creating a user
///
/// At least one of `password_hash` / `external_id` must be set.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub is_verified: bool,
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
}

/// Partial update of a user
///
/// Only `Some` fields are written. For nullable columns use `Some(None)` to
/// clear the value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub external_id: Option<String>,
    pub avatar_url: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.full_name.is_none()
            && self.is_active.is_none()
            && self.is_verified.is_none()
            && self.external_id.is_none()
            && self.avatar_url.is_none()
    }

    /// Applies the changes to an in-memory copy
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = Some(hash.clone());
        }
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(verified) = self.is_verified {
            user.is_verified = verified;
        }
        if let Some(external_id) = &self.external_id {
            user.external_id = Some(external_id.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            user.avatar_url = avatar_url.clone();
        }
    }
}
