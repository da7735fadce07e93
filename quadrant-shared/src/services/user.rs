/// Account self-management: profile, password, deactivation
///
/// Every operation acts on the resolved caller; no user can touch another
/// user's account through this service.

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::auth::{hash_blocking, verify_blocking};
use crate::auth::password::validate_password_strength;
use crate::config::AuthSettings;
use crate::error::{CoreError, CoreResult};
use crate::models::double_option;
use crate::models::user::{User, UserChanges};
use crate::store::UserStore;

/// Profile update input
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    /// `Some(None)` clears the name
    #[serde(default, deserialize_with = "double_option")]
    pub full_name: Option<Option<String>>,

    #[validate(
        email(message = "must be a valid email address"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    pub email: Option<String>,
}

/// Password change input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PasswordChange {
    pub current_password: String,

    #[validate(length(min = 8, max = 100, message = "must be 8 to 100 characters"))]
    pub new_password: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    settings: Arc<AuthSettings>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, settings: Arc<AuthSettings>) -> Self {
        Self { users, settings }
    }

    pub async fn get(&self, user_id: Uuid) -> CoreResult<User> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(CoreError::NotFound)
    }

    /// Updates name and/or email
    ///
    /// A changed email must be free and drops the account back to unverified.
    pub async fn update_profile(&self, caller: &User, update: ProfileUpdate) -> CoreResult<User> {
        update.validate()?;
        if let Some(Some(name)) = &update.full_name {
            if name.chars().count() > 255 {
                return Err(CoreError::InvalidInput(
                    "full_name: must be at most 255 characters".to_string(),
                ));
            }
        }

        let mut changes = UserChanges {
            full_name: update.full_name,
            ..Default::default()
        };

        if let Some(email) = update.email.filter(|e| *e != caller.email) {
            if self.users.find_user_by_email(&email).await?.is_some() {
                return Err(CoreError::EmailTaken);
            }
            changes.email = Some(email);
            changes.is_verified = Some(false);
        }

        if changes.is_empty() {
            return Ok(caller.clone());
        }

        let user = self
            .users
            .update_user(caller.id, &changes)
            .await?
            .ok_or(CoreError::NotFound)?;

        info!(user_id = %user.id, "User profile updated");
        Ok(user)
    }

    /// Replaces the password after checking the current one
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the account has no password or the current
    ///   password is wrong
    /// - `InvalidInput` if the new password is too weak
    pub async fn change_password(&self, caller: &User, change: PasswordChange) -> CoreResult<()> {
        change.validate()?;
        validate_password_strength(&change.new_password).map_err(CoreError::InvalidInput)?;

        let Some(hash) = caller.password_hash.clone() else {
            return Err(CoreError::InvalidCredentials);
        };
        if !verify_blocking(change.current_password, hash).await? {
            return Err(CoreError::InvalidCredentials);
        }

        let new_hash = hash_blocking(change.new_password, self.settings.hashing).await?;
        self.users
            .update_user(
                caller.id,
                &UserChanges {
                    password_hash: Some(new_hash),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(CoreError::NotFound)?;

        info!(user_id = %caller.id, "Password changed");
        Ok(())
    }

    /// Marks the account inactive; its tokens stop resolving immediately
    pub async fn deactivate(&self, caller: &User) -> CoreResult<User> {
        let user = self
            .users
            .update_user(
                caller.id,
                &UserChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(CoreError::NotFound)?;

        info!(user_id = %user.id, "User deactivated");
        Ok(user)
    }
}
