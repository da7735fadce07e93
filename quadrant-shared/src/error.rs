/// Core error taxonomy
///
/// Every service operation fails with a [`CoreError`]. The kinds are
/// transport-agnostic; mapping them to HTTP status codes is the presentation
/// layer's job. Display strings are stable and never reveal whether an account
/// or resource exists.

use crate::auth::{jwt::JwtError, oauth::OAuthError, password::PasswordError};
use crate::store::StoreError;

/// Result alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure kinds surfaced by the core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-supplied value violates a structural constraint
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Email already registered to another account
    #[error("Email already registered")]
    EmailTaken,

    /// Login failed (deliberately undifferentiated)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Bearer token unusable: bad signature, expired, wrong type, or subject gone
    #[error("Could not validate credentials")]
    InvalidToken,

    /// External provider token failed verification
    #[error("Invalid OAuth token")]
    InvalidOAuthToken,

    /// Entity absent, or present but owned by someone else
    #[error("Resource not found")]
    NotFound,

    /// Caller holds the entity but is not its owner
    #[error("Not authorized to modify this resource")]
    Forbidden,

    /// Anything unanticipated (storage failure, hashing failure)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short machine-readable code for the kind
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::EmailTaken => "email_taken",
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::InvalidToken => "invalid_token",
            CoreError::InvalidOAuthToken => "invalid_oauth_token",
            CoreError::NotFound => "not_found",
            CoreError::Forbidden => "forbidden",
            CoreError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { ref constraint } if constraint.contains("email") => {
                CoreError::EmailTaken
            }
            other => CoreError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for CoreError {
    fn from(err: PasswordError) -> Self {
        CoreError::Internal(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for CoreError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => CoreError::Internal(msg),
            _ => CoreError::InvalidToken,
        }
    }
}

impl From<OAuthError> for CoreError {
    fn from(_: OAuthError) -> Self {
        CoreError::InvalidOAuthToken
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{}: {}", field, message)
            })
            .collect();
        fields.sort();
        CoreError::InvalidInput(fields.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_constraint_maps_to_email_taken() {
        let err = StoreError::UniqueViolation {
            constraint: "users_email_key".to_string(),
        };
        assert!(matches!(CoreError::from(err), CoreError::EmailTaken));
    }

    #[test]
    fn test_other_constraint_is_internal() {
        let err = StoreError::UniqueViolation {
            constraint: "users_external_id_key".to_string(),
        };
        assert!(matches!(CoreError::from(err), CoreError::Internal(_)));
    }

    #[test]
    fn test_jwt_errors_collapse_to_invalid_token() {
        assert!(matches!(CoreError::from(JwtError::Expired), CoreError::InvalidToken));
        assert!(matches!(
            CoreError::from(JwtError::Invalid("bad".to_string())),
            CoreError::InvalidToken
        ));
    }

    #[test]
    fn test_messages_do_not_leak() {
        assert_eq!(CoreError::NotFound.to_string(), "Resource not found");
        assert_eq!(
            CoreError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
        assert_eq!(CoreError::Forbidden.code(), "forbidden");
    }
}
