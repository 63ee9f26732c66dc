//! Credential collaborator: creates authentication accounts.
//!
//! The registration workflow only needs one operation from the credential
//! side, `create_account`, which hands back the uid that keys the user's
//! record. Two providers ship with the crate: an in-memory one used by tests
//! and a SQLite-backed one used by the binaries.

mod memory;
mod sqlite;

pub use memory::MemoryCredentials;
pub use sqlite::SqliteCredentials;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::UserId;

/// Minimum password length accepted by the SQLite provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Errors reported by a credential provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// An account with this email already exists.
    #[error("This email is already registered.")]
    DuplicateAccount,

    /// The provider refused the email or password.
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached or failed internally.
    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),
}

/// Creates authentication accounts.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Create an account for `email`, returning its new unique uid.
    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError>;
}

/// Lowercase an email for comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Reject emails that are obviously not addresses.
pub fn check_email_format(email: &str) -> Result<(), AuthError> {
    let badly_formatted = || AuthError::Rejected("The email address is badly formatted.".into());

    if email.chars().any(char::is_whitespace) {
        return Err(badly_formatted());
    }

    let (local, domain) = email.split_once('@').ok_or_else(badly_formatted)?;
    if local.is_empty() || domain.contains('@') {
        return Err(badly_formatted());
    }

    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(badly_formatted());
    }

    Ok(())
}

/// Reject passwords that are too short.
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Rejected(format!(
            "The given password is invalid. [ Password should be at least {} characters ]",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_check_email_format() {
        assert!(check_email_format("a@x.com").is_ok());
        assert!(check_email_format("first.last@sub.example.org").is_ok());

        for bad in ["", "ax.com", "@x.com", "a@", "a@x", "a@x..com", "a b@x.com", "a@b@x.com"] {
            let err = check_email_format(bad).unwrap_err();
            assert_eq!(
                err,
                AuthError::Rejected("The email address is badly formatted.".into()),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_check_password_strength() {
        assert!(check_password_strength("secret").is_ok());
        let err = check_password_strength("p1").unwrap_err();
        assert!(err.to_string().contains("at least 6 characters"));
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::DuplicateAccount.to_string(),
            "This email is already registered."
        );
        assert_eq!(
            AuthError::Unavailable("timeout".into()).to_string(),
            "Authentication service unavailable: timeout"
        );
    }
}
