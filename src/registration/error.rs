use std::fmt;
use thiserror::Error;

use super::validate::ValidationError;
use crate::models::{MemberRole, UserType};

/// Steps of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ValidatingInput,
    CreatingCredential,
    CreatingPrimaryRecord,
    ResolvingLinkCode,
    CreatingSecondaryRecord,
    UpdatingPrimaryMembers,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ValidatingInput => "validating_input",
            Stage::CreatingCredential => "creating_credential",
            Stage::CreatingPrimaryRecord => "creating_primary_record",
            Stage::ResolvingLinkCode => "resolving_link_code",
            Stage::CreatingSecondaryRecord => "creating_secondary_record",
            Stage::UpdatingPrimaryMembers => "updating_primary_members",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a submission.
///
/// The display text is the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("This email is already registered.")]
    DuplicateAccount,

    #[error("Registration failed: {0}")]
    AuthFailure(String),

    #[error("Invalid code.")]
    InvalidCode,

    #[error("Error fetching primary user: {0}")]
    StoreReadFailure(String),

    #[error("Failed to store {label} details: {message}", label = .user_type.label())]
    StoreWriteFailure { user_type: UserType, message: String },

    #[error("Failed to update primary user's {role}: {message}")]
    StoreUpdateFailure { role: MemberRole, message: String },
}

impl RegistrationError {
    /// The step the submission was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            RegistrationError::Invalid(_) => Stage::ValidatingInput,
            RegistrationError::DuplicateAccount | RegistrationError::AuthFailure(_) => {
                Stage::CreatingCredential
            }
            RegistrationError::InvalidCode | RegistrationError::StoreReadFailure(_) => {
                Stage::ResolvingLinkCode
            }
            RegistrationError::StoreWriteFailure {
                user_type: UserType::Primary,
                ..
            } => Stage::CreatingPrimaryRecord,
            RegistrationError::StoreWriteFailure { .. } => Stage::CreatingSecondaryRecord,
            RegistrationError::StoreUpdateFailure { .. } => Stage::UpdatingPrimaryMembers,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationError::Invalid(ValidationError::MissingField(_)) => "missing_field",
            RegistrationError::Invalid(ValidationError::NoUserTypeSelected) => {
                "no_user_type_selected"
            }
            RegistrationError::DuplicateAccount => "duplicate_account",
            RegistrationError::AuthFailure(_) => "auth_failure",
            RegistrationError::InvalidCode => "invalid_code",
            RegistrationError::StoreReadFailure(_) => "store_read_failure",
            RegistrationError::StoreWriteFailure { .. } => "store_write_failure",
            RegistrationError::StoreUpdateFailure { .. } => "store_update_failure",
        }
    }

    /// True for failures the user can fix by editing the form.
    pub fn is_local(&self) -> bool {
        matches!(self, RegistrationError::Invalid(_))
    }
}
