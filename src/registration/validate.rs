use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::invite::InviteCode;
use crate::models::{RegistrationForm, RegistrationRequest, UserType};

/// Form inputs that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    Password,
    Name,
    LinkCode,
}

impl Field {
    /// Label shown next to the input.
    pub fn label(&self) -> &'static str {
        match self {
            Field::Email => "Email",
            Field::Password => "Password",
            Field::Name => "Name",
            Field::LinkCode => "Code",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Email => write!(f, "email"),
            Field::Password => write!(f, "password"),
            Field::Name => write!(f, "name"),
            Field::LinkCode => write!(f, "link_code"),
        }
    }
}

/// Local input problems, reported one at a time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{} is required", .0.label())]
    MissingField(Field),

    #[error("Please select a user type.")]
    NoUserTypeSelected,
}

impl ValidationError {
    /// The offending input, if the error is tied to one.
    pub fn field(&self) -> Option<Field> {
        match self {
            ValidationError::MissingField(field) => Some(*field),
            ValidationError::NoUserTypeSelected => None,
        }
    }
}

/// Check a form and turn it into a request.
///
/// Checks run in order: email, password, name, user type, then the invite
/// code for secondary types. The first failing check is returned. Inputs are
/// trimmed; whitespace-only input counts as missing. An unrecognised user
/// type counts as no selection. A code supplied with a primary registration
/// is dropped.
pub fn validate(form: &RegistrationForm) -> Result<RegistrationRequest, ValidationError> {
    let email = required(&form.email, Field::Email)?;
    let password = required(&form.password, Field::Password)?;
    let name = required(&form.name, Field::Name)?;

    let user_type = form
        .user_type
        .as_deref()
        .and_then(|t| t.parse::<UserType>().ok())
        .ok_or(ValidationError::NoUserTypeSelected)?;

    let link_code = if user_type.requires_link_code() {
        Some(InviteCode::new(required(&form.link_code, Field::LinkCode)?))
    } else {
        None
    };

    Ok(RegistrationRequest {
        name,
        email,
        password,
        user_type,
        link_code,
    })
}

fn required(value: &Option<String>, field: Field) -> Result<String, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::MissingField(field))
}
