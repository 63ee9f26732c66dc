use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::UserType;
use crate::invite::InviteCode;

/// Raw submission as it arrives from a front end, before validation.
///
/// Every field is optional; `user_type` is kept as text so that an
/// unrecognised choice is reported by validation rather than by the decoder.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_type: Option<String>,
    pub link_code: Option<String>,
}

impl RegistrationForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn with_user_type(mut self, user_type: UserType) -> Self {
        self.user_type = Some(user_type.to_string());
        self
    }

    pub fn with_link_code(mut self, code: impl Into<String>) -> Self {
        self.link_code = Some(code.into());
        self
    }
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("user_type", &self.user_type)
            .field("link_code", &self.link_code)
            .finish()
    }
}

/// A validated registration request.
///
/// All text is trimmed and non-empty; `link_code` is present exactly when
/// `user_type` is a secondary type.
#[derive(Clone, PartialEq)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub user_type: UserType,
    pub link_code: Option<InviteCode>,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("user_type", &self.user_type)
            .field("link_code", &self.link_code)
            .finish()
    }
}
