//! Outcome notifications for the front end.
//!
//! Each submission ends with exactly one [`Notice`]: a success message that
//! the caller uses to move on, or a failure message to display, optionally
//! pointing at the form input to highlight.

use serde::Serialize;
use std::sync::Mutex;

use crate::registration::{Field, Outcome, RegistrationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Failure,
}

/// A message for the user about how a submission ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            field: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: message.into(),
            field: None,
        }
    }

    pub fn from_outcome(outcome: &Outcome) -> Self {
        Self::success(outcome.message())
    }

    pub fn from_error(error: &RegistrationError) -> Self {
        let field = match error {
            RegistrationError::Invalid(e) => e.field(),
            _ => None,
        };
        Self {
            field,
            ..Self::failure(error.to_string())
        }
    }

    pub fn from_result(result: &Result<Outcome, RegistrationError>) -> Self {
        match result {
            Ok(outcome) => Self::from_outcome(outcome),
            Err(error) => Self::from_error(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}

/// Receives the notice that ends each submission.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Forwards notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notice: &Notice) {
        match notice.kind {
            NoticeKind::Success => tracing::info!("{}", notice.message),
            NoticeKind::Failure => tracing::warn!(field = ?notice.field, "{}", notice.message),
        }
    }
}

/// Keeps every notice it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invite::InviteCode;
    use crate::models::{UserId, UserType};
    use crate::registration::ValidationError;

    #[test]
    fn test_notice_from_outcomes() {
        let created = Outcome::Created {
            uid: UserId::from("u1"),
            link_code: InviteCode::new("AB12CD"),
        };
        assert_eq!(
            Notice::from_outcome(&created),
            Notice::success("Primary account created successfully.")
        );

        let linked = Outcome::Linked {
            uid: UserId::from("u2"),
            primary: UserId::from("u1"),
            user_type: UserType::Elder,
        };
        assert_eq!(
            Notice::from_outcome(&linked).message,
            "Elder linked to primary successfully."
        );
    }

    #[test]
    fn test_notice_from_validation_error_points_at_field() {
        let error = RegistrationError::from(ValidationError::MissingField(Field::LinkCode));
        let notice = Notice::from_error(&error);

        assert_eq!(notice.kind, NoticeKind::Failure);
        assert_eq!(notice.message, "Code is required");
        assert_eq!(notice.field, Some(Field::LinkCode));
    }

    #[test]
    fn test_notice_from_remote_error_has_no_field() {
        let notice = Notice::from_result(&Err(RegistrationError::DuplicateAccount));
        assert_eq!(notice.message, "This email is already registered.");
        assert!(notice.field.is_none());
        assert!(!notice.is_success());
    }

    #[test]
    fn test_notice_json_shape() {
        let notice = Notice::from_error(&RegistrationError::from(ValidationError::MissingField(
            Field::Email,
        )));
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["kind"], "failure");
        assert_eq!(json["field"], "email");

        let json = serde_json::to_value(Notice::success("ok")).unwrap();
        assert!(json.get("field").is_none());
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.notify(&Notice::success("one"));
        sink.notify(&Notice::failure("two"));

        let notices = sink.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].message, "two");
    }
}
