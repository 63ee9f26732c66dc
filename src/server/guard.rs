//! Guard against duplicate concurrent submissions.
//!
//! A repeated tap on the submit button must not start a second registration
//! for the same email while the first is still running. The guard holds the
//! set of emails with a submission in flight; a [`SubmissionTicket`] keeps
//! its email in the set until it is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::credentials::normalize_email;

/// Emails with a registration in flight.
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    in_flight: Mutex<HashSet<String>>,
}

/// Proof that a submission holds its email. Releases it on drop.
#[derive(Debug)]
pub struct SubmissionTicket {
    guard: Arc<SubmissionGuard>,
    email: String,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `email` for a new submission.
    ///
    /// Returns `None` if a submission for the same email (compared
    /// case-insensitively) is already running.
    pub fn begin(self: &Arc<Self>, email: &str) -> Option<SubmissionTicket> {
        let email = normalize_email(email);
        if !self.lock().insert(email.clone()) {
            return None;
        }
        Some(SubmissionTicket {
            guard: Arc::clone(self),
            email,
        })
    }

    /// Number of submissions in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.email);
    }
}
