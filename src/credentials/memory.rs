use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{normalize_email, AuthError, CredentialProvider};
use crate::models::UserId;

/// In-memory credential provider.
///
/// Accepts any non-duplicate email. A failure can be injected to stand in
/// for a rejecting or unreachable provider.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    /// Uids indexed by normalized email.
    accounts: Mutex<HashMap<String, UserId>>,
    /// Error returned by every call while set.
    failure: Mutex<Option<AuthError>>,
    calls: AtomicUsize,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_account` call fail with `error`.
    pub async fn fail_with(&self, error: AuthError) {
        *self.failure.lock().await = Some(error);
    }

    /// Number of `create_account` calls received, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of accounts created.
    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentials {
    async fn create_account(&self, email: &str, _password: &str) -> Result<UserId, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }

        let mut accounts = self.accounts.lock().await;
        let key = normalize_email(email);
        if accounts.contains_key(&key) {
            return Err(AuthError::DuplicateAccount);
        }

        let uid = UserId::new();
        accounts.insert(key, uid.clone());
        Ok(uid)
    }
}
