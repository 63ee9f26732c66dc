//! Document store collaborator: persists and links user records.
//!
//! The operations mirror what the registration workflow needs from a remote
//! document database: write a record under an id, find records by invite
//! code, and add an id to a primary's member list without duplicates.
//!
//! Writes can also be grouped into a [`WriteBatch`]. The default
//! [`DocumentStore::commit`] applies a batch one write at a time and stops at
//! the first failure, so earlier writes stay in place. Stores that support
//! transactions override it to apply all writes or none.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, StoreFault};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::invite::InviteCode;
use crate::models::{MemberRole, UserId, UserRecord};

/// Errors reported by a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(UserId),

    #[error("Document {0} is not a primary record")]
    NotPrimary(UserId),

    #[error("Invite code {0} is already taken")]
    CodeTaken(InviteCode),

    #[error("Corrupt document {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite a record.
    Set(UserRecord),
    /// Add `member` to one of `primary`'s member lists.
    AddMember {
        primary: UserId,
        role: MemberRole,
        member: UserId,
    },
}

/// An ordered group of writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, record: UserRecord) -> Self {
        self.writes.push(Write::Set(record));
        self
    }

    pub fn add_member(mut self, primary: UserId, role: MemberRole, member: UserId) -> Self {
        self.writes.push(Write::AddMember {
            primary,
            role,
            member,
        });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// A failed batch: which write failed, and why.
#[derive(Error, Debug)]
#[error("write {index} of batch failed: {source}")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub source: StoreError,
}

/// Stores user records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite the record stored under `record.id`.
    async fn set_document(&self, record: &UserRecord) -> Result<(), StoreError>;

    /// Fetch a record by id.
    async fn get_document(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

    /// All records carrying `code`, in store order (earliest created first).
    async fn query_by_link_code(&self, code: &InviteCode) -> Result<Vec<UserRecord>, StoreError>;

    /// Add `member` to `primary`'s `role` list unless already present.
    ///
    /// Fails with `NotFound` if `primary` does not exist and `NotPrimary` if
    /// it is not a primary record.
    async fn array_union_member(
        &self,
        primary: &UserId,
        role: MemberRole,
        member: &UserId,
    ) -> Result<(), StoreError>;

    /// All records in store order.
    async fn list_documents(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Apply a batch of writes.
    async fn commit(&self, batch: WriteBatch) -> Result<(), BatchError> {
        apply_sequentially(self, batch).await
    }
}

/// Apply writes in order, stopping at the first failure. Writes before the
/// failing one are not undone.
pub async fn apply_sequentially<S>(store: &S, batch: WriteBatch) -> Result<(), BatchError>
where
    S: DocumentStore + ?Sized,
{
    for (index, write) in batch.into_iter().enumerate() {
        let result = match write {
            Write::Set(record) => store.set_document(&record).await,
            Write::AddMember {
                primary,
                role,
                member,
            } => store.array_union_member(&primary, role, &member).await,
        };
        result.map_err(|source| BatchError { index, source })?;
    }
    Ok(())
}
