use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};

use super::{apply_sequentially, BatchError, DocumentStore, StoreError, Write, WriteBatch};
use crate::invite::InviteCode;
use crate::models::{MemberRole, UserId, UserRecord};

/// Operations of [`MemoryStore`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    Set,
    Query,
    AddMember,
}

/// In-memory document store.
///
/// Records are kept in insertion order. Batches are atomic unless the store
/// is built with [`MemoryStore::non_transactional`], in which case they fall
/// back to one-at-a-time application.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Vec<UserRecord>>,
    faults: Mutex<HashSet<StoreFault>>,
    transactional: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            faults: Mutex::new(HashSet::new()),
            transactional: true,
        }
    }

    /// A store whose batches are not atomic.
    pub fn non_transactional() -> Self {
        Self {
            transactional: false,
            ..Self::new()
        }
    }

    /// Make every later call of the given operation fail.
    pub async fn inject(&self, fault: StoreFault) {
        self.faults.lock().await.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn check(&self, fault: StoreFault) -> Result<(), StoreError> {
        check_fault(&*self.faults.lock().await, fault)
    }
}

fn check_fault(faults: &HashSet<StoreFault>, fault: StoreFault) -> Result<(), StoreError> {
    if faults.contains(&fault) {
        return Err(StoreError::Unavailable(format!(
            "injected {:?} failure",
            fault
        )));
    }
    Ok(())
}

fn set_record(records: &mut Vec<UserRecord>, record: &UserRecord) -> Result<(), StoreError> {
    if record.is_primary()
        && records
            .iter()
            .any(|r| r.is_primary() && r.link_code == record.link_code && r.id != record.id)
    {
        return Err(StoreError::CodeTaken(record.link_code.clone()));
    }

    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
    Ok(())
}

fn add_member(
    records: &mut [UserRecord],
    primary: &UserId,
    role: MemberRole,
    member: &UserId,
) -> Result<(), StoreError> {
    let record = records
        .iter_mut()
        .find(|r| &r.id == primary)
        .ok_or_else(|| StoreError::NotFound(primary.clone()))?;

    if !record.is_primary() {
        return Err(StoreError::NotPrimary(primary.clone()));
    }

    record
        .members
        .get_or_insert_with(Default::default)
        .add(role, member.clone());
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set_document(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.check(StoreFault::Set).await?;
        set_record(&mut *self.records.write().await, record)
    }

    async fn get_document(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        self.check(StoreFault::Query).await?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| &r.id == id)
            .cloned())
    }

    async fn query_by_link_code(&self, code: &InviteCode) -> Result<Vec<UserRecord>, StoreError> {
        self.check(StoreFault::Query).await?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.link_code == code)
            .cloned()
            .collect())
    }

    async fn array_union_member(
        &self,
        primary: &UserId,
        role: MemberRole,
        member: &UserId,
    ) -> Result<(), StoreError> {
        self.check(StoreFault::AddMember).await?;
        add_member(&mut self.records.write().await, primary, role, member)
    }

    async fn list_documents(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.check(StoreFault::Query).await?;
        Ok(self.records.read().await.clone())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), BatchError> {
        if !self.transactional {
            return apply_sequentially(self, batch).await;
        }

        let faults = self.faults.lock().await.clone();
        let mut records = self.records.write().await;
        let mut staged = records.clone();

        for (index, write) in batch.into_iter().enumerate() {
            let result = match &write {
                Write::Set(record) => check_fault(&faults, StoreFault::Set)
                    .and_then(|_| set_record(&mut staged, record)),
                Write::AddMember {
                    primary,
                    role,
                    member,
                } => check_fault(&faults, StoreFault::AddMember)
                    .and_then(|_| add_member(&mut staged, primary, *role, member)),
            };
            result.map_err(|source| BatchError { index, source })?;
        }

        *records = staged;
        Ok(())
    }
}
