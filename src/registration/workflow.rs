use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use super::error::{RegistrationError, Stage};
use super::validate::{validate, Field, ValidationError};
use crate::credentials::{AuthError, CredentialProvider};
use crate::invite::{CodeGenerator, InviteCode, RandomCodes};
use crate::models::{
    MemberRole, RegistrationForm, RegistrationRequest, ScheduleId, UserId, UserRecord, UserType,
};
use crate::notify::{Notice, NotificationSink};
use crate::store::{DocumentStore, StoreError, WriteBatch};

/// Default number of invite codes drawn before giving up on a collision.
pub const DEFAULT_INVITE_CODE_ATTEMPTS: usize = 5;

/// Successful end of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// A primary record was created with a fresh invite code.
    Created { uid: UserId, link_code: InviteCode },
    /// A secondary record was created and added to `primary`'s members.
    Linked {
        uid: UserId,
        primary: UserId,
        user_type: UserType,
    },
}

impl Outcome {
    /// Uid of the newly registered user.
    pub fn uid(&self) -> &UserId {
        match self {
            Outcome::Created { uid, .. } | Outcome::Linked { uid, .. } => uid,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Outcome::Created { .. } => "Primary account created successfully.".to_string(),
            Outcome::Linked { user_type, .. } => {
                format!("{} linked to primary successfully.", user_type.label())
            }
        }
    }
}

/// Runs registrations against a credential provider and a document store.
///
/// Each submission is a strict sequence of awaited remote calls; a failing
/// step ends the submission and nothing is retried. A credential created
/// before a failing store step is left in place.
#[derive(Clone)]
pub struct Registrar {
    credentials: Arc<dyn CredentialProvider>,
    store: Arc<dyn DocumentStore>,
    codes: Arc<dyn CodeGenerator>,
    invite_code_attempts: usize,
}

impl Registrar {
    pub fn new(credentials: Arc<dyn CredentialProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            credentials,
            store,
            codes: Arc::new(RandomCodes),
            invite_code_attempts: DEFAULT_INVITE_CODE_ATTEMPTS,
        }
    }

    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    /// Number of codes to draw before failing a primary registration.
    pub fn with_invite_code_attempts(mut self, attempts: usize) -> Self {
        self.invite_code_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Validate a form, submit it, and send the resulting notice to `sink`.
    pub async fn handle(
        &self,
        form: &RegistrationForm,
        sink: &dyn NotificationSink,
    ) -> Result<Outcome, RegistrationError> {
        tracing::debug!(stage = %Stage::ValidatingInput, "Validating registration form");

        let result = match validate(form) {
            Ok(request) => self.submit(&request).await,
            Err(e) => Err(e.into()),
        };

        sink.notify(&Notice::from_result(&result));
        result
    }

    /// Run a validated request through credential creation and record writes.
    pub async fn submit(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Outcome, RegistrationError> {
        let span = tracing::info_span!(
            "registration",
            email = %request.email,
            user_type = %request.user_type
        );

        async {
            tracing::info!("Attempting to register user");

            let result = self.run(request).await;
            match &result {
                Ok(outcome) => {
                    tracing::info!(stage = %Stage::Done, uid = %outcome.uid(), "Registration complete")
                }
                Err(e) => tracing::warn!(stage = %e.stage(), "Registration failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &RegistrationRequest) -> Result<Outcome, RegistrationError> {
        let uid = self.create_credential(request).await?;

        match request.user_type.member_role() {
            None => self.create_primary(uid, request).await,
            Some(role) => {
                let code = request
                    .link_code
                    .as_ref()
                    .ok_or(ValidationError::MissingField(Field::LinkCode))?;
                self.link_secondary(uid, request, role, code).await
            }
        }
    }

    async fn create_credential(
        &self,
        request: &RegistrationRequest,
    ) -> Result<UserId, RegistrationError> {
        tracing::debug!(stage = %Stage::CreatingCredential, "Creating credential");

        let uid = self
            .credentials
            .create_account(&request.email, &request.password)
            .await
            .map_err(|e| match e {
                AuthError::DuplicateAccount => RegistrationError::DuplicateAccount,
                other => RegistrationError::AuthFailure(other.to_string()),
            })?;

        tracing::debug!(%uid, "Credential created");
        Ok(uid)
    }

    /// Write a primary record under a fresh invite code.
    ///
    /// A drawn code is skipped if the store already holds it, and redrawn if
    /// the write itself reports it taken by a concurrent registration.
    async fn create_primary(
        &self,
        uid: UserId,
        request: &RegistrationRequest,
    ) -> Result<Outcome, RegistrationError> {
        tracing::debug!(stage = %Stage::CreatingPrimaryRecord, "Creating primary record");

        let schedule = ScheduleId::new();

        for attempt in 1..=self.invite_code_attempts {
            let link_code = self.codes.generate();
            let existing = self
                .store
                .query_by_link_code(&link_code)
                .await
                .map_err(|e| write_failure(UserType::Primary, e))?;

            if !existing.is_empty() {
                tracing::warn!(attempt, code = %link_code, "Invite code already in use, drawing another");
                continue;
            }

            let record = UserRecord::primary(
                uid.clone(),
                &request.name,
                &request.email,
                link_code.clone(),
                schedule.clone(),
            );

            match self.store.set_document(&record).await {
                Ok(()) => return Ok(Outcome::Created { uid, link_code }),
                Err(StoreError::CodeTaken(code)) => {
                    tracing::warn!(attempt, %code, "Invite code taken while writing, drawing another");
                }
                Err(e) => return Err(write_failure(UserType::Primary, e)),
            }
        }

        Err(RegistrationError::StoreWriteFailure {
            user_type: UserType::Primary,
            message: format!(
                "could not allocate a unique invite code after {} attempts",
                self.invite_code_attempts
            ),
        })
    }

    async fn link_secondary(
        &self,
        uid: UserId,
        request: &RegistrationRequest,
        role: MemberRole,
        code: &InviteCode,
    ) -> Result<Outcome, RegistrationError> {
        let primary = self.resolve_primary(code).await?;

        tracing::debug!(
            stage = %Stage::CreatingSecondaryRecord,
            primary = %primary.id,
            "Creating {} record",
            request.user_type
        );

        let record = UserRecord::secondary(
            uid.clone(),
            &request.name,
            &request.email,
            request.user_type,
            &primary,
        );
        let batch = WriteBatch::new()
            .set(record)
            .add_member(primary.id.clone(), role, uid.clone());

        self.store.commit(batch).await.map_err(|e| match e.index {
            0 => write_failure(request.user_type, e.source),
            _ => RegistrationError::StoreUpdateFailure {
                role,
                message: e.source.to_string(),
            },
        })?;

        tracing::debug!(
            stage = %Stage::UpdatingPrimaryMembers,
            primary = %primary.id,
            "Added {} to primary's {}",
            uid,
            role
        );

        Ok(Outcome::Linked {
            uid,
            primary: primary.id,
            user_type: request.user_type,
        })
    }

    /// Find the primary record owning `code`.
    ///
    /// Secondary records share their primary's code and are skipped. If
    /// several primaries carry the code, the earliest created wins.
    async fn resolve_primary(&self, code: &InviteCode) -> Result<UserRecord, RegistrationError> {
        tracing::debug!(stage = %Stage::ResolvingLinkCode, %code, "Resolving invite code");

        let mut primaries: Vec<UserRecord> = self
            .store
            .query_by_link_code(code)
            .await
            .map_err(|e| RegistrationError::StoreReadFailure(e.to_string()))?
            .into_iter()
            .filter(UserRecord::is_primary)
            .collect();

        if primaries.len() > 1 {
            tracing::warn!(
                %code,
                count = primaries.len(),
                "Several primary users share an invite code, using the earliest"
            );
        }

        if primaries.is_empty() {
            tracing::warn!(%code, "Invalid code: no primary user found");
            return Err(RegistrationError::InvalidCode);
        }

        Ok(primaries.swap_remove(0))
    }
}

fn write_failure(user_type: UserType, e: StoreError) -> RegistrationError {
    RegistrationError::StoreWriteFailure {
        user_type,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{MemoryCredentials, SqliteCredentials};
    use crate::db::init_db;
    use crate::notify::{NoticeKind, RecordingSink};
    use crate::store::{BatchError, MemoryStore, SqliteStore, StoreFault};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Harness {
        credentials: Arc<MemoryCredentials>,
        store: Arc<MemoryStore>,
        registrar: Registrar,
    }

    fn harness_with(store: MemoryStore) -> Harness {
        let credentials = Arc::new(MemoryCredentials::new());
        let store = Arc::new(store);
        let registrar = Registrar::new(credentials.clone(), store.clone());
        Harness {
            credentials,
            store,
            registrar,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryStore::new())
    }

    /// Hands out a fixed sequence of codes, repeating the last one.
    struct ScriptedCodes(Mutex<Vec<&'static str>>);

    impl ScriptedCodes {
        fn new(codes: &[&'static str]) -> Arc<Self> {
            let mut codes = codes.to_vec();
            codes.reverse();
            Arc::new(Self(Mutex::new(codes)))
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn generate(&self) -> InviteCode {
            let mut codes = self.0.lock().unwrap();
            let code = if codes.len() > 1 {
                codes.pop().unwrap()
            } else {
                codes[0]
            };
            InviteCode::new(code)
        }
    }

    fn request(name: &str, email: &str, user_type: UserType, code: Option<&str>) -> RegistrationRequest {
        RegistrationRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            user_type,
            link_code: code.map(InviteCode::new),
        }
    }

    async fn register_primary(h: &Harness) -> (UserId, InviteCode) {
        match h
            .registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap()
        {
            Outcome::Created { uid, link_code } => (uid, link_code),
            other => panic!("expected Created, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_primary_registration_creates_record() {
        let h = harness();

        let (uid, code) = register_primary(&h).await;

        assert!(code.is_well_formed());
        let record = h.store.get_document(&uid).await.unwrap().unwrap();
        assert_eq!(record.user_type, UserType::Primary);
        assert_eq!(record.link_code, code);
        assert_eq!(record.name, "A");
        assert_eq!(record.email, "a@x.com");
        assert!(!record.medicine_schedule_id.as_str().is_empty());
        assert!(record.members.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_primaries_get_fresh_schedules() {
        let h = harness();
        let (a, _) = register_primary(&h).await;
        let b = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Primary, None))
            .await
            .unwrap();

        let a = h.store.get_document(&a).await.unwrap().unwrap();
        let b = h.store.get_document(b.uid()).await.unwrap().unwrap();
        assert_ne!(a.medicine_schedule_id, b.medicine_schedule_id);
    }

    #[tokio::test]
    async fn test_caregiver_links_to_primary() {
        let h = harness();
        let (primary_id, code) = register_primary(&h).await;

        let outcome = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some(code.as_str())))
            .await
            .unwrap();

        let uid = match &outcome {
            Outcome::Linked {
                uid,
                primary,
                user_type,
            } => {
                assert_eq!(primary, &primary_id);
                assert_eq!(*user_type, UserType::Caregiver);
                uid.clone()
            }
            other => panic!("expected Linked, got {:?}", other),
        };

        let primary = h.store.get_document(&primary_id).await.unwrap().unwrap();
        let secondary = h.store.get_document(&uid).await.unwrap().unwrap();

        assert_eq!(secondary.link_code, code);
        assert_eq!(
            secondary.medicine_schedule_id,
            primary.medicine_schedule_id
        );
        assert!(secondary.members.is_none());

        let members = primary.members.unwrap();
        assert!(members.caregivers.contains(&uid));
        assert!(members.elders.is_empty());
    }

    #[tokio::test]
    async fn test_elder_lands_in_elders_list() {
        let h = harness();
        let (primary_id, code) = register_primary(&h).await;

        let outcome = h
            .registrar
            .submit(&request("E", "e@x.com", UserType::Elder, Some(code.as_str())))
            .await
            .unwrap();

        let members = h
            .store
            .get_document(&primary_id)
            .await
            .unwrap()
            .unwrap()
            .members
            .unwrap();
        assert!(members.elders.contains(outcome.uid()));
        assert!(members.caregivers.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_code_is_rejected_without_writes() {
        let h = harness();
        register_primary(&h).await;

        let err = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some("ZZZZZZ")))
            .await
            .unwrap_err();

        assert_eq!(err, RegistrationError::InvalidCode);
        assert_eq!(err.stage(), Stage::ResolvingLinkCode);
        assert_eq!(h.store.len().await, 1);
        // The credential itself is not rolled back
        assert_eq!(h.credentials.len().await, 2);
    }

    #[tokio::test]
    async fn test_code_shared_only_by_secondary_is_not_a_primary() {
        let h = harness();
        let (primary_id, code) = register_primary(&h).await;
        let caregiver = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some(code.as_str())))
            .await
            .unwrap();

        // Resolution must land on the primary even though two records match
        let elder = h
            .registrar
            .submit(&request("E", "e@x.com", UserType::Elder, Some(code.as_str())))
            .await
            .unwrap();
        match elder {
            Outcome::Linked { primary, .. } => assert_eq!(primary, primary_id),
            other => panic!("expected Linked, got {:?}", other),
        }

        let caregiver_record = h
            .store
            .get_document(caregiver.uid())
            .await
            .unwrap()
            .unwrap();
        assert!(caregiver_record.members.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_account_blocks_second_record() {
        let h = harness();
        register_primary(&h).await;

        let err = h
            .registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap_err();

        assert_eq!(err, RegistrationError::DuplicateAccount);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_auth_failure_message_is_passed_through() {
        let h = harness();
        h.credentials
            .fail_with(AuthError::Rejected("The email address is badly formatted.".into()))
            .await;

        let err = h
            .registrar
            .submit(&request("A", "bad", UserType::Primary, None))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::AuthFailure("The email address is badly formatted.".into())
        );
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_primary_store_failure_leaves_credential() {
        let h = harness();
        h.store.inject(StoreFault::Set).await;

        let err = h
            .registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StoreWriteFailure {
                user_type: UserType::Primary,
                ..
            }
        ));
        assert_eq!(err.stage(), Stage::CreatingPrimaryRecord);
        assert_eq!(h.credentials.len().await, 1);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_a_read_failure() {
        let h = harness();
        let (_, code) = register_primary(&h).await;
        h.store.inject(StoreFault::Query).await;

        let err = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some(code.as_str())))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::StoreReadFailure(_)));
    }

    #[tokio::test]
    async fn test_secondary_write_failure() {
        let h = harness();
        let (_, code) = register_primary(&h).await;
        h.store.inject(StoreFault::Set).await;

        let err = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Elder, Some(code.as_str())))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StoreWriteFailure {
                user_type: UserType::Elder,
                ..
            }
        ));
        assert_eq!(err.stage(), Stage::CreatingSecondaryRecord);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_member_update_failure_rolls_back_on_atomic_store() {
        let h = harness();
        let (primary_id, code) = register_primary(&h).await;
        h.store.inject(StoreFault::AddMember).await;

        let err = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some(code.as_str())))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StoreUpdateFailure {
                role: MemberRole::Caregivers,
                ..
            }
        ));
        assert_eq!(err.stage(), Stage::UpdatingPrimaryMembers);
        assert_eq!(h.store.len().await, 1);
        let primary = h.store.get_document(&primary_id).await.unwrap().unwrap();
        assert!(primary.members.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_member_update_failure_on_non_transactional_store_keeps_record() {
        let h = harness_with(MemoryStore::non_transactional());
        let (_, code) = register_primary(&h).await;
        h.store.inject(StoreFault::AddMember).await;

        let err = h
            .registrar
            .submit(&request("B", "b@x.com", UserType::Caregiver, Some(code.as_str())))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::StoreUpdateFailure { .. }));
        // The secondary record exists but is not listed under its primary
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_colliding_code_is_redrawn() {
        let h = harness();
        let registrar = h
            .registrar
            .clone()
            .with_code_generator(ScriptedCodes::new(&["AAAAAA", "AAAAAA", "BBBBBB"]));

        let first = registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap();
        let second = registrar
            .submit(&request("B", "b@x.com", UserType::Primary, None))
            .await
            .unwrap();

        assert!(matches!(first, Outcome::Created { link_code, .. } if link_code.as_str() == "AAAAAA"));
        assert!(matches!(second, Outcome::Created { link_code, .. } if link_code.as_str() == "BBBBBB"));
    }

    /// Lets a rival primary claim the drawn code between lookup and write.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn set_document(&self, record: &UserRecord) -> Result<(), StoreError> {
            if record.is_primary() && !self.raced.swap(true, Ordering::SeqCst) {
                let rival = UserRecord::primary(
                    UserId::new(),
                    "Rival",
                    "rival@x.com",
                    record.link_code.clone(),
                    ScheduleId::new(),
                );
                self.inner.set_document(&rival).await?;
            }
            self.inner.set_document(record).await
        }

        async fn get_document(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
            self.inner.get_document(id).await
        }

        async fn query_by_link_code(
            &self,
            code: &InviteCode,
        ) -> Result<Vec<UserRecord>, StoreError> {
            self.inner.query_by_link_code(code).await
        }

        async fn array_union_member(
            &self,
            primary: &UserId,
            role: MemberRole,
            member: &UserId,
        ) -> Result<(), StoreError> {
            self.inner.array_union_member(primary, role, member).await
        }

        async fn list_documents(&self) -> Result<Vec<UserRecord>, StoreError> {
            self.inner.list_documents().await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), BatchError> {
            self.inner.commit(batch).await
        }
    }

    #[tokio::test]
    async fn test_code_taken_during_write_is_redrawn() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let registrar = Registrar::new(Arc::new(MemoryCredentials::new()), store.clone())
            .with_code_generator(ScriptedCodes::new(&["AAAAAA", "BBBBBB"]));

        let outcome = registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap();

        let uid = match outcome {
            Outcome::Created { uid, link_code } => {
                assert_eq!(link_code.as_str(), "BBBBBB");
                uid
            }
            other => panic!("expected Created, got {:?}", other),
        };
        assert_eq!(store.inner.len().await, 2);
        let record = store.get_document(&uid).await.unwrap().unwrap();
        assert_eq!(record.link_code.as_str(), "BBBBBB");
    }

    #[tokio::test]
    async fn test_code_taken_on_every_write_gives_up() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let registrar = Registrar::new(Arc::new(MemoryCredentials::new()), store.clone())
            .with_code_generator(ScriptedCodes::new(&["AAAAAA"]))
            .with_invite_code_attempts(1);

        let err = registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::StoreWriteFailure {
                user_type: UserType::Primary,
                ..
            }
        ));
        // Only the rival's record is stored
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_code_allocation_gives_up() {
        let h = harness();
        let registrar = h
            .registrar
            .clone()
            .with_code_generator(ScriptedCodes::new(&["AAAAAA"]))
            .with_invite_code_attempts(3);

        registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap();
        let err = registrar
            .submit(&request("B", "b@x.com", UserType::Primary, None))
            .await
            .unwrap_err();

        match err {
            RegistrationError::StoreWriteFailure { message, .. } => {
                assert!(message.contains("after 3 attempts"))
            }
            other => panic!("expected StoreWriteFailure, got {:?}", other),
        }
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_handle_validation_makes_no_remote_calls() {
        let h = harness();
        let sink = RecordingSink::new();
        let form = RegistrationForm {
            name: Some("A".into()),
            password: Some("secret1".into()),
            ..RegistrationForm::default()
        };

        let err = h.registrar.handle(&form, &sink).await.unwrap_err();

        assert_eq!(
            err,
            RegistrationError::Invalid(ValidationError::MissingField(Field::Email))
        );
        assert_eq!(h.credentials.calls(), 0);
        assert!(h.store.is_empty().await);

        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Email is required");
        assert_eq!(notices[0].field, Some(Field::Email));
    }

    #[tokio::test]
    async fn test_handle_end_to_end_example() {
        let h = harness();
        let sink = RecordingSink::new();

        let created = h
            .registrar
            .handle(
                &RegistrationForm::new("A", "a@x.com", "p1").with_user_type(UserType::Primary),
                &sink,
            )
            .await
            .unwrap();
        let code = match &created {
            Outcome::Created { link_code, .. } => link_code.clone(),
            other => panic!("expected Created, got {:?}", other),
        };
        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let linked = h
            .registrar
            .handle(
                &RegistrationForm::new("B", "b@x.com", "p2")
                    .with_user_type(UserType::Caregiver)
                    .with_link_code(code.as_str()),
                &sink,
            )
            .await
            .unwrap();

        let primary = h
            .store
            .get_document(created.uid())
            .await
            .unwrap()
            .unwrap();
        assert!(primary.members.unwrap().caregivers.contains(linked.uid()));

        let notices = sink.notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.kind == NoticeKind::Success));
        assert_eq!(notices[1].message, "Caregiver linked to primary successfully.");
    }

    #[tokio::test]
    async fn test_handle_reports_remote_failure_once() {
        let h = harness();
        let sink = RecordingSink::new();
        let form = RegistrationForm::new("B", "b@x.com", "p2")
            .with_user_type(UserType::Elder)
            .with_link_code("NOPE00");

        let err = h.registrar.handle(&form, &sink).await.unwrap_err();

        assert_eq!(err, RegistrationError::InvalidCode);
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Failure);
        assert_eq!(notices[0].message, "Invalid code.");
    }

    #[tokio::test]
    async fn test_registration_over_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("carelink.db")).await.unwrap();
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let registrar = Registrar::new(Arc::new(SqliteCredentials::new(pool)), store.clone());

        let (primary_id, code) = match registrar
            .submit(&request("A", "a@x.com", UserType::Primary, None))
            .await
            .unwrap()
        {
            Outcome::Created { uid, link_code } => (uid, link_code),
            other => panic!("expected Created, got {:?}", other),
        };
        assert!(code.is_well_formed());

        let linked = registrar
            .submit(&request(
                "B",
                "b@x.com",
                UserType::Caregiver,
                Some(code.as_str()),
            ))
            .await
            .unwrap();
        assert!(matches!(&linked, Outcome::Linked { primary, .. } if *primary == primary_id));

        let primary = store.get_document(&primary_id).await.unwrap().unwrap();
        let caregiver = store.get_document(linked.uid()).await.unwrap().unwrap();
        let members = primary.members.unwrap();
        assert!(members.caregivers.contains(linked.uid()));
        assert!(members.elders.is_empty());
        assert_eq!(caregiver.medicine_schedule_id, primary.medicine_schedule_id);
        assert_eq!(caregiver.link_code, code);
        assert!(caregiver.members.is_none());

        // A code nobody holds writes nothing
        let err = registrar
            .submit(&request("C", "c@x.com", UserType::Elder, Some("nope00")))
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::InvalidCode);
        assert_eq!(store.list_documents().await.unwrap().len(), 2);

        // Re-registering an email stops at the credential step
        let err = registrar
            .submit(&request("A", "A@x.com", UserType::Primary, None))
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateAccount);
        assert_eq!(store.list_documents().await.unwrap().len(), 2);
    }

    #[test]
    fn test_outcome_json() {
        let outcome = Outcome::Created {
            uid: UserId::from("u1"),
            link_code: InviteCode::new("AB12CD"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "created");
        assert_eq!(json["uid"], "u1");
        assert_eq!(json["link_code"], "AB12CD");
    }
}
