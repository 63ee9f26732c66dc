use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

use super::{BatchError, DocumentStore, StoreError, Write, WriteBatch};
use crate::invite::InviteCode;
use crate::models::{MemberRole, Members, ScheduleId, UserId, UserRecord, UserType};

/// Document store backed by the `users` and `members` tables.
///
/// Batches run in a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    user_type: String,
    link_code: String,
    medicine_schedule_id: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    role: String,
    member_id: String,
}

const SELECT_USERS: &str = "SELECT id, name, email, user_type, link_code, medicine_schedule_id, created_at FROM users";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: UserRow) -> Result<UserRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let user_type = UserType::from_str(&row.user_type).map_err(corrupt)?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| corrupt(format!("bad created_at: {}", e)))?
            .with_timezone(&Utc);

        let members = if user_type == UserType::Primary {
            let rows: Vec<MemberRow> = sqlx::query_as(
                "SELECT role, member_id FROM members WHERE primary_id = ? ORDER BY added_at, member_id",
            )
            .bind(&row.id)
            .fetch_all(&self.pool)
            .await?;

            let mut members = Members::default();
            for member in rows {
                let role = MemberRole::from_str(&member.role).map_err(corrupt)?;
                members.add(role, UserId::from(member.member_id));
            }
            Some(members)
        } else {
            None
        };

        Ok(UserRecord {
            id: UserId::from(row.id),
            name: row.name,
            email: row.email,
            user_type,
            link_code: InviteCode::new(row.link_code),
            medicine_schedule_id: ScheduleId::from(row.medicine_schedule_id),
            members,
            created_at,
        })
    }

    async fn hydrate_all(&self, rows: Vec<UserRow>) -> Result<Vec<UserRecord>, StoreError> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.hydrate(row).await?);
        }
        Ok(records)
    }
}

/// Upsert a record and replace its member rows.
async fn write_record(conn: &mut SqliteConnection, record: &UserRecord) -> Result<(), StoreError> {
    let id = record.id.as_str();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, name, email, user_type, link_code, medicine_schedule_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            user_type = excluded.user_type,
            link_code = excluded.link_code,
            medicine_schedule_id = excluded.medicine_schedule_id,
            created_at = excluded.created_at
        "#,
    )
    .bind(id)
    .bind(&record.name)
    .bind(&record.email)
    .bind(record.user_type.to_string())
    .bind(record.link_code.as_str())
    .bind(record.medicine_schedule_id.as_str())
    .bind(record.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(StoreError::CodeTaken(record.link_code.clone()));
        }
        Err(e) => return Err(e.into()),
    }

    // Overwriting a document replaces its member lists
    sqlx::query("DELETE FROM members WHERE primary_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if let Some(members) = &record.members {
        let added_at = record.created_at.to_rfc3339();
        for role in [MemberRole::Caregivers, MemberRole::Elders] {
            for member in members.list(role) {
                sqlx::query(
                    "INSERT INTO members (primary_id, role, member_id, added_at) VALUES (?, ?, ?, ?)",
                )
                .bind(id)
                .bind(role.field())
                .bind(member.as_str())
                .bind(&added_at)
                .execute(&mut *conn)
                .await?;
            }
        }
    }

    Ok(())
}

async fn add_member(
    conn: &mut SqliteConnection,
    primary: &UserId,
    role: MemberRole,
    member: &UserId,
) -> Result<(), StoreError> {
    let user_type: Option<(String,)> = sqlx::query_as("SELECT user_type FROM users WHERE id = ?")
        .bind(primary.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match user_type {
        None => return Err(StoreError::NotFound(primary.clone())),
        Some((t,)) if t != UserType::Primary.to_string() => {
            return Err(StoreError::NotPrimary(primary.clone()));
        }
        Some(_) => {}
    }

    sqlx::query(
        "INSERT OR IGNORE INTO members (primary_id, role, member_id, added_at) VALUES (?, ?, ?, ?)",
    )
    .bind(primary.as_str())
    .bind(role.field())
    .bind(member.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn set_document(&self, record: &UserRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        write_record(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_document(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_USERS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn query_by_link_code(&self, code: &InviteCode) -> Result<Vec<UserRecord>, StoreError> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("{} WHERE link_code = ? ORDER BY seq", SELECT_USERS))
                .bind(code.as_str())
                .fetch_all(&self.pool)
                .await?;

        self.hydrate_all(rows).await
    }

    async fn array_union_member(
        &self,
        primary: &UserId,
        role: MemberRole,
        member: &UserId,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        add_member(&mut conn, primary, role, member).await
    }

    async fn list_documents(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{} ORDER BY seq", SELECT_USERS))
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_all(rows).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), BatchError> {
        let last = batch.len().saturating_sub(1);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BatchError {
                index: 0,
                source: e.into(),
            })?;

        for (index, write) in batch.into_iter().enumerate() {
            let result = match &write {
                Write::Set(record) => write_record(&mut tx, record).await,
                Write::AddMember {
                    primary,
                    role,
                    member,
                } => add_member(&mut tx, primary, *role, member).await,
            };
            // Dropping `tx` on error rolls the transaction back
            result.map_err(|source| BatchError { index, source })?;
        }

        tx.commit().await.map_err(|e| BatchError {
            index: last,
            source: e.into(),
        })
    }
}
