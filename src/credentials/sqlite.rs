use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;

use super::{
    check_email_format, check_password_strength, normalize_email, AuthError, CredentialProvider,
};
use crate::models::UserId;

/// Credential provider backed by the `accounts` table.
///
/// Passwords are stored as argon2id PHC strings. Hashing runs on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteCredentials {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    uid: String,
    password_hash: String,
}

impl SqliteCredentials {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check a password against the stored hash.
    ///
    /// Returns the account's uid when the email exists and the password
    /// matches.
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserId>, AuthError> {
        let row: Option<AccountRow> =
            sqlx::query_as("SELECT uid, password_hash FROM accounts WHERE email = ?")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || check_password(&row.password_hash, &password))
                .await
                .map_err(|e| AuthError::Unavailable(e.to_string()))??;

        Ok(matches.then(|| UserId::from(row.uid)))
    }
}

#[async_trait]
impl CredentialProvider for SqliteCredentials {
    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = normalize_email(email);
        check_email_format(&email)?;
        check_password_strength(password)?;

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))??;

        let uid = UserId::new();
        let result = sqlx::query(
            "INSERT INTO accounts (uid, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uid.as_str())
        .bind(&email)
        .bind(&hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(%uid, "Created account for {}", email);
                Ok(uid)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::DuplicateAccount)
            }
            Err(e) => Err(unavailable(e)),
        }
    }
}

fn unavailable(e: sqlx::Error) -> AuthError {
    AuthError::Unavailable(e.to_string())
}

/// Hash a password with argon2id and a fresh 16-byte salt.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    let salt = SaltString::encode_b64(&bytes).map_err(hash_error)?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(hash_error)
}

/// Verify a password against a PHC string.
fn check_password(stored: &str, password: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(hash_error)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_error(e: argon2::password_hash::Error) -> AuthError {
    AuthError::Unavailable(format!("password hashing failed: {}", e))
}
