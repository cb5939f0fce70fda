//! SQLite storage for one-time passcode records.
//!
//! Keyed upserts, point lookups, attempt counting, delete-by-key, and a
//! passive expiry sweep over the `(email, purpose)` primary key. The upsert
//! is the store's atomicity boundary: concurrent issues for the same key
//! race at the database level and last write wins.

use std::path::Path;

use sqlx::{Pool, Sqlite};
use tracing::info;

use mgms_core::db::{DatabaseError, open_pool, open_pool_in_memory};

use crate::purpose::OtpPurpose;

/// A stored one-time passcode.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub email: String,
    pub purpose: String,
    pub code: String,
    pub attempts: i64,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct OtpDatabase {
    pool: Pool<Sqlite>,
}

impl OtpDatabase {
    /// Open or create the OTP database at the given path.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let pool = open_pool(path).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("OTP database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Insert a code for `(email, purpose)`, replacing any existing record.
    ///
    /// A reissue overwrites the stored code, resets `attempts` to 0, and
    /// extends the expiry, invalidating any outstanding code for the key.
    pub async fn upsert_code(
        &self,
        email: &str,
        purpose: OtpPurpose,
        code: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO otp_codes (email, purpose, code, attempts, expires_at, created_at) \
             VALUES (?, ?, ?, 0, ?, ?) \
             ON CONFLICT(email, purpose) DO UPDATE SET \
             code = excluded.code, attempts = 0, \
             expires_at = excluded.expires_at, created_at = excluded.created_at",
        )
        .bind(email)
        .bind(purpose.as_str())
        .bind(code)
        .bind(expires_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Point lookup by key; `None` when no record exists.
    pub async fn get_code(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, OtpRecord>(
            "SELECT * FROM otp_codes WHERE email = ? AND purpose = ?",
        )
        .bind(email)
        .bind(purpose.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(record)
    }

    /// Record one more failed verification attempt against the key.
    pub async fn increment_attempts(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE otp_codes SET attempts = attempts + 1 WHERE email = ? AND purpose = ?",
        )
        .bind(email)
        .bind(purpose.as_str())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Delete the record for the key.
    ///
    /// Returns `true` if a row was deleted, `false` if the key was absent.
    pub async fn delete_code(
        &self,
        email: &str,
        purpose: OtpPurpose,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE email = ? AND purpose = ?")
            .bind(email)
            .bind(purpose.as_str())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Passive expiry sweep: drop every record that is already dead.
    ///
    /// Uses the same `now > expires_at` reading of the expiry field as the
    /// manager's explicit check.
    pub async fn purge_expired(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at < ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
