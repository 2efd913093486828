//! Challenge persistence with compare-and-set writes.
//!
//! Every write names the version it read. Writers that lost a race get
//! `StoreError::Conflict` and re-run their read-modify-write; the service
//! never holds a lock across a network call.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::{
    challenge::{ChallengeKey, OtpChallenge},
    error::StoreError,
    purpose::Purpose,
};

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn load(&self, key: &ChallengeKey) -> Result<Option<OtpChallenge>, StoreError>;

    /// Insert when `expected_version` is `None`, otherwise replace the stored
    /// record only if its version still equals `expected_version`.
    async fn save(
        &self,
        challenge: &OtpChallenge,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Delete records whose expiry and resend window both ended before `now`.
    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryChallengeStore {
    records: Mutex<HashMap<ChallengeKey, OtpChallenge>>,
}

impl MemoryChallengeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn load(&self, key: &ChallengeKey) -> Result<Option<OtpChallenge>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn save(
        &self,
        challenge: &OtpChallenge,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let key = challenge.key();
        let current = records.get(&key).map(|stored| stored.version);
        if current != expected_version {
            return Err(StoreError::Conflict);
        }
        records.insert(key, challenge.clone());
        Ok(())
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, challenge| challenge.purgeable_after() >= now);
        Ok(u64::try_from(before - records.len()).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgChallengeStore {
    pool: PgPool,
}

impl PgChallengeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_span(operation: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation
    )
}

fn challenge_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<OtpChallenge> {
    let purpose: String = row.try_get("purpose")?;
    let attempt_count: i32 = row.try_get("attempt_count")?;
    let resend_count: i32 = row.try_get("resend_count")?;
    Ok(OtpChallenge {
        identifier: row.try_get("identifier")?,
        purpose: purpose
            .parse::<Purpose>()
            .map_err(|err| anyhow!("stored challenge has {err}"))?,
        challenge_id: row.try_get("challenge_id")?,
        code_hash: row.try_get("code_hash")?,
        salt: row.try_get("salt")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        attempt_count: u32::try_from(attempt_count).context("negative attempt_count")?,
        resend_count: u32::try_from(resend_count).context("negative resend_count")?,
        last_issued_at: row.try_get("last_issued_at")?,
        window_ends_at: row.try_get("window_ends_at")?,
        consumed: row.try_get("consumed")?,
        version: row.try_get("version")?,
    })
}

fn to_i32(value: u32, field: &str) -> anyhow::Result<i32> {
    i32::try_from(value).with_context(|| format!("{field} out of range"))
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    async fn load(&self, key: &ChallengeKey) -> Result<Option<OtpChallenge>, StoreError> {
        let query = r"
            SELECT identifier, purpose, challenge_id, code_hash, salt, issued_at, expires_at,
                   attempt_count, resend_count, last_issued_at, window_ends_at, consumed,
                   version
            FROM otp_challenges
            WHERE identifier = $1 AND purpose = $2
        ";
        let row = sqlx::query(query)
            .bind(key.identifier())
            .bind(key.purpose().as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT"))
            .await
            .context("failed to load challenge")?;

        row.as_ref()
            .map(challenge_from_row)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save(
        &self,
        challenge: &OtpChallenge,
        expected_version: Option<i64>,
    ) -> Result<(), StoreError> {
        let attempt_count = to_i32(challenge.attempt_count, "attempt_count")?;
        let resend_count = to_i32(challenge.resend_count, "resend_count")?;

        let result = match expected_version {
            None => {
                let query = r"
                    INSERT INTO otp_challenges (
                        identifier, purpose, challenge_id, code_hash, salt, issued_at, expires_at,
                        attempt_count, resend_count, last_issued_at, window_ends_at, consumed,
                        version
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    ON CONFLICT (identifier, purpose) DO NOTHING
                ";
                sqlx::query(query)
                    .bind(&challenge.identifier)
                    .bind(challenge.purpose.as_str())
                    .bind(challenge.challenge_id)
                    .bind(&challenge.code_hash)
                    .bind(&challenge.salt)
                    .bind(challenge.issued_at)
                    .bind(challenge.expires_at)
                    .bind(attempt_count)
                    .bind(resend_count)
                    .bind(challenge.last_issued_at)
                    .bind(challenge.window_ends_at)
                    .bind(challenge.consumed)
                    .bind(challenge.version)
                    .execute(&self.pool)
                    .instrument(db_span("INSERT"))
                    .await
            }
            Some(expected) => {
                let query = r"
                    UPDATE otp_challenges
                    SET challenge_id = $3,
                        code_hash = $4,
                        salt = $5,
                        issued_at = $6,
                        expires_at = $7,
                        attempt_count = $8,
                        resend_count = $9,
                        last_issued_at = $10,
                        window_ends_at = $11,
                        consumed = $12,
                        version = $13
                    WHERE identifier = $1 AND purpose = $2 AND version = $14
                ";
                sqlx::query(query)
                    .bind(&challenge.identifier)
                    .bind(challenge.purpose.as_str())
                    .bind(challenge.challenge_id)
                    .bind(&challenge.code_hash)
                    .bind(&challenge.salt)
                    .bind(challenge.issued_at)
                    .bind(challenge.expires_at)
                    .bind(attempt_count)
                    .bind(resend_count)
                    .bind(challenge.last_issued_at)
                    .bind(challenge.window_ends_at)
                    .bind(challenge.consumed)
                    .bind(challenge.version)
                    .bind(expected)
                    .execute(&self.pool)
                    .instrument(db_span("UPDATE"))
                    .await
            }
        }
        .context("failed to save challenge")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM otp_challenges WHERE GREATEST(expires_at, window_ends_at) < $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE"))
            .await
            .context("failed to purge challenges")?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(db_span("SELECT"))
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
