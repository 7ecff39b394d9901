//! Draft and resume-token persistence.
//!
//! The document store is an external collaborator, so the flow talks to it
//! through the `ResumeStore` trait. `PgResumeStore` is the deployment backend;
//! `MemoryResumeStore` serves tests and single-process runs. Both enforce the
//! single-consumption invariant on resume tokens: Postgres with a guarded
//! `UPDATE ... RETURNING`, the in-memory store by serializing through a mutex.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::utils::hash_token;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftStatus {
    Draft,
    Finalized,
}

impl DraftStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
        }
    }

    fn parse(value: &str) -> Self {
        if value == "finalized" {
            Self::Finalized
        } else {
            Self::Draft
        }
    }
}

#[derive(Clone, Debug)]
pub struct DraftRecord {
    pub token: String,
    pub data_key: Option<String>,
    pub step: i32,
    pub status: DraftStatus,
    pub email: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Result of attempting to consume a resume token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Token was valid and is now marked used.
    Consumed { draft_token: String, email: String },
    AlreadyUsed,
    Expired,
    NotFound,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn find_draft(&self, token: &str) -> Result<Option<DraftRecord>>;

    /// Create or update a draft's payload pointer and wizard step.
    async fn upsert_draft(&self, token: &str, data_key: &str, step: i32) -> Result<()>;

    /// Record the applicant's email and refresh the activity timestamp.
    async fn set_draft_email(&self, token: &str, email: &str) -> Result<()>;

    async fn insert_resume_token(
        &self,
        resume_token: &str,
        draft_token: &str,
        email: &str,
        ttl_seconds: i64,
    ) -> Result<()>;

    /// Atomically mark a resume token used and return the draft it unlocks.
    /// Concurrent calls for the same token observe exactly one `Consumed`.
    async fn consume_resume_token(&self, resume_token: &str) -> Result<ConsumeOutcome>;

    /// Remove expired resume tokens and idle drafts. Returns rows removed.
    async fn purge_expired(&self, draft_ttl_days: i64) -> Result<u64>;
}

struct MemoryResumeToken {
    draft_token: String,
    email: String,
    used: bool,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryInner {
    drafts: HashMap<String, DraftRecord>,
    tokens: HashMap<Vec<u8>, MemoryResumeToken>,
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryResumeStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryResumeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn find_draft(&self, token: &str) -> Result<Option<DraftRecord>> {
        Ok(self.inner.lock().await.drafts.get(token).cloned())
    }

    async fn upsert_draft(&self, token: &str, data_key: &str, step: i32) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        match inner.drafts.get_mut(token) {
            Some(record) => {
                record.data_key = Some(data_key.to_string());
                record.step = step;
                record.updated_at = now;
            }
            None => {
                inner.drafts.insert(
                    token.to_string(),
                    DraftRecord {
                        token: token.to_string(),
                        data_key: Some(data_key.to_string()),
                        step,
                        status: DraftStatus::Draft,
                        email: None,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn set_draft_email(&self, token: &str, email: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.drafts.get_mut(token) {
            record.email = Some(email.to_string());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_resume_token(
        &self,
        resume_token: &str,
        draft_token: &str,
        email: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(
            hash_token(resume_token),
            MemoryResumeToken {
                draft_token: draft_token.to_string(),
                email: email.to_string(),
                used: false,
                expires_at: Utc::now() + Duration::seconds(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn consume_resume_token(&self, resume_token: &str) -> Result<ConsumeOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.tokens.get_mut(&hash_token(resume_token)) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if record.used {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        if record.expires_at <= Utc::now() {
            return Ok(ConsumeOutcome::Expired);
        }
        record.used = true;
        Ok(ConsumeOutcome::Consumed {
            draft_token: record.draft_token.clone(),
            email: record.email.clone(),
        })
    }

    async fn purge_expired(&self, draft_ttl_days: i64) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let tokens_before = inner.tokens.len();
        inner.tokens.retain(|_, token| token.expires_at > now);
        let drafts_before = inner.drafts.len();
        let cutoff = now - Duration::days(draft_ttl_days);
        inner.drafts.retain(|_, draft| {
            draft.status == DraftStatus::Finalized || draft.updated_at > cutoff
        });
        let removed =
            (tokens_before - inner.tokens.len()) + (drafts_before - inner.drafts.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

/// Postgres-backed store used in deployments.
#[derive(Debug, Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn find_draft(&self, token: &str) -> Result<Option<DraftRecord>> {
        let query = r"
            SELECT token, data_key, step, status, email, updated_at
            FROM drafts
            WHERE token = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup draft")?;

        Ok(row.map(|row| DraftRecord {
            token: row.get("token"),
            data_key: row.get("data_key"),
            step: row.get("step"),
            status: DraftStatus::parse(row.get::<String, _>("status").as_str()),
            email: row.get("email"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn upsert_draft(&self, token: &str, data_key: &str, step: i32) -> Result<()> {
        let query = r"
            INSERT INTO drafts (token, data_key, step)
            VALUES ($1, $2, $3)
            ON CONFLICT (token) DO UPDATE
            SET data_key = EXCLUDED.data_key,
                step = EXCLUDED.step,
                updated_at = NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token)
            .bind(data_key)
            .bind(step)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert draft")?;
        Ok(())
    }

    async fn set_draft_email(&self, token: &str, email: &str) -> Result<()> {
        // No-op when the draft is missing; callers have already checked it.
        let query = r"
            UPDATE drafts
            SET email = $2, updated_at = NOW()
            WHERE token = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update draft email")?;
        Ok(())
    }

    async fn insert_resume_token(
        &self,
        resume_token: &str,
        draft_token: &str,
        email: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        let query = r"
            INSERT INTO resume_tokens (token_hash, draft_token, email, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_token(resume_token))
            .bind(draft_token)
            .bind(email)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert resume token")?;
        Ok(())
    }

    async fn consume_resume_token(&self, resume_token: &str) -> Result<ConsumeOutcome> {
        let token_hash = hash_token(resume_token);

        // The guarded UPDATE is the atomic consumption: of two concurrent
        // exchanges, only one matches `used_at IS NULL`.
        let query = r"
            UPDATE resume_tokens
            SET used_at = NOW()
            WHERE token_hash = $1
              AND used_at IS NULL
              AND expires_at > NOW()
            RETURNING draft_token, email
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume resume token")?;

        if let Some(row) = row {
            return Ok(ConsumeOutcome::Consumed {
                draft_token: row.get("draft_token"),
                email: row.get("email"),
            });
        }

        // Classify the rejection for the caller without changing any state.
        let query = r"
            SELECT used_at, expires_at
            FROM resume_tokens
            WHERE token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to classify resume token")?;

        let Some(row) = row else {
            return Ok(ConsumeOutcome::NotFound);
        };
        let used_at: Option<DateTime<Utc>> = row.get("used_at");
        if used_at.is_some() {
            Ok(ConsumeOutcome::AlreadyUsed)
        } else {
            Ok(ConsumeOutcome::Expired)
        }
    }

    async fn purge_expired(&self, draft_ttl_days: i64) -> Result<u64> {
        let query = "DELETE FROM resume_tokens WHERE expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let tokens = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge resume tokens")?
            .rows_affected();

        let query = r"
            DELETE FROM drafts
            WHERE status = 'draft'
              AND updated_at < NOW() - ($1 * INTERVAL '1 day')
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let drafts = sqlx::query(query)
            .bind(draft_ttl_days)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge idle drafts")?
            .rows_affected();

        Ok(tokens + drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsumeOutcome, DraftStatus, MemoryResumeStore, ResumeStore};
    use anyhow::Result;

    #[tokio::test]
    async fn upsert_and_find_draft_round_trip() -> Result<()> {
        let store = MemoryResumeStore::new();
        store.upsert_draft("abc123", "drafts/abc123.json", 2).await?;

        let record = store.find_draft("abc123").await?.expect("draft");
        assert_eq!(record.data_key.as_deref(), Some("drafts/abc123.json"));
        assert_eq!(record.step, 2);
        assert_eq!(record.status, DraftStatus::Draft);
        assert_eq!(record.email, None);

        store.upsert_draft("abc123", "drafts/abc123.json", 3).await?;
        let record = store.find_draft("abc123").await?.expect("draft");
        assert_eq!(record.step, 3);
        Ok(())
    }

    #[tokio::test]
    async fn set_draft_email_updates_existing_draft() -> Result<()> {
        let store = MemoryResumeStore::new();
        store.upsert_draft("abc123", "drafts/abc123.json", 0).await?;
        store.set_draft_email("abc123", "sam@example.com").await?;

        let record = store.find_draft("abc123").await?.expect("draft");
        assert_eq!(record.email.as_deref(), Some("sam@example.com"));

        // Unknown drafts are a no-op, matching the upsert contract.
        store.set_draft_email("missing", "sam@example.com").await?;
        Ok(())
    }

    #[tokio::test]
    async fn resume_token_consumed_exactly_once() -> Result<()> {
        let store = MemoryResumeStore::new();
        store.upsert_draft("abc123", "drafts/abc123.json", 1).await?;
        store
            .insert_resume_token("rt1", "abc123", "sam@example.com", 3600)
            .await?;

        let first = store.consume_resume_token("rt1").await?;
        assert_eq!(
            first,
            ConsumeOutcome::Consumed {
                draft_token: "abc123".to_string(),
                email: "sam@example.com".to_string(),
            }
        );

        let second = store.consume_resume_token("rt1").await?;
        assert_eq!(second, ConsumeOutcome::AlreadyUsed);
        Ok(())
    }

    #[tokio::test]
    async fn expired_resume_token_is_rejected_even_if_unused() -> Result<()> {
        let store = MemoryResumeStore::new();
        store
            .insert_resume_token("rt1", "abc123", "sam@example.com", -60)
            .await?;
        assert_eq!(
            store.consume_resume_token("rt1").await?,
            ConsumeOutcome::Expired
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_resume_token_is_not_found() -> Result<()> {
        let store = MemoryResumeStore::new();
        assert_eq!(
            store.consume_resume_token("missing").await?,
            ConsumeOutcome::NotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_consumption_grants_exactly_one() -> Result<()> {
        let store = std::sync::Arc::new(MemoryResumeStore::new());
        store
            .insert_resume_token("rt1", "abc123", "sam@example.com", 3600)
            .await?;

        let left = {
            let store = store.clone();
            tokio::spawn(async move { store.consume_resume_token("rt1").await })
        };
        let right = {
            let store = store.clone();
            tokio::spawn(async move { store.consume_resume_token("rt1").await })
        };

        let left = left.await??;
        let right = right.await??;

        let consumed = [&left, &right]
            .iter()
            .filter(|outcome| matches!(outcome, ConsumeOutcome::Consumed { .. }))
            .count();
        let replayed = [&left, &right]
            .iter()
            .filter(|outcome| matches!(outcome, ConsumeOutcome::AlreadyUsed))
            .count();
        assert_eq!(consumed, 1);
        assert_eq!(replayed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn independent_tokens_for_one_draft_coexist() -> Result<()> {
        let store = MemoryResumeStore::new();
        store
            .insert_resume_token("rt1", "abc123", "sam@example.com", 3600)
            .await?;
        store
            .insert_resume_token("rt2", "abc123", "sam@example.com", 3600)
            .await?;

        assert!(matches!(
            store.consume_resume_token("rt1").await?,
            ConsumeOutcome::Consumed { .. }
        ));
        // Consuming one token does not invalidate the other.
        assert!(matches!(
            store.consume_resume_token("rt2").await?,
            ConsumeOutcome::Consumed { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_expired_tokens_and_keeps_live_drafts() -> Result<()> {
        let store = MemoryResumeStore::new();
        store.upsert_draft("live", "drafts/live.json", 0).await?;
        store
            .insert_resume_token("dead", "live", "sam@example.com", -60)
            .await?;
        store
            .insert_resume_token("alive", "live", "sam@example.com", 3600)
            .await?;

        let removed = store.purge_expired(180).await?;
        assert_eq!(removed, 1);
        assert_eq!(
            store.consume_resume_token("dead").await?,
            ConsumeOutcome::NotFound
        );
        assert!(store.find_draft("live").await?.is_some());
        Ok(())
    }
}
