//! Best-effort audit trail for sensitive admin reads.
//!
//! Recording is fire-and-forget: the event is handed to a spawned task and
//! sink failures are logged and swallowed, so auditing can never break the
//! request path it observes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, Instrument};

/// Actor recorded when no identity could be resolved.
pub const ACTOR_UNKNOWN: &str = "unknown";

#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub actor: String,
    pub source_ip: Option<String>,
    pub action: &'static str,
    pub resource: String,
    pub outcome: &'static str,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// Sink that only logs; used when no database is wired up.
#[derive(Clone, Debug)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        info!(
            actor = %event.actor,
            action = %event.action,
            resource = %event.resource,
            outcome = %event.outcome,
            "audit"
        );
        Ok(())
    }
}

/// Sink that appends to the `admin_audit_events` table.
#[derive(Clone, Debug)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        let query = r"
            INSERT INTO admin_audit_events (actor, source_ip, action, resource, outcome)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&event.actor)
            .bind(&event.source_ip)
            .bind(event.action)
            .bind(event.resource.as_str())
            .bind(event.outcome)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert audit event")?;
        Ok(())
    }
}

/// Sink that collects events in memory for assertions.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Hands events to the sink without ever blocking or failing the caller.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn record(&self, event: AuditEvent) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(err) = sink.record(&event).await {
                error!("failed to record audit event: {err}");
            }
        });
    }
}
