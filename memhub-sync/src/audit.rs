//! Sync-run audit records.
//!
//! Auditing is a side channel. A sink failure is logged by the engine and
//! never changes the outcome of the sync it describes, which is why sinks
//! report [`AuditError`] instead of [`SyncError`](crate::SyncError).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memhub_types::{InstanceId, SyncRequest, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors raised by an audit sink.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Completed,
    Failed,
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

impl FromStr for SyncRunStatus {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(AuditError::Storage(format!("unknown run status {other:?}"))),
        }
    }
}

/// One sync run as seen by the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunRecord {
    pub id: Uuid,
    pub source_instance_id: InstanceId,
    pub target_instance_id: InstanceId,
    pub categories: Vec<String>,
    pub status: SyncRunStatus,
    /// Counts of completed work, even for failed runs.
    pub synced_count: usize,
    pub updated_count: usize,
    pub conflict_count: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SyncRunRecord {
    /// Builds the record for a finished run.
    #[must_use]
    pub fn new(
        request: &SyncRequest,
        result: &SyncResult,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            source_instance_id: request.source_instance_id.clone(),
            target_instance_id: request.target_instance_id.clone(),
            categories: request.categories.clone(),
            status: if error.is_some() {
                SyncRunStatus::Failed
            } else {
                SyncRunStatus::Completed
            },
            synced_count: result.synced_count,
            updated_count: result.updated_count,
            conflict_count: result.conflict_count,
            error,
            started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Destination for sync-run records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_sync_run(&self, record: &SyncRunRecord) -> Result<(), AuditError>;
}

/// Writes sync runs to the `tracing` output. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_sync_run(&self, record: &SyncRunRecord) -> Result<(), AuditError> {
        info!(
            run_id = %record.id,
            source = %record.source_instance_id,
            target = %record.target_instance_id,
            status = %record.status,
            synced = record.synced_count,
            updated = record.updated_count,
            conflicts = record.conflict_count,
            "Sync run finished"
        );
        Ok(())
    }
}
