use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SyncError;

/// Terminal state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Options failed validation; nothing was touched.
    Rejected,
    /// The account lock is held elsewhere.
    Denied,
    LockLost,
    FatalItemError,
    SourceFailed,
    StoreFailed,
    Cancelled,
    /// The run's task died without producing a result.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Created,
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncStats {
    pub fn record(&mut self, action: ItemAction) {
        self.total += 1;
        match action {
            ItemAction::Created => self.created += 1,
            ItemAction::Updated => self.updated += 1,
            ItemAction::Skipped => self.skipped += 1,
            ItemAction::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// The source payload could not be turned into an article.
    Malformed,
    /// The store rejected the write.
    Write,
    /// Insert collided with an existing row under `DuplicatePolicy::Fail`.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Zero-based position in source order.
    pub position: usize,
    pub external_id: Option<String>,
    pub kind: ItemErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub account_id: String,
    pub success: bool,
    pub outcome: RunOutcome,
    pub reason: Option<String>,
    pub message: String,
    pub stats: SyncStats,
    pub errors: Vec<ItemError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncResult {
    pub fn completed(
        account_id: &str,
        stats: SyncStats,
        errors: Vec<ItemError>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let message = if stats.failed == 0 {
            format!(
                "synced {} items: {} created, {} updated, {} skipped",
                stats.total, stats.created, stats.updated, stats.skipped
            )
        } else {
            format!(
                "synced {} items with {} failures: {} created, {} updated, {} skipped",
                stats.total, stats.failed, stats.created, stats.updated, stats.skipped
            )
        };

        Self {
            account_id: account_id.to_string(),
            success: true,
            outcome: RunOutcome::Completed,
            reason: None,
            message,
            stats,
            errors,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn aborted(
        account_id: &str,
        error: &SyncError,
        stats: SyncStats,
        errors: Vec<ItemError>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            success: false,
            outcome: error.outcome(),
            reason: Some(error.reason().to_string()),
            message: error.to_string(),
            stats,
            errors,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn internal(account_id: &str, message: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            success: false,
            outcome: RunOutcome::Internal,
            reason: Some("internal".to_string()),
            message: message.into(),
            stats: SyncStats::default(),
            errors: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}
