use newsroom_common::error::NewsroomError;

use super::result::RunOutcome;
use crate::source::SourceError;

/// Why a run stopped before (or instead of) completing.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid sync options: {0}")]
    Validation(String),

    #[error("sync already running for {0}, try again later")]
    LockBusy(String),

    #[error("lost lock {0} during sync")]
    LockLost(String),

    #[error("duplicate article {0} rejected by duplicate policy")]
    DuplicateItem(String),

    #[error("content source error: {0}")]
    Source(#[from] SourceError),

    #[error("store error: {0}")]
    Store(#[from] NewsroomError),

    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            Self::Validation(_) => RunOutcome::Rejected,
            Self::LockBusy(_) => RunOutcome::Denied,
            Self::LockLost(_) => RunOutcome::LockLost,
            Self::DuplicateItem(_) => RunOutcome::FatalItemError,
            Self::Source(_) => RunOutcome::SourceFailed,
            Self::Store(_) => RunOutcome::StoreFailed,
            Self::Cancelled => RunOutcome::Cancelled,
        }
    }

    /// Short machine-readable reason for the result payload.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::LockBusy(_) => "locked",
            Self::LockLost(_) => "lost lock",
            Self::DuplicateItem(_) => "duplicate",
            Self::Source(SourceError::Auth { .. }) => "source auth",
            Self::Source(_) => "source",
            Self::Store(_) => "store",
            Self::Cancelled => "cancelled",
        }
    }
}
