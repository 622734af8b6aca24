use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `sync_locks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub key: String,
    pub holder_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl LockRecord {
    /// A row at or past its expiry is free, even if still present.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_held_by(&self, holder_id: &str, now: DateTime<Utc>) -> bool {
        self.holder_id == holder_id && !self.is_expired_at(now)
    }
}
