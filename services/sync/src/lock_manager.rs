use std::time::Duration;

use uuid::Uuid;

use newsroom_common::error::{NewsroomError, NewsroomResult};
use newsroom_db::lock::repositories::LockRepository;

/// Proof of a successful acquisition. The holder token is minted per
/// acquisition, so a lease that expired and was taken over can no longer
/// release or renew the new owner's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub holder_id: String,
}

/// Lease-based mutual exclusion over a shared lock table.
pub struct LockManager<L> {
    repo: L,
}

impl<L> LockManager<L>
where
    L: LockRepository,
{
    pub fn new(repo: L) -> Self {
        Self { repo }
    }

    pub fn lock_key_for_account(account_id: &str) -> String {
        format!("sync:{account_id}")
    }

    fn validate(key: &str, ttl: Duration) -> NewsroomResult<()> {
        if key.trim().is_empty() {
            return Err(NewsroomError::Validation("lock key must not be empty".into()));
        }
        if ttl.is_zero() {
            return Err(NewsroomError::Validation("lock ttl must be positive".into()));
        }
        Ok(())
    }

    /// Non-blocking acquire. Returns `None` when another holder owns an
    /// unexpired lease.
    ///
    /// The upsert only overwrites an expired row, then the row is read back:
    /// whoever's token is stored won.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> NewsroomResult<Option<LockLease>> {
        Self::validate(key, ttl)?;

        let holder_id = Uuid::new_v4().to_string();
        self.repo.upsert_if_expired(key, &holder_id, ttl).await?;

        let current = self.repo.get(key).await?;
        match current {
            Some(record) if record.holder_id == holder_id => {
                tracing::debug!(lock_key = key, expires_at = %record.expires_at, "lock acquired");
                Ok(Some(LockLease {
                    key: key.to_string(),
                    holder_id,
                }))
            }
            Some(record) => {
                tracing::debug!(
                    lock_key = key,
                    expires_at = %record.expires_at,
                    "lock held by another process"
                );
                Ok(None)
            }
            // Released by the winner between our upsert and read.
            None => Ok(None),
        }
    }

    /// Drop the lease if it is still ours. Returns `false` for a stale lease.
    pub async fn release(&self, lease: &LockLease) -> NewsroomResult<bool> {
        let released = self
            .repo
            .delete_if_holder(&lease.key, &lease.holder_id)
            .await?;
        if !released {
            tracing::warn!(lock_key = %lease.key, "release skipped, lease no longer owned");
        }
        Ok(released)
    }

    pub async fn is_held(&self, key: &str) -> NewsroomResult<bool> {
        self.repo.is_held(key).await
    }

    /// Extend the lease. `false` means it expired or was taken over.
    pub async fn renew(&self, lease: &LockLease, ttl: Duration) -> NewsroomResult<bool> {
        Self::validate(&lease.key, ttl)?;
        self.repo
            .extend_if_holder(&lease.key, &lease.holder_id, ttl)
            .await
    }
}
