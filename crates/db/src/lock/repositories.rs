use std::time::Duration;

use async_trait::async_trait;

use crate::lock::models::LockRecord;
use newsroom_common::error::NewsroomResult;

/// Storage for named leases. Every mutation must be a single atomic statement
/// evaluated against the store's clock.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Insert the row, or overwrite holder and expiry if the existing row has
    /// expired. A live row is left untouched.
    async fn upsert_if_expired(&self, key: &str, holder_id: &str, ttl: Duration)
        -> NewsroomResult<()>;

    async fn get(&self, key: &str) -> NewsroomResult<Option<LockRecord>>;

    /// Returns `true` if an unexpired row exists for `key`.
    async fn is_held(&self, key: &str) -> NewsroomResult<bool>;

    /// Push expiry to `now + ttl` only while `holder_id` owns an unexpired row.
    /// Returns `false` if ownership was lost.
    async fn extend_if_holder(&self, key: &str, holder_id: &str, ttl: Duration)
        -> NewsroomResult<bool>;

    /// Delete the row only if `holder_id` matches. Returns `true` if a row was removed.
    async fn delete_if_holder(&self, key: &str, holder_id: &str) -> NewsroomResult<bool>;
}
