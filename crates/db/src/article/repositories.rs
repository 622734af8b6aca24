use async_trait::async_trait;

use crate::article::models::SyncedArticle;
use newsroom_common::error::NewsroomResult;

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> NewsroomResult<Option<SyncedArticle>>;

    /// Insert a new row. Fails with `NewsroomError::Conflict` if
    /// `(account_id, external_id)` already exists.
    async fn insert(&self, article: &SyncedArticle) -> NewsroomResult<()>;

    /// Overwrite content fields keyed by `(account_id, external_id)`, only when
    /// the stored `content_hash` differs. Returns `true` if a row changed;
    /// `updated_at` is untouched otherwise.
    async fn update_if_changed(&self, article: &SyncedArticle) -> NewsroomResult<bool>;

    /// Record that the latest upstream payload for `external_id` could not be used.
    async fn mark_failed(&self, account_id: &str, external_id: &str) -> NewsroomResult<()>;

    async fn count_for_account(&self, account_id: &str) -> NewsroomResult<i64>;
}
