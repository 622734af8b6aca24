use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use newsroom_common::error::{NewsroomError, NewsroomResult};
use newsroom_db::article::models::SyncedArticle;
use newsroom_db::article::repositories::ArticleRepository;
use newsroom_db::lock::repositories::LockRepository;

use super::error::SyncError;
use super::normalize::{normalize, MalformedItem};
use super::options::{DuplicatePolicy, SyncOptions, SyncSettings};
use super::result::{ItemAction, ItemError, ItemErrorKind, SyncResult, SyncStats};
use crate::lock_manager::{LockLease, LockManager};
use crate::source::{ArticleSource, PageRequest};

/// Counters and per-item errors accumulated while a run progresses.
#[derive(Debug, Default)]
struct RunProgress {
    stats: SyncStats,
    errors: Vec<ItemError>,
    pages: usize,
}

impl RunProgress {
    fn fail_item(
        &mut self,
        position: usize,
        external_id: Option<String>,
        kind: ItemErrorKind,
        message: String,
    ) {
        self.stats.record(ItemAction::Failed);
        self.errors.push(ItemError {
            position,
            external_id,
            kind,
            message,
        });
    }
}

/// Drives one account's sync: lock, page through the source, reconcile each
/// item into the article store, release.
pub struct SyncOrchestrator<L, A, S> {
    locks: LockManager<L>,
    articles: A,
    source: S,
    settings: SyncSettings,
}

impl<L, A, S> SyncOrchestrator<L, A, S>
where
    L: LockRepository,
    A: ArticleRepository,
    S: ArticleSource,
{
    /// Fails with `NewsroomError::Config` when `settings` has a zero lease,
    /// page size, item limit or renew cadence.
    pub fn new(
        lock_repo: L,
        articles: A,
        source: S,
        settings: SyncSettings,
    ) -> NewsroomResult<Self> {
        settings.validate()?;
        Ok(Self {
            locks: LockManager::new(lock_repo),
            articles,
            source,
            settings,
        })
    }

    pub fn lock_manager(&self) -> &LockManager<L> {
        &self.locks
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn validate(&self, account_id: &str, options: &SyncOptions) -> Result<(), SyncError> {
        if account_id.trim().is_empty() {
            return Err(SyncError::Validation("account_id must not be empty".into()));
        }
        options.validate(self.settings.max_item_limit)
    }

    /// Run a sync to completion. Never fails: every outcome, including
    /// validation errors and a busy lock, comes back as a [`SyncResult`].
    pub async fn run(
        &self,
        account_id: &str,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> SyncResult {
        let started_at = Utc::now();

        if let Err(err) = self.validate(account_id, options) {
            tracing::warn!(account_id, error = %err, "rejected sync request");
            return SyncResult::aborted(account_id, &err, SyncStats::default(), Vec::new(), started_at);
        }

        let mut progress = RunProgress::default();

        let outcome = if options.bypass_lock {
            tracing::warn!(account_id, "running sync without the account lock");
            self.sync_pages(account_id, options, None, cancel, &mut progress)
                .await
        } else {
            let key = LockManager::<L>::lock_key_for_account(account_id);
            let lease = match self.locks.try_acquire(&key, self.settings.lease_ttl).await {
                Ok(Some(lease)) => lease,
                Ok(None) => {
                    tracing::info!(account_id, lock_key = %key, "sync already running, skipping");
                    let err = SyncError::LockBusy(key);
                    return SyncResult::aborted(account_id, &err, progress.stats, progress.errors, started_at);
                }
                Err(e) => {
                    tracing::error!(account_id, lock_key = %key, error = %e, "failed to acquire sync lock");
                    let err = SyncError::Store(e);
                    return SyncResult::aborted(account_id, &err, progress.stats, progress.errors, started_at);
                }
            };

            let outcome = self
                .sync_pages(account_id, options, Some(&lease), cancel, &mut progress)
                .await;

            // Release on every exit path; a failed release is left to the TTL.
            if let Err(e) = self.locks.release(&lease).await {
                tracing::warn!(
                    account_id,
                    lock_key = %lease.key,
                    error = %e,
                    "failed to release sync lock, it will expire with its lease"
                );
            }
            outcome
        };

        let result = match outcome {
            Ok(()) => SyncResult::completed(account_id, progress.stats, progress.errors, started_at),
            Err(err) => {
                match &err {
                    SyncError::LockLost(_) => tracing::error!(
                        account_id,
                        error = %err,
                        "sync aborted after losing its lock; a contender may be writing the same data"
                    ),
                    SyncError::Cancelled => tracing::info!(account_id, "sync cancelled"),
                    _ => tracing::error!(account_id, error = %err, "sync aborted"),
                }
                SyncResult::aborted(account_id, &err, progress.stats, progress.errors, started_at)
            }
        };

        tracing::info!(
            account_id,
            outcome = ?result.outcome,
            total = result.stats.total,
            created = result.stats.created,
            updated = result.stats.updated,
            skipped = result.stats.skipped,
            failed = result.stats.failed,
            pages = progress.pages,
            "sync finished"
        );
        result
    }

    async fn sync_pages(
        &self,
        account_id: &str,
        options: &SyncOptions,
        lease: Option<&LockLease>,
        cancel: &CancellationToken,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        let limit = options.item_limit;
        let window = options.window();
        let mut cursor: Option<String> = None;
        let mut position = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let remaining = limit.map(|l| l.saturating_sub(progress.stats.total));
            if remaining == Some(0) {
                return Ok(());
            }

            let request = PageRequest {
                cursor: cursor.clone(),
                limit: remaining.map_or(self.settings.page_size, |r| r.min(self.settings.page_size)),
                published_after: window.map(|w| w.start),
                published_before: window.map(|w| w.end),
            };

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                page = self.source.fetch_page(account_id, &request) => page?,
            };
            progress.pages += 1;
            tracing::debug!(
                account_id,
                page = progress.pages,
                items = page.items.len(),
                "fetched source page"
            );

            let exhausted = page.items.is_empty() || page.next_cursor.is_none();

            for item in &page.items {
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                if limit.is_some_and(|l| progress.stats.total >= l) {
                    return Ok(());
                }

                let this_position = position;
                position += 1;

                let normalized = match normalize(item) {
                    Ok(n) => n,
                    Err(malformed) => {
                        self.record_malformed(account_id, this_position, malformed, progress)
                            .await?;
                        continue;
                    }
                };

                if let Some(range) = window {
                    match normalized.published_at {
                        // Newest first: anything older than the window ends the run.
                        Some(at) if at < range.start => return Ok(()),
                        Some(at) if range.contains(at) => {}
                        _ => {
                            tracing::debug!(
                                account_id,
                                external_id = %normalized.external_id,
                                "item outside custom range, ignoring"
                            );
                            continue;
                        }
                    }
                }

                let article = normalized.into_article(account_id);
                self.reconcile(article, this_position, options.duplicate_policy, progress)
                    .await?;
            }

            if exhausted {
                return Ok(());
            }
            cursor = page.next_cursor;

            if let Some(lease) = lease {
                if progress.pages % self.settings.renew_every_pages == 0 {
                    self.renew(lease).await?;
                }
            }
        }
    }

    async fn renew(&self, lease: &LockLease) -> Result<(), SyncError> {
        match self.locks.renew(lease, self.settings.lease_ttl).await {
            Ok(true) => {
                tracing::debug!(lock_key = %lease.key, "sync lock renewed");
                Ok(())
            }
            Ok(false) => Err(SyncError::LockLost(lease.key.clone())),
            Err(e) => Err(SyncError::Store(e)),
        }
    }

    async fn record_malformed(
        &self,
        account_id: &str,
        position: usize,
        malformed: MalformedItem,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        tracing::warn!(
            account_id,
            position,
            external_id = ?malformed.external_id,
            error = %malformed.message,
            "skipping malformed source item"
        );

        if let Some(external_id) = &malformed.external_id {
            match self.articles.mark_failed(account_id, external_id).await {
                Ok(()) => {}
                Err(e) if e.is_statement_level() => {
                    tracing::warn!(account_id, external_id = %external_id, error = %e, "could not flag article as failed");
                }
                Err(e) => return Err(SyncError::Store(e)),
            }
        }

        progress.fail_item(
            position,
            malformed.external_id,
            ItemErrorKind::Malformed,
            malformed.message,
        );
        Ok(())
    }

    /// Classify one article against the store and write it. Only
    /// store-wide failures and a `Fail` duplicate policy stop the run.
    async fn reconcile(
        &self,
        article: SyncedArticle,
        position: usize,
        policy: DuplicatePolicy,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        let existing = match self
            .articles
            .find_by_external_id(&article.account_id, &article.external_id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => return self.write_failed(&article, position, e, progress),
        };

        match existing {
            Some(stored) if stored.content_hash == article.content_hash => {
                progress.stats.record(ItemAction::Skipped);
                Ok(())
            }
            Some(_) => self.update(&article, position, progress).await,
            None => match self.articles.insert(&article).await {
                Ok(()) => {
                    progress.stats.record(ItemAction::Created);
                    Ok(())
                }
                Err(NewsroomError::Conflict(msg)) => {
                    self.resolve_duplicate(&article, position, policy, msg, progress)
                        .await
                }
                Err(e) => self.write_failed(&article, position, e, progress),
            },
        }
    }

    async fn update(
        &self,
        article: &SyncedArticle,
        position: usize,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        match self.articles.update_if_changed(article).await {
            Ok(true) => progress.stats.record(ItemAction::Updated),
            // Someone already stored this exact content.
            Ok(false) => progress.stats.record(ItemAction::Skipped),
            Err(e) => return self.write_failed(article, position, e, progress),
        }
        Ok(())
    }

    async fn resolve_duplicate(
        &self,
        article: &SyncedArticle,
        position: usize,
        policy: DuplicatePolicy,
        message: String,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        tracing::warn!(
            account_id = %article.account_id,
            external_id = %article.external_id,
            ?policy,
            "article inserted concurrently by another writer"
        );

        match policy {
            DuplicatePolicy::Skip => {
                progress.stats.record(ItemAction::Skipped);
                Ok(())
            }
            DuplicatePolicy::Update => self.update(article, position, progress).await,
            DuplicatePolicy::Fail => {
                progress.fail_item(
                    position,
                    Some(article.external_id.clone()),
                    ItemErrorKind::Duplicate,
                    message,
                );
                Err(SyncError::DuplicateItem(article.external_id.clone()))
            }
        }
    }

    /// Statement-level failures are isolated to the item; anything else means
    /// the store is unusable for the rest of the run.
    fn write_failed(
        &self,
        article: &SyncedArticle,
        position: usize,
        err: NewsroomError,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        if !err.is_statement_level() {
            return Err(SyncError::Store(err));
        }
        tracing::warn!(
            account_id = %article.account_id,
            external_id = %article.external_id,
            error = %err,
            "failed to write article"
        );
        progress.fail_item(
            position,
            Some(article.external_id.clone()),
            ItemErrorKind::Write,
            err.to_string(),
        );
        Ok(())
    }
}

/// A run executing on its own task.
pub struct SyncHandle {
    account_id: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    join: JoinHandle<SyncResult>,
}

impl SyncHandle {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Ask the run to stop; it still releases its lock and reports.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// When the run was handed to its task.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> SyncResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(account_id = %self.account_id, error = %e, "sync task failed");
                SyncResult::internal(
                    &self.account_id,
                    format!("sync task failed: {e}"),
                    self.started_at,
                )
            }
        }
    }
}

pub enum SyncInvocation {
    Completed(SyncResult),
    Spawned(SyncHandle),
}

impl<L, A, S> SyncOrchestrator<L, A, S>
where
    L: LockRepository + 'static,
    A: ArticleRepository + 'static,
    S: ArticleSource + 'static,
{
    /// Run inline, or on a background task when `options.run_async` is set.
    /// Invalid options are rejected inline either way.
    pub async fn submit(
        self: &Arc<Self>,
        account_id: &str,
        options: SyncOptions,
        cancel: &CancellationToken,
    ) -> SyncInvocation {
        if !options.run_async {
            return SyncInvocation::Completed(self.run(account_id, &options, cancel).await);
        }

        if let Err(err) = self.validate(account_id, &options) {
            return SyncInvocation::Completed(SyncResult::aborted(
                account_id,
                &err,
                SyncStats::default(),
                Vec::new(),
                Utc::now(),
            ));
        }

        let started_at = Utc::now();
        let token = cancel.child_token();
        let this = Arc::clone(self);
        let account = account_id.to_string();
        let task_token = token.clone();
        let join = tokio::spawn(async move { this.run(&account, &options, &task_token).await });

        SyncInvocation::Spawned(SyncHandle {
            account_id: account_id.to_string(),
            started_at,
            cancel: token,
            join,
        })
    }
}
