//! In-memory stand-ins for the lock table, article store and content API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use newsroom_common::error::{NewsroomError, NewsroomResult};
use newsroom_db::article::models::{ArticleStatus, SyncedArticle};
use newsroom_db::article::repositories::ArticleRepository;
use newsroom_db::lock::models::LockRecord;
use newsroom_db::lock::repositories::LockRepository;

use crate::source::models::SourceArticle;
use crate::source::{ArticleSource, PageRequest, SourceError, SourcePage};

fn unavailable() -> NewsroomError {
    NewsroomError::Database("store unavailable".into())
}

fn chrono_ttl(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365))
}

#[derive(Default)]
struct LockState {
    rows: Mutex<HashMap<String, LockRecord>>,
    unavailable: AtomicBool,
    acquire_attempts: AtomicUsize,
    renewals: AtomicUsize,
}

/// Lock table with the same conditional-write semantics as `sync_locks`.
#[derive(Clone, Default)]
pub struct InMemoryLockRepo {
    state: Arc<LockState>,
}

impl InMemoryLockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> NewsroomResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Push the row's expiry into the past.
    pub fn expire(&self, key: &str) {
        if let Some(row) = self.state.rows.lock().unwrap().get_mut(key) {
            row.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    /// Overwrite the row as if another process had taken it over.
    pub fn steal(&self, key: &str, holder_id: &str) {
        let now = Utc::now();
        self.state.rows.lock().unwrap().insert(
            key.to_string(),
            LockRecord {
                key: key.to_string(),
                holder_id: holder_id.to_string(),
                expires_at: now + chrono::Duration::seconds(60),
                created_at: now,
            },
        );
    }

    pub fn holder(&self, key: &str) -> Option<String> {
        self.state
            .rows
            .lock()
            .unwrap()
            .get(key)
            .map(|row| row.holder_id.clone())
    }

    pub fn is_held_now(&self, key: &str) -> bool {
        self.state
            .rows
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|row| !row.is_expired_at(Utc::now()))
    }

    pub fn acquire_attempts(&self) -> usize {
        self.state.acquire_attempts.load(Ordering::SeqCst)
    }

    pub fn renewals(&self) -> usize {
        self.state.renewals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockRepository for InMemoryLockRepo {
    async fn upsert_if_expired(
        &self,
        key: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> NewsroomResult<()> {
        self.check()?;
        self.state.acquire_attempts.fetch_add(1, Ordering::SeqCst);

        let now = Utc::now();
        let mut rows = self.state.rows.lock().unwrap();
        let live = rows.get(key).is_some_and(|row| !row.is_expired_at(now));
        if !live {
            let created_at = rows.get(key).map_or(now, |row| row.created_at);
            rows.insert(
                key.to_string(),
                LockRecord {
                    key: key.to_string(),
                    holder_id: holder_id.to_string(),
                    expires_at: now + chrono_ttl(ttl),
                    created_at,
                },
            );
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> NewsroomResult<Option<LockRecord>> {
        self.check()?;
        Ok(self.state.rows.lock().unwrap().get(key).cloned())
    }

    async fn is_held(&self, key: &str) -> NewsroomResult<bool> {
        self.check()?;
        Ok(self.is_held_now(key))
    }

    async fn extend_if_holder(
        &self,
        key: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> NewsroomResult<bool> {
        self.check()?;
        let now = Utc::now();
        let mut rows = self.state.rows.lock().unwrap();
        match rows.get_mut(key) {
            Some(row) if row.is_held_by(holder_id, now) => {
                row.expires_at = now + chrono_ttl(ttl);
                self.state.renewals.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_holder(&self, key: &str, holder_id: &str) -> NewsroomResult<bool> {
        self.check()?;
        let mut rows = self.state.rows.lock().unwrap();
        if rows.get(key).is_some_and(|row| row.holder_id == holder_id) {
            rows.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Default)]
struct ArticleState {
    rows: Mutex<HashMap<(String, String), SyncedArticle>>,
    fail_writes: Mutex<HashSet<String>>,
    /// external_id -> content hash a concurrent writer lands just before our insert.
    races: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

#[derive(Clone, Default)]
pub struct InMemoryArticleRepo {
    state: Arc<ArticleState>,
}

impl InMemoryArticleRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> NewsroomResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn check_write(&self, external_id: &str) -> NewsroomResult<()> {
        self.check()?;
        if self.state.fail_writes.lock().unwrap().contains(external_id) {
            return Err(NewsroomError::Constraint(format!(
                "row for {external_id} violates check constraint"
            )));
        }
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every write for `external_id` fail with a constraint violation.
    pub fn fail_writes_for(&self, external_id: &str) {
        self.state
            .fail_writes
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    /// Simulate another writer inserting `external_id` between our lookup and insert.
    pub fn race_insert_for(&self, external_id: &str, content_hash: &str) {
        self.state
            .races
            .lock()
            .unwrap()
            .insert(external_id.to_string(), content_hash.to_string());
    }

    pub fn get(&self, account_id: &str, external_id: &str) -> Option<SyncedArticle> {
        self.state
            .rows
            .lock()
            .unwrap()
            .get(&(account_id.to_string(), external_id.to_string()))
            .cloned()
    }

    pub fn count(&self, account_id: &str) -> usize {
        self.state
            .rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(account, _)| account == account_id)
            .count()
    }

    /// All rows for the account ordered by external id.
    pub fn snapshot(&self, account_id: &str) -> Vec<SyncedArticle> {
        let mut rows: Vec<_> = self
            .state
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        rows
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepo {
    async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> NewsroomResult<Option<SyncedArticle>> {
        self.check()?;
        Ok(self.get(account_id, external_id))
    }

    async fn insert(&self, article: &SyncedArticle) -> NewsroomResult<()> {
        self.check_write(&article.external_id)?;
        let key = (article.account_id.clone(), article.external_id.clone());
        let mut rows = self.state.rows.lock().unwrap();

        if let Some(hash) = self.state.races.lock().unwrap().remove(&article.external_id) {
            let mut contender = article.clone();
            contender.id = uuid::Uuid::new_v4();
            contender.content_hash = hash;
            rows.insert(key.clone(), contender);
        }

        if rows.contains_key(&key) {
            return Err(NewsroomError::Conflict(format!(
                "article {} already exists",
                article.external_id
            )));
        }
        rows.insert(key, article.clone());
        Ok(())
    }

    async fn update_if_changed(&self, article: &SyncedArticle) -> NewsroomResult<bool> {
        self.check_write(&article.external_id)?;
        let key = (article.account_id.clone(), article.external_id.clone());
        let mut rows = self.state.rows.lock().unwrap();
        match rows.get_mut(&key) {
            Some(row) if row.content_hash != article.content_hash => {
                row.title = article.title.clone();
                row.summary = article.summary.clone();
                row.body = article.body.clone();
                row.url = article.url.clone();
                row.author = article.author.clone();
                row.published_at = article.published_at;
                row.content_hash = article.content_hash.clone();
                row.status = article.status;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, account_id: &str, external_id: &str) -> NewsroomResult<()> {
        self.check_write(external_id)?;
        let now = Utc::now();
        let mut rows = self.state.rows.lock().unwrap();
        let row = rows
            .entry((account_id.to_string(), external_id.to_string()))
            .or_insert_with(|| SyncedArticle {
                id: uuid::Uuid::new_v4(),
                account_id: account_id.to_string(),
                external_id: external_id.to_string(),
                title: String::new(),
                summary: None,
                body: None,
                url: None,
                author: None,
                published_at: None,
                content_hash: String::new(),
                status: ArticleStatus::Failed,
                created_at: now,
                updated_at: now,
            });
        if row.status != ArticleStatus::Failed {
            row.status = ArticleStatus::Failed;
            row.content_hash.clear();
            row.updated_at = now;
        }
        Ok(())
    }

    async fn count_for_account(&self, account_id: &str) -> NewsroomResult<i64> {
        self.check()?;
        Ok(self.count(account_id) as i64)
    }
}

/// Source article `art-{index}`, published one hour earlier per index
/// starting from 2026-03-01T12:00:00Z.
pub fn source_item(index: usize, title: &str) -> SourceArticle {
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let published = base - chrono::Duration::hours(index as i64);
    SourceArticle {
        id: Some(format!("art-{index}")),
        title: Some(title.to_string()),
        summary: Some(format!("Summary {index}")),
        body: Some(format!("Body of article {index}")),
        url: Some(format!("https://news.example.com/articles/{index}")),
        author: Some("Desk".to_string()),
        published_at: Some(published.to_rfc3339()),
        status: Some("published".to_string()),
    }
}

type PageHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SourceState {
    items: Mutex<Vec<SourceArticle>>,
    calls: AtomicUsize,
    hooks: Mutex<HashMap<usize, PageHook>>,
    failures: Mutex<HashMap<usize, SourceError>>,
    last_request: Mutex<Option<PageRequest>>,
}

/// Serves a fixed list newest first, using the item offset as the cursor.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<SourceState>,
    delay: Option<Duration>,
}

impl FakeSource {
    pub fn new(items: Vec<SourceArticle>) -> Self {
        let source = Self::default();
        *source.state.items.lock().unwrap() = items;
        source
    }

    pub fn with_items(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| source_item(i, &format!("Article {i}")))
                .collect(),
        )
    }

    /// Sleep before answering each page.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn replace(&self, index: usize, item: SourceArticle) {
        self.state.items.lock().unwrap()[index] = item;
    }

    /// Run `hook` when page `page` (1-based) is requested.
    pub fn on_page(&self, page: usize, hook: impl FnOnce() + Send + 'static) {
        self.state.hooks.lock().unwrap().insert(page, Box::new(hook));
    }

    /// Answer page `page` (1-based) with `error`.
    pub fn fail_page(&self, page: usize, error: SourceError) {
        self.state.failures.lock().unwrap().insert(page, error);
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PageRequest> {
        self.state.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSource for FakeSource {
    async fn fetch_page(
        &self,
        _account_id: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError> {
        let page = self.state.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.last_request.lock().unwrap() = Some(request.clone());

        let hook = self.state.hooks.lock().unwrap().remove(&page);
        if let Some(hook) = hook {
            hook();
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state.failures.lock().unwrap().remove(&page);
        if let Some(error) = failure {
            return Err(error);
        }

        let items = self.state.items.lock().unwrap();
        let start = request
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0)
            .min(items.len());
        let end = (start + request.limit).min(items.len());

        Ok(SourcePage {
            items: items[start..end].to_vec(),
            next_cursor: (end < items.len()).then(|| end.to_string()),
        })
    }
}
