use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SyncError;
use newsroom_common::error::{NewsroomError, NewsroomResult};
use newsroom_config::AppConfig;

/// Which slice of the source a run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// The newest `item_limit` items.
    #[default]
    Recent,
    All,
    Custom,
}

/// How to treat an insert that collides with a row written by someone else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Update,
    Fail,
}

/// Half-open publication window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub scope: SyncScope,
    pub item_limit: Option<usize>,
    pub custom_range: Option<DateRange>,
    pub duplicate_policy: DuplicatePolicy,
    /// Diagnostics only: run without taking the account lock.
    pub bypass_lock: bool,
    #[serde(rename = "async")]
    pub run_async: bool,
}

impl SyncOptions {
    pub fn recent(item_limit: usize) -> Self {
        Self {
            scope: SyncScope::Recent,
            item_limit: Some(item_limit),
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            scope: SyncScope::All,
            ..Self::default()
        }
    }

    pub fn custom(range: DateRange) -> Self {
        Self {
            scope: SyncScope::Custom,
            custom_range: Some(range),
            ..Self::default()
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_item_limit(mut self, item_limit: usize) -> Self {
        self.item_limit = Some(item_limit);
        self
    }

    /// Check the option combination before any side effect.
    pub fn validate(&self, max_item_limit: usize) -> Result<(), SyncError> {
        if let Some(limit) = self.item_limit {
            if limit == 0 || limit > max_item_limit {
                return Err(SyncError::Validation(format!(
                    "item_limit must be between 1 and {max_item_limit}, got {limit}"
                )));
            }
        }

        match self.scope {
            SyncScope::Recent => {
                if self.item_limit.is_none() {
                    return Err(SyncError::Validation(
                        "item_limit is required when scope is recent".into(),
                    ));
                }
            }
            SyncScope::Custom => {
                let range = self.custom_range.ok_or_else(|| {
                    SyncError::Validation("custom_range is required when scope is custom".into())
                })?;
                if range.start >= range.end {
                    return Err(SyncError::Validation(
                        "custom_range start must be before end".into(),
                    ));
                }
            }
            SyncScope::All => {}
        }

        if self.scope != SyncScope::Custom && self.custom_range.is_some() {
            return Err(SyncError::Validation(
                "custom_range is only allowed when scope is custom".into(),
            ));
        }

        Ok(())
    }

    /// The range to enforce while paging; only set for custom scope.
    pub fn window(&self) -> Option<DateRange> {
        match self.scope {
            SyncScope::Custom => self.custom_range,
            _ => None,
        }
    }
}

/// Runtime knobs for the orchestrator, built once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub lease_ttl: Duration,
    pub max_item_limit: usize,
    pub page_size: usize,
    pub renew_every_pages: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(300),
            max_item_limit: 1000,
            page_size: 50,
            renew_every_pages: 5,
        }
    }
}

impl SyncSettings {
    /// Reject settings the run loop cannot honor.
    pub fn validate(&self) -> NewsroomResult<()> {
        if self.lease_ttl.is_zero() {
            return Err(NewsroomError::Config(
                "lease_ttl must be greater than zero".to_owned(),
            ));
        }
        if self.page_size == 0 || self.max_item_limit == 0 || self.renew_every_pages == 0 {
            return Err(NewsroomError::Config(
                "page_size, max_item_limit and renew_every_pages must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lease_ttl: Duration::from_secs(config.lock_ttl_secs),
            max_item_limit: config.max_item_limit,
            page_size: config.page_size.max(1),
            renew_every_pages: config.renew_every_pages.max(1),
        }
    }
}

/// Parse a comma-separated list of account ids from an env var.
/// Returns `Err` if the var is missing or all entries are blank after trimming.
pub fn parse_csv_account_ids(env_key: &str) -> Result<Vec<String>, String> {
    let raw = std::env::var(env_key).map_err(|_| format!("{env_key} is required but not set"))?;

    let mut seen = HashSet::new();
    let ids: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect();

    if ids.is_empty() {
        return Err(format!("{env_key} is set but contains no account ids"));
    }

    Ok(ids)
}

/// Build run options from `SYNC_SCOPE`, `SYNC_ITEM_LIMIT` and `SYNC_DUPLICATE_POLICY`.
pub fn options_from_env() -> Result<SyncOptions, String> {
    let scope = match std::env::var("SYNC_SCOPE")
        .unwrap_or_else(|_| "recent".to_string())
        .trim()
        .to_lowercase()
        .as_str()
    {
        "recent" => SyncScope::Recent,
        "all" => SyncScope::All,
        other => return Err(format!("unsupported SYNC_SCOPE: {other}")),
    };

    let item_limit = match std::env::var("SYNC_ITEM_LIMIT") {
        Ok(raw) => Some(
            raw.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid SYNC_ITEM_LIMIT: {e}"))?,
        ),
        Err(_) if scope == SyncScope::Recent => Some(100),
        Err(_) => None,
    };

    let duplicate_policy = match std::env::var("SYNC_DUPLICATE_POLICY")
        .unwrap_or_else(|_| "skip".to_string())
        .trim()
        .to_lowercase()
        .as_str()
    {
        "skip" => DuplicatePolicy::Skip,
        "update" => DuplicatePolicy::Update,
        "fail" => DuplicatePolicy::Fail,
        other => return Err(format!("unsupported SYNC_DUPLICATE_POLICY: {other}")),
    };

    Ok(SyncOptions {
        scope,
        item_limit,
        duplicate_policy,
        ..SyncOptions::default()
    })
}
