use newsroom_common::error::{NewsroomError, NewsroomResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    /// Lease length for the per-account sync lock.
    pub lock_ttl_secs: u64,
    /// Upper bound accepted for `item_limit` on a sync request.
    pub max_item_limit: usize,
    pub page_size: usize,
    /// Renew the lease after this many fetched pages.
    pub renew_every_pages: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> NewsroomResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let cfg = Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            lock_ttl_secs: parse_var_or("SYNC_LOCK_TTL_SECS", 300)?,
            max_item_limit: parse_var_or("SYNC_MAX_ITEM_LIMIT", 1000)?,
            page_size: parse_var_or("SYNC_PAGE_SIZE", 50)?,
            renew_every_pages: parse_var_or("SYNC_RENEW_EVERY_PAGES", 5)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> NewsroomResult<()> {
        if self.lock_ttl_secs == 0 {
            return Err(NewsroomError::Config(
                "SYNC_LOCK_TTL_SECS must be greater than zero".to_owned(),
            ));
        }
        if self.page_size == 0 || self.max_item_limit == 0 || self.renew_every_pages == 0 {
            return Err(NewsroomError::Config(
                "SYNC_PAGE_SIZE, SYNC_MAX_ITEM_LIMIT and SYNC_RENEW_EVERY_PAGES must be positive"
                    .to_owned(),
            ));
        }
        Ok(())
    }
}

fn get_var(key: &str) -> NewsroomResult<String> {
    env::var(key).map_err(|_| NewsroomError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> NewsroomResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| NewsroomError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
