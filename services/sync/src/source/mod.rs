pub mod client;
pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use self::models::SourceArticle;

/// One request against the content source's cursor protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: usize,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub items: Vec<SourceArticle>,
    /// `None` once the source is exhausted.
    pub next_cursor: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("authentication rejected (HTTP {status}): {body}")]
    Auth { status: StatusCode, body: String },

    #[error("rate limited by content source")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid content API URL: {0}")]
    InvalidUrl(String),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A paginated, rate-limited provider of articles for an account.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_page(
        &self,
        account_id: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError>;
}
