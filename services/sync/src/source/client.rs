use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::models::ArticlePageResponse;
use super::{ArticleSource, PageRequest, SourceError, SourcePage};
use crate::retry::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Clone)]
pub struct ContentClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_secs: u64,
    pub max_retry_after_secs: u64,
}

impl ContentClientConfig {
    /// Load content API config from environment.
    ///
    /// Returns `None` if the base URL or API key is missing.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CONTENT_API_BASE_URL").ok()?;
        let api_key = std::env::var("CONTENT_API_KEY").ok()?;

        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: env_or("CONTENT_API_MAX_RETRIES", 3),
            timeout_secs: env_or("CONTENT_API_TIMEOUT_SECS", 30),
            backoff_base_ms: env_or("CONTENT_API_BACKOFF_BASE_MS", 500),
            backoff_max_secs: env_or("CONTENT_API_BACKOFF_MAX_SECS", 30),
            max_retry_after_secs: env_or("CONTENT_API_MAX_RETRY_AFTER_SECS", 60),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_secs(self.backoff_max_secs),
            max_retry_after: Duration::from_secs(self.max_retry_after_secs),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// HTTP client for the external content API.
#[derive(Clone)]
pub struct ContentClient {
    client: Client,
    config: ContentClientConfig,
    retry: RetryPolicy,
}

impl ContentClient {
    pub fn new(config: ContentClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let retry = config.retry_policy();
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    fn page_query(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", request.limit.to_string())];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(after) = request.published_after {
            query.push(("published_after", after.to_rfc3339()));
        }
        if let Some(before) = request.published_before {
            query.push(("published_before", before.to_rfc3339()));
        }
        query
    }

    /// `{base_url}/v1/accounts/{account_id}/articles`, with the account id
    /// percent-encoded as a single path segment.
    fn articles_url(&self, account_id: &str) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(["v1", "accounts", account_id, "articles"]);
        Ok(url)
    }

    /// One attempt, with the response classified for the retry loop.
    async fn fetch_once(
        &self,
        account_id: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError> {
        let url = self.articles_url(account_id)?;

        let response = match self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .query(&Self::page_query(request))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Err(SourceError::Transient(e.to_string()))
            }
            Err(e) => return Err(SourceError::RequestError(e)),
        };

        let status = response.status();

        if status.is_success() {
            let page = response
                .json::<ArticlePageResponse>()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            return Ok(SourcePage {
                items: page.items,
                next_cursor: page.next_cursor.filter(|c| !c.is_empty()),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SourceError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Auth { status, body });
        }

        if status.is_server_error() {
            return Err(SourceError::Transient(format!("{status}: {body}")));
        }

        Err(SourceError::HttpError { status, body })
    }
}

#[async_trait]
impl ArticleSource for ContentClient {
    async fn fetch_page(
        &self,
        account_id: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError> {
        retry_with_backoff(&self.retry, move || self.fetch_once(account_id, request)).await
    }
}
