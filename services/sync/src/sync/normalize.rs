use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::source::models::SourceArticle;
use newsroom_db::article::models::{ArticleStatus, SyncedArticle};

/// Field separator for hashing; cannot appear in trimmed text we keep.
const FIELD_SEP: u8 = 0x1f;

/// A source item that passed validation, with its content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArticle {
    pub external_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: ArticleStatus,
    pub content_hash: String,
}

impl NormalizedArticle {
    pub fn into_article(self, account_id: &str) -> SyncedArticle {
        let now = Utc::now();
        SyncedArticle {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            external_id: self.external_id,
            title: self.title,
            summary: self.summary,
            body: self.body,
            url: self.url,
            author: self.author,
            published_at: self.published_at,
            content_hash: self.content_hash,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedItem {
    pub external_id: Option<String>,
    pub message: String,
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().replace(char::from(FIELD_SEP), " "))
        .filter(|v| !v.is_empty())
}

fn map_status(raw: Option<&str>) -> ArticleStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("archived" | "withdrawn" | "deleted") => ArticleStatus::Archived,
        _ => ArticleStatus::Active,
    }
}

/// Validate and normalize a source item.
pub fn normalize(item: &SourceArticle) -> Result<NormalizedArticle, MalformedItem> {
    let external_id = clean(item.id.as_deref()).ok_or_else(|| MalformedItem {
        external_id: None,
        message: "missing id".to_string(),
    })?;

    let malformed = |message: String| MalformedItem {
        external_id: Some(external_id.clone()),
        message,
    };

    let title = clean(item.title.as_deref()).ok_or_else(|| malformed("missing title".into()))?;

    let published_at = match clean(item.published_at.as_deref()) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| malformed(format!("invalid published_at {raw:?}: {e}")))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let mut article = NormalizedArticle {
        external_id: external_id.clone(),
        title,
        summary: clean(item.summary.as_deref()),
        body: clean(item.body.as_deref()),
        url: clean(item.url.as_deref()),
        author: clean(item.author.as_deref()),
        published_at,
        status: map_status(item.status.as_deref()),
        content_hash: String::new(),
    };
    article.content_hash = content_hash(&article);
    Ok(article)
}

/// SHA-256 over the normalized content fields, hex encoded.
pub fn content_hash(article: &NormalizedArticle) -> String {
    let published = article
        .published_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));

    let fields: [Option<&str>; 7] = [
        Some(article.title.as_str()),
        article.summary.as_deref(),
        article.body.as_deref(),
        article.url.as_deref(),
        article.author.as_deref(),
        published.as_deref(),
        Some(article.status.as_str()),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.unwrap_or_default().as_bytes());
        hasher.update([FIELD_SEP]);
    }
    hex::encode(hasher.finalize())
}
