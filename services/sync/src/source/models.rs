use serde::{Deserialize, Serialize};

/// An article as served by the content API.
///
/// Every field is optional on the wire; validation happens during
/// normalization so one bad item cannot fail a whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceArticle {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response body of `GET /v1/accounts/{account_id}/articles`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticlePageResponse {
    #[serde(default)]
    pub items: Vec<SourceArticle>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
