use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::article::models::{ArticleStatus, SyncedArticle};
use crate::article::repositories::ArticleRepository;
use crate::map_sqlx_error;
use newsroom_common::error::{NewsroomError, NewsroomResult};

const ARTICLE_COLUMNS: &str = "id, account_id, external_id, title, summary, body, url, author,
     published_at, content_hash, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgArticleRepository {
    pool: PgPool,
}

impl PgArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> NewsroomResult<SyncedArticle> {
        let status: String = row.get("status");
        let status = status
            .parse::<ArticleStatus>()
            .map_err(NewsroomError::Internal)?;

        Ok(SyncedArticle {
            id: row.get("id"),
            account_id: row.get("account_id"),
            external_id: row.get("external_id"),
            title: row.get("title"),
            summary: row.get("summary"),
            body: row.get("body"),
            url: row.get("url"),
            author: row.get("author"),
            published_at: row.get("published_at"),
            content_hash: row.get("content_hash"),
            status,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn find_by_external_id(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> NewsroomResult<Option<SyncedArticle>> {
        let sql = format!(
            "select {ARTICLE_COLUMNS} from synced_articles
             where account_id = $1 and external_id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(account_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Self::map_row).transpose()
    }

    async fn insert(&self, article: &SyncedArticle) -> NewsroomResult<()> {
        sqlx::query(
            "insert into synced_articles
             (id, account_id, external_id, title, summary, body, url, author,
              published_at, content_hash, status, created_at, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(article.id)
        .bind(&article.account_id)
        .bind(&article.external_id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.body)
        .bind(&article.url)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(&article.content_hash)
        .bind(article.status.as_str())
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_if_changed(&self, article: &SyncedArticle) -> NewsroomResult<bool> {
        let result = sqlx::query(
            "update synced_articles set
               title = $3,
               summary = $4,
               body = $5,
               url = $6,
               author = $7,
               published_at = $8,
               content_hash = $9,
               status = $10,
               updated_at = now()
             where account_id = $1 and external_id = $2
               and content_hash is distinct from $9",
        )
        .bind(&article.account_id)
        .bind(&article.external_id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.body)
        .bind(&article.url)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(&article.content_hash)
        .bind(article.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, account_id: &str, external_id: &str) -> NewsroomResult<()> {
        // Clearing the hash makes the next usable payload count as an update.
        sqlx::query(
            "insert into synced_articles
             (id, account_id, external_id, title, content_hash, status)
             values ($1, $2, $3, '', '', 'failed')
             on conflict (account_id, external_id) do update set
               status = 'failed',
               content_hash = '',
               updated_at = now()
             where synced_articles.status <> 'failed'",
        )
        .bind(Uuid::new_v4())
        .bind(account_id)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn count_for_account(&self, account_id: &str) -> NewsroomResult<i64> {
        let row = sqlx::query("select count(*) as cnt from synced_articles where account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.get::<i64, _>("cnt"))
    }
}
