pub mod article;
pub mod lock;

use newsroom_common::error::{NewsroomError, NewsroomResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> NewsroomResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| NewsroomError::Database(e.to_string()))
}

/// Classify a driver error.
///
/// Statement rejections are kept apart from connectivity failures so callers
/// can isolate a bad row without giving up on the store.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> NewsroomError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                NewsroomError::Conflict(db_err.message().to_owned())
            } else if db_err.is_check_violation()
                || db_err.is_foreign_key_violation()
                || matches!(db_err.kind(), sqlx::error::ErrorKind::NotNullViolation)
            {
                NewsroomError::Constraint(db_err.message().to_owned())
            } else {
                NewsroomError::Database(err.to_string())
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::Encode(_) => {
            NewsroomError::Constraint(err.to_string())
        }
        _ => NewsroomError::Database(err.to_string()),
    }
}
