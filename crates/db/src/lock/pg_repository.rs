use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::lock::models::LockRecord;
use crate::lock::repositories::LockRepository;
use crate::map_sqlx_error;
use newsroom_common::error::NewsroomResult;

#[derive(Clone)]
pub struct PgLockRepository {
    pool: PgPool,
}

impl PgLockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> LockRecord {
        LockRecord {
            key: row.get("lock_key"),
            holder_id: row.get("holder_id"),
            expires_at: row.get("expire_time"),
            created_at: row.get("created_at"),
        }
    }
}

fn ttl_secs(ttl: Duration) -> f64 {
    ttl.as_secs_f64()
}

#[async_trait]
impl LockRepository for PgLockRepository {
    async fn upsert_if_expired(
        &self,
        key: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> NewsroomResult<()> {
        // The `where` on the conflict arm is the compare-and-swap: a live row
        // keeps its holder.
        sqlx::query(
            "insert into sync_locks (lock_key, holder_id, expire_time, created_at)
             values ($1, $2, now() + make_interval(secs => $3), now())
             on conflict (lock_key) do update set
               holder_id = excluded.holder_id,
               expire_time = excluded.expire_time
             where sync_locks.expire_time <= now()",
        )
        .bind(key)
        .bind(holder_id)
        .bind(ttl_secs(ttl))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> NewsroomResult<Option<LockRecord>> {
        let row = sqlx::query(
            "select lock_key, holder_id, expire_time, created_at
             from sync_locks
             where lock_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Self::map_row))
    }

    async fn is_held(&self, key: &str) -> NewsroomResult<bool> {
        let row = sqlx::query(
            "select exists(
               select 1 from sync_locks where lock_key = $1 and expire_time > now()
             ) as held",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.get::<bool, _>("held"))
    }

    async fn extend_if_holder(
        &self,
        key: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> NewsroomResult<bool> {
        let result = sqlx::query(
            "update sync_locks
             set expire_time = now() + make_interval(secs => $3)
             where lock_key = $1 and holder_id = $2 and expire_time > now()",
        )
        .bind(key)
        .bind(holder_id)
        .bind(ttl_secs(ttl))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_holder(&self, key: &str, holder_id: &str) -> NewsroomResult<bool> {
        let result = sqlx::query("delete from sync_locks where lock_key = $1 and holder_id = $2")
            .bind(key)
            .bind(holder_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
