//! SQLite-backed stream store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use crate::{
    Result,
    store::StreamStore,
    types::{CacheRecord, StreamId, StreamRow},
};

/// SQLite persistence for the `streams` table.
pub struct SqliteStreamStore {
    pool: SqlitePool,
}

impl SqliteStreamStore {
    /// Connect with a dedicated pool and run migrations.
    ///
    /// For a pool shared with other tables, call [`crate::run_migrations`]
    /// and use [`SqliteStreamStore::with_pool`].
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to `sqlite::memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;
        debug!(database_url, "sqlite stream store ready");

        Ok(Self { pool })
    }

    /// Use an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamStore for SqliteStreamStore {
    async fn get(&self, id: &StreamId) -> Result<Option<CacheRecord>> {
        let row = sqlx::query("SELECT id, date_time, stream, subtitle FROM streams WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let subtitle: Option<String> = row.get("subtitle");
        StreamRow {
            id: row.get("id"),
            date_time: row.get("date_time"),
            stream: row.get("stream"),
            subtitle: subtitle.as_deref().map(serde_json::from_str).transpose()?,
        }
        .into_record()
        .map(Some)
    }

    async fn put(&self, record: &CacheRecord) -> Result<()> {
        let row = StreamRow::from(record);
        let subtitle = serde_json::to_string(&row.subtitle.unwrap_or_default())?;
        sqlx::query(
            "INSERT INTO streams (id, date_time, stream, subtitle) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                date_time = excluded.date_time,
                stream = excluded.stream,
                subtitle = excluded.subtitle",
        )
        .bind(&row.id)
        .bind(&row.date_time)
        .bind(&row.stream)
        .bind(&subtitle)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge(&self, id: &StreamId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM streams WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM streams")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(row.get::<i64, _>("n")).unwrap_or_default())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
