//! Cache of resolved streams keyed by content identifier.
//!
//! Records are only served while their stamp equals the configured cache
//! epoch; bumping the epoch invalidates every entry at once. Backends:
//! SQLite (default), PostgREST/Supabase, and in-memory.

pub mod error;
pub mod gateway;
pub mod store;
pub mod store_memory;
pub mod store_postgrest;
pub mod store_sqlite;
pub mod types;

use std::sync::Arc;

use {
    snare_config::{CacheBackend, CacheConfig},
    tracing::info,
};

pub use {
    error::{Result, StoreError},
    gateway::CacheGateway,
    store::StreamStore,
    store_memory::InMemoryStreamStore,
    store_postgrest::PostgrestStreamStore,
    store_sqlite::SqliteStreamStore,
    types::{CacheRecord, StreamId},
};

/// Run database migrations for the `streams` table.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

/// Open the store selected by `config.backend`.
pub async fn open_store(config: &CacheConfig) -> Result<Arc<dyn StreamStore>> {
    let store: Arc<dyn StreamStore> = match config.backend {
        CacheBackend::Sqlite => {
            let url = match &config.sqlite.database_url {
                Some(url) => url.clone(),
                None => {
                    let dir = snare_config::data_dir();
                    std::fs::create_dir_all(&dir).map_err(|e| {
                        StoreError::message(format!("create {}: {e}", dir.display()))
                    })?;
                    format!("sqlite://{}?mode=rwc", dir.join("snare.db").display())
                },
            };
            Arc::new(SqliteStreamStore::new(&url).await?)
        },
        CacheBackend::Postgrest => Arc::new(PostgrestStreamStore::from_config(&config.postgrest)?),
        CacheBackend::Memory => Arc::new(InMemoryStreamStore::new()),
    };
    info!(backend = store.backend(), epoch = %config.epoch, "stream cache opened");
    Ok(store)
}

/// Open the configured store and wrap it with the configured epoch.
pub async fn open_gateway(config: &CacheConfig) -> Result<CacheGateway> {
    Ok(CacheGateway::new(open_store(config).await?, config.epoch))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_sqlite_file_from_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CacheConfig::default();
        config.sqlite.database_url = Some(format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("c.db").display()
        ));
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn postgrest_without_url_fails() {
        let config = CacheConfig {
            backend: CacheBackend::Postgrest,
            ..CacheConfig::default()
        };
        assert!(open_store(&config).await.is_err());
    }

    #[tokio::test]
    async fn gateway_carries_epoch() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            ..CacheConfig::default()
        };
        let gateway = open_gateway(&config).await.unwrap();
        assert_eq!(gateway.epoch(), config.epoch);
        assert_eq!(gateway.backend(), "memory");
    }
}
