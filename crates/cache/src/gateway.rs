//! Epoch-aware front for a [`StreamStore`].

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::debug,
};

use crate::{
    Result,
    store::StreamStore,
    types::{CacheRecord, StreamId},
};

/// Reads and writes resolved streams, treating only records stamped with the
/// configured epoch as valid.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn StreamStore>,
    epoch: DateTime<Utc>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn StreamStore>, epoch: DateTime<Utc>) -> Self {
        Self { store, epoch }
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Raw lookup, stale or not.
    pub async fn get(&self, id: &StreamId) -> Result<Option<CacheRecord>> {
        self.store.get(id).await
    }

    /// Lookup that hides records not stamped with the current epoch.
    pub async fn fresh(&self, id: &StreamId) -> Result<Option<CacheRecord>> {
        let record = self.store.get(id).await?;
        Ok(record.filter(|r| {
            let current = r.is_current(self.epoch);
            if !current {
                debug!(
                    stream_id = %id,
                    recorded_at = %r.recorded_at,
                    epoch = %self.epoch,
                    "cached stream is stale"
                );
            }
            current
        }))
    }

    pub async fn put(&self, record: &CacheRecord) -> Result<()> {
        self.store.put(record).await
    }

    /// Build a record stamped with the current epoch.
    pub fn stamp(
        &self,
        id: StreamId,
        manifest_url: String,
        subtitle_urls: Vec<String>,
    ) -> CacheRecord {
        CacheRecord {
            id,
            recorded_at: self.epoch,
            manifest_url,
            subtitle_urls,
        }
    }

    pub async fn purge(&self, id: &StreamId) -> Result<bool> {
        self.store.purge(id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count().await
    }
}
