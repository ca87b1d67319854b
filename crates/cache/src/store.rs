//! Persistence trait for resolved streams.

use async_trait::async_trait;

use crate::{
    Result,
    types::{CacheRecord, StreamId},
};

/// Keyed storage for [`CacheRecord`]s.
///
/// `get` returns `Ok(None)` for a missing key; errors always mean the backend
/// itself failed. `put` is an upsert by id, last write wins.
#[async_trait]
pub trait StreamStore: Send + Sync {
    async fn get(&self, id: &StreamId) -> Result<Option<CacheRecord>>;
    async fn put(&self, record: &CacheRecord) -> Result<()>;
    /// Remove one record. Returns whether anything was deleted.
    async fn purge(&self, id: &StreamId) -> Result<bool>;
    async fn count(&self) -> Result<u64>;
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
