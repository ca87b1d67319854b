//! In-memory store for tests and throwaway deployments.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    Result,
    store::StreamStore,
    types::{CacheRecord, StreamId},
};

/// `HashMap`-backed store. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStreamStore {
    records: Mutex<HashMap<StreamId, CacheRecord>>,
}

impl InMemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the async trait.
    pub fn insert(&self, record: CacheRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id.clone(), record);
    }

    pub fn snapshot(&self, id: &StreamId) -> Option<CacheRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StreamStore for InMemoryStreamStore {
    async fn get(&self, id: &StreamId) -> Result<Option<CacheRecord>> {
        Ok(self.snapshot(id))
    }

    async fn put(&self, record: &CacheRecord) -> Result<()> {
        self.insert(record.clone());
        Ok(())
    }

    async fn purge(&self, id: &StreamId) -> Result<bool> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(id).is_some())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
