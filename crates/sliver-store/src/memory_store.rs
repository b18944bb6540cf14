//! In-memory chunk storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use sliver_cas::{AccessError, ChunkAccessor};
use sliver_types::Checksum;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ChunkStore;

/// In-memory chunk store backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for benchmarks that should not touch disk.
/// Tracks total bytes stored against a configurable maximum.
pub struct MemoryStore {
    chunks: RwLock<HashMap<u64, Bytes>>,
    max_bytes: u64,
}

impl MemoryStore {
    /// Create a new in-memory store with the given capacity limit.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            max_bytes,
        }
    }

    /// Bytes currently stored.
    pub fn used_bytes(&self) -> u64 {
        let map = self.chunks.read().expect("lock poisoned");
        Self::used_bytes_unlocked(&map)
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<u64, Bytes>> {
        &self.chunks
    }

    fn used_bytes_unlocked(map: &HashMap<u64, Bytes>) -> u64 {
        map.values().map(|v| v.len() as u64).sum()
    }
}

#[async_trait::async_trait]
impl ChunkStore for MemoryStore {
    async fn put(&self, index: u64, data: Bytes) -> Result<(), StoreError> {
        let mut map = self.chunks.write().expect("lock poisoned");
        let used = Self::used_bytes_unlocked(&map);
        let data_len = data.len() as u64;

        // If we're replacing an existing chunk, account for freed space.
        let existing_len = map.get(&index).map_or(0, |v| v.len() as u64);
        let net_increase = data_len.saturating_sub(existing_len);

        if used + net_increase > self.max_bytes {
            return Err(StoreError::CapacityExceeded {
                needed: net_increase,
                available: self.max_bytes.saturating_sub(used),
            });
        }

        debug!(index, size = data.len(), "storing chunk in memory");
        map.insert(index, data);
        Ok(())
    }

    async fn get(&self, index: u64) -> Result<Option<Bytes>, StoreError> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.get(&index).cloned())
    }

    async fn delete(&self, index: u64) -> Result<(), StoreError> {
        let mut map = self.chunks.write().expect("lock poisoned");
        map.remove(&index);
        debug!(index, "deleted chunk from memory");
        Ok(())
    }

    async fn contains(&self, index: u64) -> Result<bool, StoreError> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.contains_key(&index))
    }

    async fn list(&self) -> Result<Vec<u64>, StoreError> {
        let map = self.chunks.read().expect("lock poisoned");
        let mut indices: Vec<u64> = map.keys().copied().collect();
        indices.sort_unstable();
        Ok(indices)
    }

    async fn verify(&self, index: u64, checksum: &Checksum) -> Result<bool, StoreError> {
        let map = self.chunks.read().expect("lock poisoned");
        match map.get(&index) {
            Some(data) => Ok(Checksum::from_data(data) == *checksum),
            None => Err(StoreError::NotFound(index)),
        }
    }
}

#[async_trait::async_trait]
impl ChunkAccessor for MemoryStore {
    async fn fetch(&self, index: u64) -> Result<Option<Bytes>, AccessError> {
        Ok(self.get(index).await?)
    }
}
