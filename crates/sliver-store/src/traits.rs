//! Core trait for chunk storage.

use bytes::Bytes;
use sliver_types::Checksum;

use crate::error::StoreError;

/// Trait for storing and retrieving chunks by index.
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Data is passed as [`Bytes`] so chunks move through without copying.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store a chunk at the given index, replacing any previous one.
    async fn put(&self, index: u64, data: Bytes) -> Result<(), StoreError>;

    /// Retrieve a chunk by index. Returns `None` if not found.
    async fn get(&self, index: u64) -> Result<Option<Bytes>, StoreError>;

    /// Delete a chunk by index.
    async fn delete(&self, index: u64) -> Result<(), StoreError>;

    /// Check whether a chunk exists.
    async fn contains(&self, index: u64) -> Result<bool, StoreError>;

    /// List stored chunk indices in ascending order.
    async fn list(&self) -> Result<Vec<u64>, StoreError>;

    /// Re-hash a stored chunk and compare it to `checksum`.
    async fn verify(&self, index: u64, checksum: &Checksum) -> Result<bool, StoreError>;
}
