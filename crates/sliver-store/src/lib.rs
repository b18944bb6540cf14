//! Chunk storage trait and backend implementations.
//!
//! This crate defines the [`ChunkStore`] trait for persisting chunks by
//! index, along with two concrete backends:
//!
//! - [`MemoryStore`]: in-memory storage backed by a `RwLock<HashMap>`.
//! - [`FileStore`]: one file per chunk plus the file's manifest.
//!
//! Both backends implement [`sliver_cas::ChunkAccessor`], so a store can be
//! handed straight to the joiner.

mod error;
mod file_store;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::ChunkStore;
