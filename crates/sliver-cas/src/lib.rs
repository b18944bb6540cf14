//! Chunking, joining, and manifest building.
//!
//! This crate provides:
//! - [`Chunker`]: splits a byte source into fixed-size windows, each with its
//!   own BLAKE3 checksum, and reports the checksum of the whole source.
//! - [`join`]: reassembles a chunk set, verifying every chunk and then the
//!   whole file.
//! - [`ManifestBuilder`] / [`serialize_manifest`]: persist what a join needs.

mod chunker;
mod error;
mod joiner;
mod manifest;


pub use chunker::{
    ChunkResult, ChunkStream, Chunker, DEFAULT_READ_BLOCK_SIZE, MAX_READ_BLOCK_SIZE,
};
pub use error::{AccessError, CasError};
pub use joiner::{
    ChunkAccessor, ChunkDescriptor, JoinResult, JoinStream, JoinSummary, join, join_to_writer,
};
pub use manifest::{
    ManifestBuilder, build_manifest, descriptors, deserialize_manifest, serialize_manifest,
};
