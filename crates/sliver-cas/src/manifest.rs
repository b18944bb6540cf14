//! Manifest building and serialization.
//!
//! A [`Manifest`] records how a file was chunked: the per-chunk checksums in
//! index order plus the whole-file checksum. It is serialized with postcard
//! and is all a joiner needs besides a way to fetch chunk bytes.

use std::sync::Arc;

use sliver_types::{Checksum, ChunkRecord, MANIFEST_VERSION, Manifest};

use crate::chunker::ChunkResult;
use crate::error::CasError;
use crate::joiner::{ChunkAccessor, ChunkDescriptor};

/// Accumulates [`ChunkRecord`]s from chunker output.
///
/// The final record's remainder becomes one more chunk when it is non-empty;
/// an empty remainder adds nothing.
#[derive(Debug)]
pub struct ManifestBuilder {
    chunk_size: u32,
    total_size: u64,
    chunks: Vec<ChunkRecord>,
    checksum: Option<Checksum>,
}

impl ManifestBuilder {
    /// Start a manifest for a file chunked with `chunk_size`.
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            total_size: 0,
            chunks: Vec::new(),
            checksum: None,
        }
    }

    /// Record one chunker result.
    ///
    /// Returns the record describing the bytes that should be persisted, if any.
    pub fn push(&mut self, result: &ChunkResult) -> Option<ChunkRecord> {
        let data = result.data();
        self.total_size += data.len() as u64;

        let record = match result {
            ChunkResult::Intermediate {
                index, checksum, ..
            } => ChunkRecord {
                index: *index,
                checksum: *checksum,
                size: data.len() as u64,
            },
            ChunkResult::Final { checksum, .. } => {
                self.checksum = Some(*checksum);
                if data.is_empty() {
                    return None;
                }
                ChunkRecord {
                    index: self.chunks.len() as u64,
                    checksum: Checksum::from_data(data),
                    size: data.len() as u64,
                }
            }
        };

        self.chunks.push(record);
        Some(record)
    }

    /// Finish the manifest.
    ///
    /// Fails with [`CasError::Truncated`] if no final record was pushed.
    pub fn build(self) -> Result<Manifest, CasError> {
        let checksum = self.checksum.ok_or(CasError::Truncated)?;
        Ok(build_manifest(
            &self.chunks,
            self.total_size,
            self.chunk_size,
            checksum,
        ))
    }
}

/// Build a [`Manifest`] from chunk records.
pub fn build_manifest(
    chunks: &[ChunkRecord],
    total_size: u64,
    chunk_size: u32,
    checksum: Checksum,
) -> Manifest {
    Manifest {
        version: MANIFEST_VERSION,
        total_size,
        chunk_size,
        checksum,
        chunks: chunks.to_vec(),
    }
}

/// Serialize a manifest to postcard bytes.
pub fn serialize_manifest(manifest: &Manifest) -> Result<Vec<u8>, CasError> {
    postcard::to_allocvec(manifest).map_err(|e| CasError::Serialization(e.to_string()))
}

/// Deserialize a manifest from postcard bytes.
///
/// Rejects manifests with unknown version numbers.
pub fn deserialize_manifest(bytes: &[u8]) -> Result<Manifest, CasError> {
    let manifest: Manifest =
        postcard::from_bytes(bytes).map_err(|e| CasError::Serialization(e.to_string()))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(CasError::UnsupportedVersion {
            found: manifest.version,
            supported: MANIFEST_VERSION,
        });
    }
    Ok(manifest)
}

/// Turn a manifest into joiner input, fetching every chunk through `accessor`.
pub fn descriptors(manifest: &Manifest, accessor: Arc<dyn ChunkAccessor>) -> Vec<ChunkDescriptor> {
    manifest
        .chunks
        .iter()
        .map(|record| ChunkDescriptor::new(record.index, record.checksum, accessor.clone()))
        .collect()
}
