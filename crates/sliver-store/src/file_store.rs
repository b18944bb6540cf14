//! File-based chunk storage backend.
//!
//! Stores one file per chunk plus the manifest of the chunked file:
//! `{base_dir}/{index:016x}.chunk` and `{base_dir}/manifest`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use sliver_cas::{AccessError, ChunkAccessor, deserialize_manifest, serialize_manifest};
use sliver_types::{Checksum, Manifest};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::ChunkStore;

const CHUNK_EXTENSION: &str = "chunk";
const MANIFEST_FILE: &str = "manifest";

/// File-based chunk store holding a single chunked file.
///
/// Writes are atomic: data is written to a temporary file first, then
/// renamed into place, so a crash never leaves a half-written chunk.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Persist the manifest next to the chunks.
    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let bytes = serialize_manifest(manifest)?;
        let path = self.base_dir.join(MANIFEST_FILE);
        write_atomic(&path, &bytes).await?;
        debug!(path = %path.display(), chunks = manifest.chunks.len(), "wrote manifest");
        Ok(())
    }

    /// Load the manifest written by [`write_manifest`](Self::write_manifest).
    pub async fn read_manifest(&self) -> Result<Manifest, StoreError> {
        let bytes = tokio::fs::read(self.base_dir.join(MANIFEST_FILE)).await?;
        Ok(deserialize_manifest(&bytes)?)
    }

    /// Compute the full file path for a chunk index.
    fn chunk_path(&self, index: u64) -> PathBuf {
        self.base_dir
            .join(format!("{index:016x}"))
            .with_extension(CHUNK_EXTENSION)
    }
}

#[async_trait::async_trait]
impl ChunkStore for FileStore {
    async fn put(&self, index: u64, data: Bytes) -> Result<(), StoreError> {
        let path = self.chunk_path(index);
        write_atomic(&path, &data).await?;
        debug!(index, path = %path.display(), size = data.len(), "stored chunk to file");
        Ok(())
    }

    async fn get(&self, index: u64) -> Result<Option<Bytes>, StoreError> {
        match tokio::fs::read(self.chunk_path(index)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn delete(&self, index: u64) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.chunk_path(index)).await {
            Ok(()) => {
                debug!(index, "deleted chunk file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn contains(&self, index: u64) -> Result<bool, StoreError> {
        match tokio::fs::metadata(self.chunk_path(index)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<u64>, StoreError> {
        let mut indices = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(index) = u64::from_str_radix(stem, 16)
            {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    async fn verify(&self, index: u64, checksum: &Checksum) -> Result<bool, StoreError> {
        match tokio::fs::read(self.chunk_path(index)).await {
            Ok(data) => {
                let actual = Checksum::from_data(&data);
                if actual != *checksum {
                    warn!(index, expected = %checksum, %actual, "chunk file does not match checksum");
                }
                Ok(actual == *checksum)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(index)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[async_trait::async_trait]
impl ChunkAccessor for FileStore {
    async fn fetch(&self, index: u64) -> Result<Option<Bytes>, AccessError> {
        Ok(self.get(index).await?)
    }
}

/// Write to a temp file in the same directory, then rename into place.
async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await
}
