//! Error types for chunking and joining.

use sliver_types::Checksum;

/// Boxed error returned by a [`ChunkAccessor`](crate::ChunkAccessor) that
/// failed outright (as opposed to reporting that it has no data).
pub type AccessError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while chunking or joining.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// The chunker was configured with a zero window.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// The chunk set does not form the contiguous range `0..count`.
    ///
    /// Raised before any bytes are emitted.
    #[error("chunk set is not contiguous: expected index {expected}, found {found}")]
    InvalidChunk {
        /// Index that should occupy this position.
        expected: u64,
        /// Index actually found there.
        found: u64,
    },

    /// A chunk's accessor reported that it has no data.
    #[error("chunk {index} is missing")]
    MissingChunk {
        /// Index of the missing chunk.
        index: u64,
    },

    /// A chunk's bytes do not hash to its declared checksum.
    #[error("chunk {index} checksum mismatch: expected {expected}, got {actual}")]
    InvalidChecksum {
        /// Index of the corrupt chunk.
        index: u64,
        /// Checksum declared by the descriptor.
        expected: Checksum,
        /// Checksum computed over the retrieved bytes.
        actual: Checksum,
    },

    /// Every chunk verified, but the reassembled file does not.
    #[error("file checksum mismatch: expected {expected}, got {actual}")]
    InvalidFinalChecksum {
        /// Checksum the caller expected for the whole file.
        expected: Checksum,
        /// Checksum computed over the reassembled bytes.
        actual: Checksum,
    },

    /// A chunk's accessor failed while fetching.
    #[error("failed to fetch chunk {index}: {source}")]
    Access {
        /// Index being fetched.
        index: u64,
        /// Underlying accessor error.
        #[source]
        source: AccessError,
    },

    /// A result stream ended without its final record.
    #[error("stream ended without a final record")]
    Truncated,

    /// An I/O error occurred while reading the source or writing output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Manifest has an unsupported version.
    #[error("unsupported manifest version {found}, this build supports version {supported}")]
    UnsupportedVersion {
        /// Version found in the manifest.
        found: u8,
        /// Version this build supports.
        supported: u8,
    },
}
