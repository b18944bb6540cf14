//! Shared types for Sliver.
//!
//! This crate defines the integrity primitives used by both halves of the
//! pipeline: [`Checksum`] (a BLAKE3 digest rendered as hex),
//! [`RunningDigest`] (an incremental whole-file digest), and the persisted
//! [`Manifest`] with its per-chunk [`ChunkRecord`]s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: u8 = 1;

/// Length of a [`Checksum`] rendered as lowercase hex.
pub const CHECKSUM_HEX_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

/// A BLAKE3 digest over a run of bytes.
///
/// Displays as 64 lowercase hex characters and parses back from the same
/// form (upper-case hex is accepted).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Hash a complete byte slice in one step.
    pub fn from_data(data: &[u8]) -> Self {
        Self(blake3::hash(data).into())
    }

    /// Parse a checksum from its hex form.
    pub fn from_hex(hex: &str) -> Result<Self, ParseChecksumError> {
        if hex.len() != CHECKSUM_HEX_LEN {
            return Err(ParseChecksumError::Length(hex.len()));
        }
        let hash = blake3::Hash::from_hex(hex).map_err(|_| ParseChecksumError::InvalidHex)?;
        Ok(Self(hash.into()))
    }

    /// Render as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Checksum {
    type Err = ParseChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({self})")
    }
}

/// Errors from parsing a hex checksum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseChecksumError {
    /// Wrong number of characters.
    #[error("checksum must be {CHECKSUM_HEX_LEN} hex characters, got {0}")]
    Length(usize),

    /// Right length, but not hex.
    #[error("checksum contains non-hex characters")]
    InvalidHex,
}

/// Incremental digest over a stream of bytes.
///
/// Created once per chunk or join run, fed with [`update`](Self::update) as
/// bytes flow through, and consumed by [`finalize`](Self::finalize). Taking
/// `self` by value means a digest cannot be finalized twice or fed after
/// finalization.
#[derive(Debug, Clone, Default)]
pub struct RunningDigest {
    hasher: blake3::Hasher,
    len: u64,
}

impl RunningDigest {
    /// Start an empty digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes have been fed yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish the digest.
    pub fn finalize(self) -> Checksum {
        Checksum(self.hasher.finalize().into())
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Index, checksum and size of one chunk, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Position of the chunk in the original file, starting at 0.
    pub index: u64,
    /// Checksum of the chunk's bytes alone.
    pub checksum: Checksum,
    /// Chunk length in bytes.
    pub size: u64,
}

/// Persisted description of a chunked file.
///
/// Records everything a joiner needs besides the chunk bytes themselves:
/// which indices exist, what each one must hash to, and what the whole
/// file must hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version, checked on decode.
    pub version: u8,
    /// Total size of the original file in bytes.
    pub total_size: u64,
    /// Window size used when chunking (the last chunk may be smaller).
    pub chunk_size: u32,
    /// Checksum of the whole original file.
    pub checksum: Checksum,
    /// Per-chunk records, ascending by index.
    pub chunks: Vec<ChunkRecord>,
}
