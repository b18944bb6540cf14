//! Streaming joiner: validated reassembly of a chunk set.
//!
//! [`join`] orders a set of [`ChunkDescriptor`]s by index, checks that the
//! indices form `0..count`, then fetches, verifies and emits each chunk in
//! turn. The whole-file checksum is checked last, after every chunk has
//! already been emitted.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sliver_types::{Checksum, ChunkRecord, RunningDigest};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{AccessError, CasError};

/// Lazy, single-pass sequence of joiner output.
pub type JoinStream = Pin<Box<dyn Stream<Item = Result<JoinResult, CasError>> + Send>>;

/// Source of a chunk's bytes.
///
/// `Ok(None)` means the chunk has no data available and surfaces as
/// [`CasError::MissingChunk`]. `Err` means the accessor itself failed and
/// surfaces as [`CasError::Access`].
#[async_trait::async_trait]
pub trait ChunkAccessor: Send + Sync {
    /// Fetch the bytes of the chunk at `index`.
    async fn fetch(&self, index: u64) -> Result<Option<Bytes>, AccessError>;
}

#[async_trait::async_trait]
impl ChunkAccessor for Bytes {
    async fn fetch(&self, _index: u64) -> Result<Option<Bytes>, AccessError> {
        Ok(Some(self.clone()))
    }
}

/// One entry of joiner input.
#[derive(Clone)]
pub struct ChunkDescriptor {
    /// Position of the chunk in the original file.
    pub index: u64,
    /// Checksum the chunk's bytes must hash to.
    pub checksum: Checksum,
    accessor: Arc<dyn ChunkAccessor>,
}

impl ChunkDescriptor {
    /// Describe a chunk whose bytes come from `accessor`.
    pub fn new(index: u64, checksum: Checksum, accessor: Arc<dyn ChunkAccessor>) -> Self {
        Self {
            index,
            checksum,
            accessor,
        }
    }

    /// Describe a chunk whose bytes are already in memory.
    pub fn from_bytes(index: u64, checksum: Checksum, data: Bytes) -> Self {
        Self::new(index, checksum, Arc::new(data))
    }
}

impl fmt::Debug for ChunkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkDescriptor")
            .field("index", &self.index)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// One record produced by the joiner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResult {
    /// A verified chunk, in ascending index order.
    Intermediate {
        /// The chunk's bytes.
        data: Bytes,
        /// Checksum of `data`.
        checksum: Checksum,
    },
    /// The terminal record, emitted only when the whole file verified.
    Final {
        /// Checksum of the reassembled file.
        checksum: Checksum,
        /// Every emitted chunk, in emission order.
        manifest: Vec<ChunkRecord>,
    },
}

/// Outcome of [`join_to_writer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSummary {
    /// Checksum of the reassembled file.
    pub checksum: Checksum,
    /// Total bytes written to the sink.
    pub bytes_written: u64,
    /// Every chunk written, in order.
    pub manifest: Vec<ChunkRecord>,
}

/// Join a chunk set, verifying each chunk and then the whole file.
///
/// The first item is an [`CasError::InvalidChunk`] error if the indices do
/// not form `0..count`. Otherwise the stream yields one
/// [`JoinResult::Intermediate`] per chunk and ends with
/// [`JoinResult::Final`], or with the first error encountered. A whole-file
/// mismatch is only reported after every chunk has been emitted.
pub fn join(expected: Checksum, chunks: Vec<ChunkDescriptor>) -> JoinStream {
    let stream = async_stream::try_stream! {
        let chunks = order_chunks(chunks)?;
        let mut digest = RunningDigest::new();
        let mut manifest = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let index = chunk.index;
            let data = chunk
                .accessor
                .fetch(index)
                .await
                .map_err(|source| CasError::Access { index, source })?
                .ok_or(CasError::MissingChunk { index })?;
            let checksum = verify_chunk(index, chunk.checksum, &data)?;

            digest.update(&data);
            manifest.push(ChunkRecord {
                index,
                checksum,
                size: data.len() as u64,
            });

            debug!(index, size = data.len(), %checksum, "joined chunk");
            yield JoinResult::Intermediate { data, checksum };
        }

        let checksum = verify_file(expected, digest)?;
        debug!(chunks = manifest.len(), %checksum, "join finished");
        yield JoinResult::Final { checksum, manifest };
    };

    Box::pin(stream)
}

/// Join a chunk set straight into `writer`.
///
/// Bytes are written as each chunk verifies, so on error the writer may
/// already hold a prefix of the file. Callers that must not expose partial
/// output should write to a staging location and discard it on error.
pub async fn join_to_writer<W>(
    expected: Checksum,
    chunks: Vec<ChunkDescriptor>,
    writer: &mut W,
) -> Result<JoinSummary, CasError>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = join(expected, chunks);
    let mut bytes_written = 0u64;

    while let Some(result) = stream.next().await {
        match result? {
            JoinResult::Intermediate { data, .. } => {
                writer.write_all(&data).await?;
                bytes_written += data.len() as u64;
            }
            JoinResult::Final { checksum, manifest } => {
                writer.flush().await?;
                return Ok(JoinSummary {
                    checksum,
                    bytes_written,
                    manifest,
                });
            }
        }
    }

    Err(CasError::Truncated)
}

/// Sort by index and check the indices are exactly `0..count`.
fn order_chunks(mut chunks: Vec<ChunkDescriptor>) -> Result<Vec<ChunkDescriptor>, CasError> {
    chunks.sort_by_key(|c| c.index);
    for (position, chunk) in chunks.iter().enumerate() {
        let expected = position as u64;
        if chunk.index != expected {
            warn!(expected, found = chunk.index, "chunk set is not contiguous");
            return Err(CasError::InvalidChunk {
                expected,
                found: chunk.index,
            });
        }
    }
    Ok(chunks)
}

fn verify_chunk(index: u64, expected: Checksum, data: &[u8]) -> Result<Checksum, CasError> {
    let actual = Checksum::from_data(data);
    if actual != expected {
        warn!(index, %expected, %actual, "chunk checksum mismatch");
        return Err(CasError::InvalidChecksum {
            index,
            expected,
            actual,
        });
    }
    Ok(actual)
}

fn verify_file(expected: Checksum, digest: RunningDigest) -> Result<Checksum, CasError> {
    let actual = digest.finalize();
    if actual != expected {
        warn!(%expected, %actual, "file checksum mismatch");
        return Err(CasError::InvalidFinalChecksum { expected, actual });
    }
    Ok(actual)
}
