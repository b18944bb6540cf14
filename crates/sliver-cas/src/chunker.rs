//! Fixed-size streaming chunker.
//!
//! A [`Chunker`] consumes a byte source once and produces a lazy sequence of
//! [`ChunkResult`]s: one [`ChunkResult::Intermediate`] per full window, then
//! exactly one [`ChunkResult::Final`] carrying the leftover bytes and the
//! checksum of everything read.

use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use sliver_types::{Checksum, RunningDigest};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::CasError;

/// Default number of bytes requested from the source per read.
pub const DEFAULT_READ_BLOCK_SIZE: usize = 64 * 1024;

/// Largest read block a [`Chunker`] will request from a reader.
pub const MAX_READ_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Lazy, single-pass sequence of chunker output.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkResult, CasError>> + Send>>;

/// One record produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    /// A full window of exactly `chunk_size` bytes.
    Intermediate {
        /// Position of this window, starting at 0.
        index: u64,
        /// The window's bytes.
        data: Bytes,
        /// Checksum of `data` alone.
        checksum: Checksum,
    },
    /// The terminal record, always emitted last and exactly once.
    Final {
        /// Bytes left after the last full window (`0..chunk_size`).
        data: Bytes,
        /// Checksum of the whole source.
        checksum: Checksum,
    },
}

impl ChunkResult {
    /// The bytes carried by this record.
    pub fn data(&self) -> &Bytes {
        match self {
            Self::Intermediate { data, .. } | Self::Final { data, .. } => data,
        }
    }

    /// Whether this is the terminal record.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}

/// Fixed-size chunker that splits a byte source into windows of a configured size.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: u32,
    read_block_size: usize,
}

impl Chunker {
    /// Create a new chunker with the given window size in bytes.
    ///
    /// Returns [`CasError::InvalidChunkSize`] for a zero size.
    pub fn new(chunk_size: u32) -> Result<Self, CasError> {
        if chunk_size == 0 {
            return Err(CasError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
        })
    }

    /// Set how many bytes are requested from a reader per read call.
    ///
    /// Clamped to `1..=MAX_READ_BLOCK_SIZE`.
    pub fn with_read_block_size(mut self, read_block_size: usize) -> Self {
        self.read_block_size = read_block_size.clamp(1, MAX_READ_BLOCK_SIZE);
        self
    }

    /// Window size in bytes.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Chunk an in-memory buffer.
    ///
    /// Produces the same records as [`chunk`](Self::chunk) would for a reader
    /// over `data`.
    pub fn chunk_bytes(&self, data: &[u8]) -> Vec<ChunkResult> {
        let mut window = Window::new(self.chunk_size as usize);
        let mut results = Vec::with_capacity(data.len() / self.chunk_size as usize + 1);

        window.observe(data);
        let mut rest = data;
        while !rest.is_empty() {
            let (cut, tail) = window.fill(rest);
            rest = tail;
            results.extend(cut);
        }
        results.push(window.finish());
        results
    }

    /// Chunk an async reader.
    ///
    /// The reader is moved into the returned stream and dropped as soon as it
    /// reports end of input or an error, or when the stream itself is dropped.
    pub fn chunk<R>(&self, reader: R) -> ChunkStream
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.chunk_blocks(read_blocks(reader, self.read_block_size))
    }

    /// Chunk a stream of byte blocks of arbitrary size.
    ///
    /// An `Err` block ends the sequence with [`CasError::Io`] and no final record.
    pub fn chunk_blocks<S>(&self, blocks: S) -> ChunkStream
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let mut window = Window::new(self.chunk_size as usize);

        let stream = async_stream::try_stream! {
            let mut blocks = Box::pin(blocks);
            while let Some(block) = blocks.next().await {
                let block = block?;

                window.observe(&block);
                let mut rest = &block[..];
                while !rest.is_empty() {
                    let (cut, tail) = window.fill(rest);
                    rest = tail;
                    if let Some(chunk) = cut {
                        yield chunk;
                    }
                }
            }

            drop(blocks);
            yield window.finish();
        };

        Box::pin(stream)
    }
}

/// Turn a reader into a stream of blocks of at most `block_size` bytes.
///
/// The reader lives in the stream's state and is dropped on end of input or
/// on the first error, before that error is handed to the consumer.
fn read_blocks<R>(
    reader: R,
    block_size: usize,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buf = BytesMut::with_capacity(block_size);
        match reader.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some(reader))),
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Accumulation state for a single chunking run.
///
/// The buffer never holds more than `chunk_size` bytes: incoming blocks are
/// copied in only up to the window boundary, and a full window is cut before
/// anything else is appended.
struct Window {
    buf: BytesMut,
    chunk_size: usize,
    next_index: u64,
    digest: RunningDigest,
}

impl Window {
    fn new(chunk_size: usize) -> Self {
        Self {
            // Grows with the data actually read, never past `chunk_size`.
            buf: BytesMut::new(),
            chunk_size,
            next_index: 0,
            digest: RunningDigest::new(),
        }
    }

    /// Feed a freshly read block into the whole-source digest.
    fn observe(&mut self, block: &[u8]) {
        self.digest.update(block);
    }

    /// Append as much of `block` as fits in the current window.
    ///
    /// Returns the window if it is now full, plus whatever of `block` did not fit.
    fn fill<'a>(&mut self, block: &'a [u8]) -> (Option<ChunkResult>, &'a [u8]) {
        let room = self.chunk_size - self.buf.len();
        let (head, tail) = block.split_at(room.min(block.len()));
        self.buf.extend_from_slice(head);

        if self.buf.len() < self.chunk_size {
            return (None, tail);
        }

        let data = self.buf.split_to(self.chunk_size).freeze();
        let checksum = Checksum::from_data(&data);
        let index = self.next_index;
        self.next_index += 1;

        debug!(index, size = data.len(), %checksum, "cut chunk");
        (
            Some(ChunkResult::Intermediate {
                index,
                data,
                checksum,
            }),
            tail,
        )
    }

    fn finish(self) -> ChunkResult {
        let total = self.digest.len();
        let checksum = self.digest.finalize();
        let data = self.buf.freeze();

        debug!(
            chunks = self.next_index,
            remainder = data.len(),
            total,
            %checksum,
            "chunking finished"
        );
        ChunkResult::Final { data, checksum }
    }
}
