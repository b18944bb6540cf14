//! `sliver`: split a file into checksummed chunks and join them back.
//!
//! # Usage
//!
//! ```text
//! sliver split big.iso -o ./chunks            # chunk with the configured size
//! sliver split big.iso -o ./chunks --chunk-size 65536
//! sliver join ./chunks -o restored.iso        # verify and reassemble
//! sliver verify ./chunks                      # verify without writing output
//! sliver -c sliver.toml benchmark -n 20 -s 1048576
//! ```

mod config;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use sliver_cas::{Chunker, JoinSummary, ManifestBuilder, descriptors, join_to_writer};
use sliver_store::{ChunkStore, FileStore, MemoryStore};
use sliver_types::Manifest;
use tracing::{error, info};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "sliver",
    version,
    about = "Split files into verified chunks and join them back"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a file into a directory of chunk files plus a manifest.
    Split {
        /// File to split.
        input: PathBuf,

        /// Directory receiving the chunks and the manifest.
        #[arg(short, long)]
        output: PathBuf,

        /// Override the configured chunk size (bytes).
        #[arg(long)]
        chunk_size: Option<u32>,
    },

    /// Reassemble a chunk directory, verifying every chunk and the whole file.
    Join {
        /// Directory written by `split`.
        dir: PathBuf,

        /// Destination file. Only created when the join verifies.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify a chunk directory without writing the file.
    Verify {
        /// Directory written by `split`.
        dir: PathBuf,
    },

    /// Run a quick split/join benchmark (in-memory).
    Benchmark {
        /// Number of files to split and join.
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Size of each file in bytes.
        #[arg(short, long, default_value = "4194304")]
        size: usize,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Split {
            input,
            output,
            chunk_size,
        } => {
            // CLI args override config file values.
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            let manifest = cmd_split(&config, &input, &output).await?;
            println!("{}", manifest.checksum);
            Ok(())
        }
        Commands::Join { dir, output } => {
            let summary = cmd_join(&dir, &output).await?;
            println!("{}", summary.checksum);
            Ok(())
        }
        Commands::Verify { dir } => {
            let summary = cmd_verify(&dir).await?;
            println!(
                "OK {} ({} chunks, {} bytes)",
                summary.checksum,
                summary.manifest.len(),
                summary.bytes_written
            );
            Ok(())
        }
        Commands::Benchmark { count, size } => cmd_benchmark(&config, count, size).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// -----------------------------------------------------------------------
// sliver split
// -----------------------------------------------------------------------

async fn cmd_split(config: &CliConfig, input: &Path, output: &Path) -> Result<Manifest> {
    let chunker = Chunker::new(config.chunking.chunk_size)
        .context("invalid chunk size")?
        .with_read_block_size(config.chunking.read_block_size);
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("failed to open {}", input.display()))?;
    let store = FileStore::new(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        chunk_size = chunker.chunk_size(),
        "splitting file"
    );

    let mut builder = ManifestBuilder::new(chunker.chunk_size());
    let mut chunks = chunker.chunk(file);
    while let Some(result) = chunks.next().await {
        let result = result.with_context(|| format!("failed to read {}", input.display()))?;
        if let Some(record) = builder.push(&result) {
            store
                .put(record.index, result.data().clone())
                .await
                .with_context(|| format!("failed to store chunk {}", record.index))?;
        }
    }

    let manifest = builder.build()?;
    store
        .write_manifest(&manifest)
        .await
        .context("failed to write manifest")?;

    info!(
        chunks = manifest.chunks.len(),
        size = manifest.total_size,
        checksum = %manifest.checksum,
        "split complete"
    );
    Ok(manifest)
}

// -----------------------------------------------------------------------
// sliver join / sliver verify
// -----------------------------------------------------------------------

async fn cmd_join(dir: &Path, output: &Path) -> Result<JoinSummary> {
    let (store, manifest) = open_chunk_dir(dir).await?;
    let partial = partial_path(output);

    let mut file = tokio::fs::File::create(&partial)
        .await
        .with_context(|| format!("failed to create {}", partial.display()))?;
    let joined = join_to_writer(
        manifest.checksum,
        descriptors(&manifest, store),
        &mut file,
    )
    .await;
    drop(file);

    let summary = match joined {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, output = %output.display(), "join failed, discarding output");
            discard_partial(&partial).await;
            return Err(e).with_context(|| format!("failed to join {}", dir.display()));
        }
    };

    if let Err(e) = tokio::fs::rename(&partial, output).await {
        error!(error = %e, output = %output.display(), "could not move output into place");
        discard_partial(&partial).await;
        return Err(e).with_context(|| format!("failed to move output into {}", output.display()));
    }

    info!(
        output = %output.display(),
        size = summary.bytes_written,
        checksum = %summary.checksum,
        "join complete"
    );
    Ok(summary)
}

async fn cmd_verify(dir: &Path) -> Result<JoinSummary> {
    let (store, manifest) = open_chunk_dir(dir).await?;
    let mut sink = tokio::io::sink();
    let summary = join_to_writer(manifest.checksum, descriptors(&manifest, store), &mut sink)
        .await
        .with_context(|| format!("verification of {} failed", dir.display()))?;

    if summary.bytes_written != manifest.total_size {
        bail!(
            "manifest records {} bytes but chunks hold {}",
            manifest.total_size,
            summary.bytes_written
        );
    }
    Ok(summary)
}

/// Open an existing chunk directory and load its manifest.
async fn open_chunk_dir(dir: &Path) -> Result<(Arc<FileStore>, Manifest)> {
    if !dir.is_dir() {
        bail!("chunk directory {} does not exist", dir.display());
    }
    let store = FileStore::new(dir)?;
    let manifest = store
        .read_manifest()
        .await
        .with_context(|| format!("failed to read manifest in {}", dir.display()))?;
    Ok((Arc::new(store), manifest))
}

/// Remove a staging file, logging rather than failing if that is impossible.
async fn discard_partial(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        error!(error = %e, path = %partial.display(), "failed to remove partial output");
    }
}

/// `<output>.partial`, the staging file a join writes before renaming.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

// -----------------------------------------------------------------------
// sliver benchmark
// -----------------------------------------------------------------------

async fn cmd_benchmark(config: &CliConfig, count: usize, size: usize) -> Result<()> {
    let chunker = Chunker::new(config.chunking.chunk_size)
        .context("invalid chunk size")?
        .with_read_block_size(config.chunking.read_block_size);

    println!("Sliver Benchmark");
    println!("  files:      {count}");
    println!("  size:       {size} bytes each");
    println!("  chunk_size: {}", chunker.chunk_size());
    println!();

    let data = generate_bench_data(size);
    let total_bytes = count as u64 * size as u64;
    let mut stores = Vec::with_capacity(count);

    // --- Split ---
    print!("Splitting {count} files... ");
    let start = Instant::now();
    for _ in 0..count {
        let store = Arc::new(MemoryStore::new(u64::MAX));
        let mut builder = ManifestBuilder::new(chunker.chunk_size());
        let mut chunks = chunker.chunk(std::io::Cursor::new(data.clone()));
        while let Some(result) = chunks.next().await {
            let result = result?;
            if let Some(record) = builder.push(&result) {
                store.put(record.index, result.data().clone()).await?;
            }
        }
        stores.push((store, builder.build()?));
    }
    let split_dur = start.elapsed();
    let split_mbs = total_bytes as f64 / split_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({split_mbs:.1} MB/s)", split_dur.as_secs_f64());

    // --- Join ---
    print!("Joining {count} files... ");
    let start = Instant::now();
    for (store, manifest) in stores {
        let mut sink = tokio::io::sink();
        join_to_writer(manifest.checksum, descriptors(&manifest, store), &mut sink).await?;
    }
    let join_dur = start.elapsed();
    let join_mbs = total_bytes as f64 / join_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({join_mbs:.1} MB/s)", join_dur.as_secs_f64());

    println!();
    println!("Summary:");
    println!("  Split throughput: {split_mbs:.1} MB/s");
    println!("  Join throughput:  {join_mbs:.1} MB/s");
    println!(
        "  Total data:       {:.1} MB",
        total_bytes as f64 / 1_048_576.0
    );

    Ok(())
}

/// Generate deterministic test data for benchmarking.
fn generate_bench_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}
