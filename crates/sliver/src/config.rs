//! TOML configuration for the `sliver` tool.
//!
//! Every section is optional; a missing file yields the defaults.

use std::path::Path;

use anyhow::bail;
use serde::Deserialize;
use sliver_cas::MAX_READ_BLOCK_SIZE;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Chunking parameters.
    pub chunking: ChunkingSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[chunking]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    /// Size of every chunk except the last, in bytes.
    pub chunk_size: u32,
    /// Bytes requested from the source per read.
    pub read_block_size: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            chunk_size: 1_048_576,
            read_block_size: sliver_cas::DEFAULT_READ_BLOCK_SIZE,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                config.validate()?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: CliConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the chunker cannot run with.
    fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("[chunking] chunk_size must be greater than zero");
        }
        let block = self.chunking.read_block_size;
        if block == 0 || block > MAX_READ_BLOCK_SIZE {
            bail!("[chunking] read_block_size must be between 1 and {MAX_READ_BLOCK_SIZE}, got {block}");
        }
        Ok(())
    }
}
