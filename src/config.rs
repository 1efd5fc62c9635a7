//! Centralized configuration for the block store.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - StoreConfig::from_env() reads HF_* env vars; fluent setters override them.
//!
//! Defaults:
//! - block_size = 512 (every block of a file, header block included)
//! - cache_blocks = 64 (buffer pool frames per open file)
//! - data_fsync = false (close() writes dirty frames back without fsync)

use anyhow::Result;

use crate::consts::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::error::HashFileError;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Block size in bytes for newly created files. Existing files keep their own.
    /// Env: HF_BLOCK_SIZE (default 512)
    pub block_size: u32,

    /// Buffer pool capacity in frames (must be >= 1).
    /// Env: HF_CACHE_BLOCKS (default 64)
    pub cache_blocks: usize,

    /// Whether to fsync the data file when the store is closed.
    /// Env: HF_DATA_FSYNC (default false; "1|true|on|yes" => true)
    pub data_fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            data_fsync: false,
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("HF_BLOCK_SIZE") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.block_size = n;
            }
        }

        if let Ok(v) = std::env::var("HF_CACHE_BLOCKS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.cache_blocks = n;
            }
        }

        if let Ok(v) = std::env::var("HF_DATA_FSYNC") {
            let s = v.trim().to_ascii_lowercase();
            cfg.data_fsync = s == "1" || s == "true" || s == "on" || s == "yes";
        }

        cfg
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_cache_blocks(mut self, frames: usize) -> Self {
        self.cache_blocks = frames;
        self
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_block_size(self.block_size)?;
        validate_cache_blocks(self.cache_blocks)
    }
}

pub fn validate_cache_blocks(frames: usize) -> Result<()> {
    if frames == 0 {
        return Err(HashFileError::CapacityConfig("cache_blocks must be > 0".into()).into());
    }
    Ok(())
}

/// Размер блока: [64 .. 1 MiB]. Степень двойки не требуется.
pub fn validate_block_size(block_size: u32) -> Result<()> {
    if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(HashFileError::CapacityConfig(format!(
            "block_size must be in [{} .. {}], got {}",
            MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, block_size
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.block_size, 512);
        assert_eq!(cfg.cache_blocks, 64);
        assert!(!cfg.data_fsync);

        let cfg = cfg.with_block_size(256).with_cache_blocks(8).with_data_fsync(true);
        assert_eq!(cfg.block_size, 256);
        assert_eq!(cfg.cache_blocks, 8);
        assert!(cfg.data_fsync);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        assert!(StoreConfig::default().with_block_size(16).validate().is_err());
        assert!(StoreConfig::default()
            .with_block_size(MAX_BLOCK_SIZE + 1)
            .validate()
            .is_err());
        assert!(StoreConfig::default().with_cache_blocks(0).validate().is_err());
    }
}
