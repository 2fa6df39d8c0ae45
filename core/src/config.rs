// Engine configuration
// Loaded from JSON; every field has a default so partial documents are accepted.

use crate::StrataError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SECTOR_SIZE: u32 = 512;
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;
pub const DEFAULT_DETECTION_SECTORS: u32 = 64;

/// Settings for a [`BlockCacheStream`](crate::stream::BlockCacheStream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockCacheSettings {
    /// Size of each cached page. Must be a power of two.
    pub block_size: u32,
    /// Total bytes of page data the cache may hold.
    pub read_cache_size: u64,
    /// Reads at least this large bypass the cache.
    pub large_read_size: u64,
}

impl Default for BlockCacheSettings {
    fn default() -> Self {
        Self {
            block_size: 4096,
            read_cache_size: 4 * 1024 * 1024,
            large_read_size: 64 * 1024,
        }
    }
}

impl BlockCacheSettings {
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(StrataError::Configuration(format!(
                "cache block size {} is not a power of two",
                self.block_size
            )));
        }
        if self.read_cache_size < self.block_size as u64 {
            return Err(StrataError::Configuration(format!(
                "read cache size {} cannot hold a single {} byte block",
                self.read_cache_size, self.block_size
            )));
        }
        Ok(())
    }

    /// Number of pages the configured budget allows.
    pub fn capacity_blocks(&self) -> usize {
        (self.read_cache_size / self.block_size.max(1) as u64) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sector_size: u32,
    /// Upper bound on differencing-chain traversal.
    pub max_chain_depth: usize,
    /// Leading sectors handed to partition-table validators.
    pub detection_sectors: u32,
    pub case_sensitive_paths: bool,
    pub block_cache: BlockCacheSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            detection_sectors: DEFAULT_DETECTION_SECTORS,
            case_sensitive_paths: false,
            block_cache: BlockCacheSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, StrataError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, StrataError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, StrataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if self.sector_size < 512 || !self.sector_size.is_power_of_two() {
            return Err(StrataError::Configuration(format!(
                "sector size {} must be a power of two of at least 512",
                self.sector_size
            )));
        }
        if self.max_chain_depth == 0 {
            return Err(StrataError::Configuration(
                "max_chain_depth must be at least 1".to_string(),
            ));
        }
        if self.detection_sectors == 0 {
            return Err(StrataError::Configuration(
                "detection_sectors must be at least 1".to_string(),
            ));
        }
        self.block_cache.validate()
    }

    /// Bytes of leading disk content handed to partition validators.
    pub fn detection_bytes(&self) -> u64 {
        self.detection_sectors as u64 * self.sector_size as u64
    }
}
