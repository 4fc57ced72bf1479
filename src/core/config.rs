//! Driver configuration
//!
//! ```toml
//! volume_count = 1
//! max_open_files = 4
//! size_scratch_len = 512
//! ```

use crate::error::{EwfsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_VOLUME_COUNT: u8 = 1;
pub const DEFAULT_MAX_OPEN_FILES: usize = 4;
pub const DEFAULT_SIZE_SCRATCH_LEN: usize = 512;

/// Largest table the 16-bit slot field can address
pub const MAX_OPEN_FILES_LIMIT: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EwfsConfig {
    /// Disk ids `0..volume_count` may be mounted
    pub volume_count: u8,

    /// Capacity of the open-file table
    pub max_open_files: usize,

    /// Scratch buffer used to size generated files on open
    pub size_scratch_len: usize,
}

impl Default for EwfsConfig {
    fn default() -> Self {
        EwfsConfig {
            volume_count: DEFAULT_VOLUME_COUNT,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            size_scratch_len: DEFAULT_SIZE_SCRATCH_LEN,
        }
    }
}

impl EwfsConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EwfsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volume_count == 0 {
            return Err(EwfsError::Config("volume_count must be at least 1".into()));
        }
        if self.max_open_files == 0 || self.max_open_files > MAX_OPEN_FILES_LIMIT {
            return Err(EwfsError::Config(format!(
                "max_open_files must be within 1..={}, got {}",
                MAX_OPEN_FILES_LIMIT, self.max_open_files
            )));
        }
        if self.size_scratch_len < 2 {
            return Err(EwfsError::Config(format!(
                "size_scratch_len must be at least 2, got {}",
                self.size_scratch_len
            )));
        }
        Ok(())
    }

    pub fn is_valid_disk(&self, disk_id: u8) -> bool {
        disk_id < self.volume_count
    }
}
