// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Update layout and retry configuration (TOML)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (defaults, overrides, validation, unknown keys)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::spare::HEADER_LEN;

/// Fixed-at-construction parameters of an update run.
///
/// Fill bytes are plain integers in TOML (`erase_fill = 0x41`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateConfig {
    /// Bytes per block, spare block included.
    pub block_width: usize,
    /// Number of content blocks; the spare block sits at index `block_count`.
    pub block_count: usize,
    /// Extra attempts after the first one, per stage.
    pub retry_budget: u8,
    pub erase_fill: u8,
    pub target_fill: u8,
    /// Padding for writes shorter than a block.
    pub pad_fill: u8,
    /// Payload pattern restored after a crash lost the checkpoint; defaults to `erase_fill`.
    pub idle_fill: Option<u8>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            block_width: 100,
            block_count: 10,
            retry_budget: 3,
            erase_fill: b'A',
            target_fill: b'B',
            pad_fill: b'0',
            idle_fill: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl UpdateConfig {
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_count == 0 {
            return Err(ConfigError::Invalid("block_count must be at least 1"));
        }
        if self.block_width <= HEADER_LEN {
            return Err(ConfigError::Invalid("block_width must exceed the progress header"));
        }
        if u32::try_from(self.block_count).is_err() {
            return Err(ConfigError::Invalid("block_count does not fit the progress header"));
        }
        if self.retry_budget == 0 {
            return Err(ConfigError::Invalid("retry_budget must be at least 1"));
        }
        if self.erase_fill == self.target_fill {
            return Err(ConfigError::Invalid("erase_fill and target_fill must differ"));
        }
        Ok(())
    }

    pub fn idle_fill(&self) -> u8 {
        self.idle_fill.unwrap_or(self.erase_fill)
    }

    /// Index of the spare block.
    pub fn spare_index(&self) -> usize {
        self.block_count
    }

    /// Device blocks needed: content blocks plus the spare.
    pub fn device_blocks(&self) -> u64 {
        self.block_count as u64 + 1
    }
}
