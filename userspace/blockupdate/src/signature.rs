// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Block content fingerprinting against erase/target fill patterns
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (homogeneous, mixed, empty, up-to-date check)

use storage::{BlockDevice, BlockError};

use crate::config::UpdateConfig;
use crate::store::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Erased,
    Target,
    Unknown,
}

impl Fingerprint {
    /// Legacy signature word reported by earlier bootloader builds; diagnostics only.
    pub fn signature_word(self) -> u64 {
        match self {
            Fingerprint::Erased => 0xAAAA_AAAA,
            Fingerprint::Target => 0xBBBB_BBBB,
            Fingerprint::Unknown => 0x1_2345_6789,
        }
    }
}

/// Classifies block content. A single global target applies to every content block.
#[derive(Debug, Clone)]
pub struct Classifier {
    erase_fill: u8,
    target_fill: u8,
    width: usize,
}

impl Classifier {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            erase_fill: config.erase_fill,
            target_fill: config.target_fill,
            width: config.block_width,
        }
    }

    pub fn fingerprint(&self, content: &[u8]) -> Fingerprint {
        if content.is_empty() {
            Fingerprint::Unknown
        } else if content.iter().all(|&b| b == self.erase_fill) {
            Fingerprint::Erased
        } else if content.iter().all(|&b| b == self.target_fill) {
            Fingerprint::Target
        } else {
            Fingerprint::Unknown
        }
    }

    pub fn expected_signature(&self, _index: usize) -> Fingerprint {
        Fingerprint::Target
    }

    /// Content that gives block `index` its expected signature.
    pub fn target_content(&self, _index: usize) -> Vec<u8> {
        vec![self.target_fill; self.width]
    }

    pub fn is_up_to_date<D: BlockDevice>(
        &self,
        store: &BlockStore<D>,
        index: usize,
    ) -> Result<bool, BlockError> {
        let content = store.read(index)?;
        Ok(self.fingerprint(&content) == self.expected_signature(index))
    }
}
