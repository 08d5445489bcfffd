// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Bounded block store over N content blocks plus the spare block
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (pad/truncate, erase, range checks, geometry)

use log::trace;
use storage::{BlockDevice, BlockError};

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};

/// Valid indices are `0..content_blocks` plus the spare at `content_blocks`.
/// Range checks happen before the device is touched.
pub struct BlockStore<D> {
    device: D,
    content_blocks: usize,
    width: usize,
    erase_fill: u8,
    pad_fill: u8,
}

impl<D: BlockDevice> BlockStore<D> {
    pub fn new(device: D, config: &UpdateConfig) -> Result<Self> {
        if device.block_size() != config.block_width {
            return Err(UpdateError::Geometry(format!(
                "block size {} != configured width {}",
                device.block_size(),
                config.block_width
            )));
        }
        if device.block_count() < config.device_blocks() {
            return Err(UpdateError::Geometry(format!(
                "device has {} blocks, layout needs {}",
                device.block_count(),
                config.device_blocks()
            )));
        }
        Ok(Self {
            device,
            content_blocks: config.block_count,
            width: config.block_width,
            erase_fill: config.erase_fill,
            pad_fill: config.pad_fill,
        })
    }

    pub fn content_blocks(&self) -> usize {
        self.content_blocks
    }

    pub fn spare_index(&self) -> usize {
        self.content_blocks
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    fn check(&self, index: usize) -> core::result::Result<u64, BlockError> {
        if index > self.content_blocks {
            return Err(BlockError::OutOfRange {
                index: index as u64,
                count: self.content_blocks as u64 + 1,
            });
        }
        Ok(index as u64)
    }

    pub fn read(&self, index: usize) -> core::result::Result<Vec<u8>, BlockError> {
        let idx = self.check(index)?;
        let mut buf = vec![0u8; self.width];
        self.device.read_block(idx, &mut buf)?;
        Ok(buf)
    }

    /// Writes `content`, truncated or padded with the pad fill to exactly one block.
    pub fn write(&mut self, index: usize, content: &[u8]) -> core::result::Result<(), BlockError> {
        let idx = self.check(index)?;
        let mut buf = vec![self.pad_fill; self.width];
        let len = content.len().min(self.width);
        buf[..len].copy_from_slice(&content[..len]);
        trace!("blockupdate: write block {index} ({len} bytes given)");
        self.device.write_block(idx, &buf)?;
        self.device.sync()
    }

    pub fn erase(&mut self, index: usize) -> core::result::Result<(), BlockError> {
        let pattern = vec![self.erase_fill; self.width];
        self.write(index, &pattern)
    }
}
