// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Block device abstractions for fail-safe block update backends
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (mem/file/fault devices) + downstream host tests
//!
//! PUBLIC API:
//!   - BlockDevice: raw fixed-size block I/O
//!   - MemBlockDevice: in-memory device for tests and fixtures
//!   - FileBlockDevice: host image file backend
//!   - FaultyBlockDevice: write counting, power-loss and corruption injection

#![forbid(unsafe_code)]

mod fault;
mod file;

pub use fault::{Corruption, FaultyBlockDevice};
pub use file::FileBlockDevice;

/// Block device error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// Read/write failed.
    #[error("block i/o error")]
    IoError,
    /// Block index out of range.
    #[error("block {index} out of range (device has {count} blocks)")]
    OutOfRange { index: u64, count: u64 },
    /// Caller buffer smaller than one block.
    #[error("buffer holds {actual} bytes, block needs {expected}")]
    ShortBuffer { expected: usize, actual: usize },
    /// Device lost power; nothing after the cut reaches the media.
    #[error("device lost power")]
    PowerLoss,
}

/// Abstract block device for storage backend.
pub trait BlockDevice {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Total number of blocks.
    fn block_count(&self) -> u64;

    /// Read a single block into buffer.
    fn read_block(&self, block_idx: u64, buf: &mut [u8]) -> Result<(), BlockError>;

    /// Write a single block from buffer. A completed write replaces the whole block;
    /// a failed write leaves the previous content intact.
    fn write_block(&mut self, block_idx: u64, buf: &[u8]) -> Result<(), BlockError>;

    /// Flush all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), BlockError>;
}

pub(crate) fn check_access(
    block_idx: u64,
    block_count: u64,
    block_size: usize,
    buf_len: usize,
) -> Result<usize, BlockError> {
    if block_idx >= block_count {
        return Err(BlockError::OutOfRange { index: block_idx, count: block_count });
    }
    if buf_len < block_size {
        return Err(BlockError::ShortBuffer { expected: block_size, actual: buf_len });
    }
    Ok(block_idx as usize)
}

/// In-memory block device for testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemBlockDevice {
    block_size: usize,
    blocks: Vec<Vec<u8>>,
}

impl MemBlockDevice {
    /// Create a new memory block device with given block size and count, zero filled.
    pub fn new(block_size: usize, block_count: u64) -> Self {
        Self::filled(block_size, block_count, 0)
    }

    /// Create a memory block device whose blocks all hold `fill`.
    pub fn filled(block_size: usize, block_count: u64, fill: u8) -> Self {
        let blocks = (0..block_count).map(|_| vec![fill; block_size]).collect();
        Self { block_size, blocks }
    }

    /// Get raw access to storage (for corruption tests and fixtures).
    pub fn raw_storage_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.blocks
    }

    /// Raw view of one block, `None` past the end.
    pub fn raw_block(&self, block_idx: usize) -> Option<&[u8]> {
        self.blocks.get(block_idx).map(Vec::as_slice)
    }
}

impl BlockDevice for MemBlockDevice {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn read_block(&self, block_idx: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let idx = check_access(block_idx, self.block_count(), self.block_size, buf.len())?;
        buf[..self.block_size].copy_from_slice(&self.blocks[idx]);
        Ok(())
    }

    fn write_block(&mut self, block_idx: u64, buf: &[u8]) -> Result<(), BlockError> {
        let idx = check_access(block_idx, self.block_count(), self.block_size, buf.len())?;
        self.blocks[idx].copy_from_slice(&buf[..self.block_size]);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), BlockError> {
        // In-memory: no-op.
        Ok(())
    }
}
