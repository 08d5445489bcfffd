// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Fault-injecting BlockDevice wrapper for crash and media-failure tests
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (write counting, power cut, corruption)
//!
//! Power loss is modelled at write granularity: once the budget is spent the write in
//! progress never reaches the media and every later access fails with
//! [`BlockError::PowerLoss`]. Corruption flips the last byte of the written block.

use std::collections::BTreeMap;

use crate::{BlockDevice, BlockError};

/// How writes to a block get corrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// Corrupt the next `n` writes, then behave.
    Transient(u32),
    /// Corrupt every write.
    Persistent,
}

pub struct FaultyBlockDevice<D> {
    inner: D,
    writes: u64,
    power_budget: Option<u64>,
    powered: bool,
    corruptions: BTreeMap<u64, Corruption>,
}

impl<D: BlockDevice> FaultyBlockDevice<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, writes: 0, power_budget: None, powered: true, corruptions: BTreeMap::new() }
    }

    /// Lets `writes` more writes through, then cuts power.
    pub fn cut_power_after(mut self, writes: u64) -> Self {
        self.power_budget = Some(self.writes.saturating_add(writes));
        self
    }

    pub fn corrupt_writes(mut self, block_idx: u64, corruption: Corruption) -> Self {
        self.corruptions.insert(block_idx, corruption);
        self
    }

    /// Number of writes that reached the media.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Returns the underlying media, as found after a reboot.
    pub fn into_inner(self) -> D {
        self.inner
    }

    fn take_corruption(&mut self, block_idx: u64) -> bool {
        match self.corruptions.get_mut(&block_idx) {
            Some(Corruption::Persistent) => true,
            Some(Corruption::Transient(left)) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

impl<D: BlockDevice> BlockDevice for FaultyBlockDevice<D> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u64 {
        self.inner.block_count()
    }

    fn read_block(&self, block_idx: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        if !self.powered {
            return Err(BlockError::PowerLoss);
        }
        self.inner.read_block(block_idx, buf)
    }

    fn write_block(&mut self, block_idx: u64, buf: &[u8]) -> Result<(), BlockError> {
        if !self.powered {
            return Err(BlockError::PowerLoss);
        }
        if self.power_budget.is_some_and(|budget| self.writes >= budget) {
            self.powered = false;
            return Err(BlockError::PowerLoss);
        }
        if block_idx < self.inner.block_count() && self.take_corruption(block_idx) {
            let mut damaged = buf.to_vec();
            if let Some(last) = damaged.get_mut(self.inner.block_size().saturating_sub(1)) {
                *last ^= 0xFF;
            }
            self.inner.write_block(block_idx, &damaged)?;
        } else {
            self.inner.write_block(block_idx, buf)?;
        }
        self.writes += 1;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), BlockError> {
        if !self.powered {
            return Err(BlockError::PowerLoss);
        }
        self.inner.sync()
    }
}
