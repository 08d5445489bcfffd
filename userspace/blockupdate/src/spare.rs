// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Spare block layout: progress header + staging payload
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (record codec, CRC/magic rejection, region split, checkpoint)
//!
//! Header wire format (little endian, HEADER_LEN bytes at the start of the spare block):
//!
//! ```text
//! [0..4)   magic "NXFU"
//! [4]      version
//! [5]      phase (0 idle, 1 staging, 2 committing, 3 complete)
//! [6..10)  block index (u32)
//! [10..14) CRC-32 over [0..10)
//! [14..16) zero
//! ```
//!
//! Anything that fails to decode is treated as "no record".

use sha2::{Digest, Sha256};
use storage::{BlockDevice, BlockError};

use crate::store::BlockStore;

/// Progress record magic: "NXFU" (Nexus Flash Update)
const RECORD_MAGIC: u32 = 0x4E58_4655;

const RECORD_VERSION: u8 = 1;

/// Bytes covered by the CRC: magic(4) + version(1) + phase(1) + block(4)
const RECORD_BODY_LEN: usize = 10;

/// Size of the header region at the start of the spare block.
pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Staging = 1,
    Committing = 2,
    Complete = 3,
}

impl Phase {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Idle),
            1 => Some(Self::Staging),
            2 => Some(Self::Committing),
            3 => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Persisted progress. For `Idle` the block index is the next block to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRecord {
    pub phase: Phase,
    pub block_index: usize,
}

impl ProgressRecord {
    pub fn idle(next_block: usize) -> Self {
        Self { phase: Phase::Idle, block_index: next_block }
    }

    pub fn staging(block: usize) -> Self {
        Self { phase: Phase::Staging, block_index: block }
    }

    pub fn committing(block: usize) -> Self {
        Self { phase: Phase::Committing, block_index: block }
    }

    pub fn complete(content_blocks: usize) -> Self {
        Self { phase: Phase::Complete, block_index: content_blocks }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        buf[4] = RECORD_VERSION;
        buf[5] = self.phase as u8;
        // Config validation keeps block counts within u32.
        buf[6..10].copy_from_slice(&(self.block_index as u32).to_le_bytes());
        let crc = crc32fast::hash(&buf[..RECORD_BODY_LEN]);
        buf[10..14].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a header region; `content_blocks` bounds the block index.
    pub fn decode(header: &[u8], content_blocks: usize) -> Option<Self> {
        if header.len() < RECORD_BODY_LEN + 4 {
            return None;
        }
        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != RECORD_MAGIC || header[4] != RECORD_VERSION {
            return None;
        }
        let stored_crc = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);
        if stored_crc != crc32fast::hash(&header[..RECORD_BODY_LEN]) {
            return None;
        }
        let phase = Phase::from_u8(header[5])?;
        let block_index =
            u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let in_range = match phase {
            Phase::Staging | Phase::Committing => block_index < content_blocks,
            Phase::Idle | Phase::Complete => block_index <= content_blocks,
        };
        in_range.then_some(Self { phase, block_index })
    }
}

/// Header/payload split of the spare block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpareLayout {
    index: usize,
    width: usize,
}

impl SpareLayout {
    pub fn of<D: BlockDevice>(store: &BlockStore<D>) -> Self {
        Self { index: store.spare_index(), width: store.width() }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn payload_len(&self) -> usize {
        self.width - HEADER_LEN
    }

    pub fn read_header<D: BlockDevice>(
        &self,
        store: &BlockStore<D>,
    ) -> Result<Option<ProgressRecord>, BlockError> {
        let block = store.read(self.index)?;
        Ok(ProgressRecord::decode(&block[..HEADER_LEN], self.index))
    }

    pub fn read_payload<D: BlockDevice>(
        &self,
        store: &BlockStore<D>,
    ) -> Result<Vec<u8>, BlockError> {
        let mut block = store.read(self.index)?;
        Ok(block.split_off(HEADER_LEN))
    }

    /// Writes the header and, when given, the payload in one block write.
    /// The payload is truncated or padded like any block write.
    pub(crate) fn write<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        header: &[u8; HEADER_LEN],
        payload: Option<&[u8]>,
    ) -> Result<(), BlockError> {
        let mut block = store.read(self.index)?;
        block[..HEADER_LEN].copy_from_slice(header);
        if let Some(payload) = payload {
            let len = payload.len().min(self.payload_len());
            block.truncate(HEADER_LEN);
            block.extend_from_slice(&payload[..len]);
        }
        store.write(self.index, &block)
    }
}

/// Copy of the payload region taken before a block transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    payload: Vec<u8>,
    digest: [u8; 32],
}

impl Checkpoint {
    pub fn capture<D: BlockDevice>(
        store: &BlockStore<D>,
        layout: &SpareLayout,
    ) -> Result<Self, BlockError> {
        Ok(Self::from_payload(layout.read_payload(store)?))
    }

    /// Stand-in used after a restart, when the original checkpoint is gone.
    pub fn idle(layout: &SpareLayout, fill: u8) -> Self {
        Self::from_payload(vec![fill; layout.payload_len()])
    }

    fn from_payload(payload: Vec<u8>) -> Self {
        let digest = Sha256::digest(&payload).into();
        Self { payload, digest }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn matches(&self, payload: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(payload).into();
        digest == self.digest
    }
}
