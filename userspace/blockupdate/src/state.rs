// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persisted update state machine (INIT -> ERASING(b) -> WRITING(b) -> ... -> COMPLETE)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (record mapping, legal/illegal transitions, reset, new pass)
//!
//! The coarse state is a view of the progress record in the spare header. Every
//! header write goes through [`UpdateStateMachine::record`], so an illegal step is
//! rejected before it reaches the media.

use log::debug;
use storage::BlockDevice;

use crate::error::{Result, UpdateError};
use crate::spare::{Phase, ProgressRecord, SpareLayout, HEADER_LEN};
use crate::store::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// No progress persisted.
    Init,
    /// Block `b` is the next to be staged (or is being staged).
    Erasing(usize),
    /// Block `b` is being committed.
    Writing(usize),
    Complete,
}

impl UpdateState {
    pub fn from_record(record: Option<ProgressRecord>) -> Self {
        match record {
            None => UpdateState::Init,
            Some(ProgressRecord { phase: Phase::Idle | Phase::Staging, block_index }) => {
                UpdateState::Erasing(block_index)
            }
            Some(ProgressRecord { phase: Phase::Committing, block_index }) => {
                UpdateState::Writing(block_index)
            }
            Some(ProgressRecord { phase: Phase::Complete, .. }) => UpdateState::Complete,
        }
    }

    pub fn permits(self, next: UpdateState) -> bool {
        use UpdateState::*;
        match (self, next) {
            (_, Init) => false,
            (Complete, Complete) => true,
            (Complete, _) => false,
            (_, Complete) => true,
            (Init, Erasing(_)) => true,
            (Init, Writing(_)) => false,
            (Erasing(b), Erasing(c)) => c >= b,
            (Erasing(b), Writing(c)) => c == b,
            (Writing(b), Writing(c)) => c == b,
            (Writing(b), Erasing(c)) => c > b,
        }
    }
}

pub struct UpdateStateMachine {
    layout: SpareLayout,
    state: UpdateState,
}

impl UpdateStateMachine {
    /// Reads the persisted record and rebuilds the state it describes.
    pub fn restore<D: BlockDevice>(
        store: &BlockStore<D>,
        layout: SpareLayout,
    ) -> Result<(Self, Option<ProgressRecord>)> {
        let record = layout.read_header(store)?;
        let state = UpdateState::from_record(record);
        debug!("blockupdate: restored state {state:?} from {record:?}");
        Ok((Self { layout, state }, record))
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn layout(&self) -> &SpareLayout {
        &self.layout
    }

    /// Persists `record`, together with `payload` when given, in one spare write.
    pub fn record<D: BlockDevice>(
        &mut self,
        store: &mut BlockStore<D>,
        record: ProgressRecord,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        let next = UpdateState::from_record(Some(record));
        if !self.state.permits(next) {
            return Err(UpdateError::InvalidTransition { from: self.state, to: next });
        }
        self.layout.write(store, &record.encode(), payload)?;
        debug!("blockupdate: progress {:?} -> {next:?} ({record:?})", self.state);
        self.state = next;
        Ok(())
    }

    /// Forgets all progress; the next run starts from `Init`.
    pub fn reset<D: BlockDevice>(&mut self, store: &mut BlockStore<D>) -> Result<()> {
        self.layout.write(store, &[0u8; HEADER_LEN], None)?;
        self.state = UpdateState::Init;
        Ok(())
    }

    /// Starts a scan pass at block 0. Nothing is written: the persisted record
    /// stays as is until the pass records its first step. Call only once no
    /// transaction is open.
    pub fn begin_pass(&mut self) {
        debug!("blockupdate: new pass from {:?}", self.state);
        self.state = UpdateState::Init;
    }
}
