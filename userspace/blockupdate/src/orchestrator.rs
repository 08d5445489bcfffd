// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Update orchestrator: recovery, block scan, run finalization
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests here; scenarios and interruption properties in
//!   tests/blockupdate_host

use log::{debug, info, warn};
use storage::BlockDevice;

use crate::config::UpdateConfig;
use crate::error::Result;
use crate::flag::PendingFlag;
use crate::protocol::StagedWriteProtocol;
use crate::report::{Recovery, RunOutcome, RunStatus, UpdateReport};
use crate::signature::Classifier;
use crate::spare::{ProgressRecord, SpareLayout};
use crate::state::UpdateStateMachine;
use crate::store::BlockStore;

/// Owns the storage context and the pending flag for the lifetime of the process.
pub struct Orchestrator<D, F> {
    store: BlockStore<D>,
    flag: F,
    protocol: StagedWriteProtocol,
}

impl<D: BlockDevice, F: PendingFlag> Orchestrator<D, F> {
    pub fn new(device: D, flag: F, config: &UpdateConfig) -> Result<Self> {
        config.validate()?;
        let store = BlockStore::new(device, config)?;
        Ok(Self { store, flag, protocol: StagedWriteProtocol::new(config) })
    }

    pub fn store(&self) -> &BlockStore<D> {
        &self.store
    }

    pub fn classifier(&self) -> &Classifier {
        self.protocol.classifier()
    }

    pub fn flag(&self) -> &F {
        &self.flag
    }

    pub fn is_pending(&self) -> Result<bool> {
        Ok(self.flag.is_pending()?)
    }

    pub fn into_parts(self) -> (D, F) {
        (self.store.into_device(), self.flag)
    }

    fn layout(&self) -> SpareLayout {
        SpareLayout::of(&self.store)
    }

    /// Drops any persisted progress and marks an update as owed.
    pub fn provision(&mut self) -> Result<()> {
        let (mut machine, _) = UpdateStateMachine::restore(&self.store, self.layout())?;
        machine.reset(&mut self.store)?;
        self.flag.set_pending(true)?;
        info!("blockupdate: update provisioned");
        Ok(())
    }

    /// Runs (or resumes) the update when one is owed. Touches nothing otherwise.
    ///
    /// Recovery closes whatever transaction a restart left open, then one pass
    /// visits every content block from 0. Blocks already at target cost a read.
    pub fn run_if_needed(&mut self) -> Result<RunOutcome> {
        if !self.flag.is_pending()? {
            debug!("blockupdate: no update pending");
            return Ok(RunOutcome::NotNeeded);
        }

        let (mut machine, record) = UpdateStateMachine::restore(&self.store, self.layout())?;
        let recovery = self.protocol.recover(&mut self.store, &mut machine, record)?;
        if recovery.action != Recovery::Fresh {
            info!("blockupdate: recovery {:?}", recovery.action);
        }
        let mut report = UpdateReport::new(&recovery);

        machine.begin_pass();
        let blocks = self.store.content_blocks();
        for block in 0..blocks {
            if report.outcome(block).is_some() {
                continue;
            }
            let outcome = self.protocol.update_block(&mut self.store, &mut machine, block)?;
            info!("blockupdate: block {block}: {outcome:?}");
            report.record(block, outcome);
        }

        machine.record(&mut self.store, ProgressRecord::complete(blocks), None)?;
        self.flag.set_pending(false)?;

        match report.status() {
            RunStatus::Converged => info!("blockupdate: update complete"),
            RunStatus::Degraded => warn!(
                "blockupdate: update complete with {} failed block(s)",
                report.outcomes().values().filter(|o| o.is_failure()).count()
            ),
            RunStatus::Ineffective => warn!("blockupdate: update ineffective, no block converged"),
        }
        Ok(RunOutcome::Completed(report))
    }
}
