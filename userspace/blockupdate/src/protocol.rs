// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Staged write protocol for one content block, plus restart recovery
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests here; crash/fault matrix in tests/blockupdate_host
//!
//! Per block `b` with target `T`:
//!   1. skip if `b` already fingerprints as its expected signature
//!   2. checkpoint the spare payload
//!   3. stage `T` in the payload with header STAGING(b), verify, retry
//!   4. write `T` to `b`, header COMMITTING(b), verify, retry
//!   5. restore the checkpoint with header IDLE(b + 1)
//!
//! Storage errors propagate; verification failures become block outcomes.
//! Recovery only closes the transaction the header left open; the orchestrator
//! then scans every block from 0, so blocks that failed before a restart are retried.

use log::{debug, error, info, warn};
use storage::BlockDevice;

use crate::config::UpdateConfig;
use crate::error::Result;
use crate::report::{BlockOutcome, Recovery, RecoveryReport};
use crate::signature::Classifier;
use crate::spare::{Checkpoint, Phase, ProgressRecord};
use crate::state::UpdateStateMachine;
use crate::store::BlockStore;

pub struct StagedWriteProtocol {
    classifier: Classifier,
    retry_budget: u8,
    idle_fill: u8,
}

impl StagedWriteProtocol {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            classifier: Classifier::new(config),
            retry_budget: config.retry_budget,
            idle_fill: config.idle_fill(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn attempts(&self) -> u32 {
        u32::from(self.retry_budget) + 1
    }

    pub fn update_block<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        block: usize,
    ) -> Result<BlockOutcome> {
        if self.classifier.is_up_to_date(store, block)? {
            debug!("blockupdate: block {block} already current");
            return Ok(BlockOutcome::AlreadyCurrent);
        }
        let checkpoint = Checkpoint::capture(store, machine.layout())?;
        if !self.stage(store, machine, block)? {
            warn!("blockupdate: block {block} staging failed after {} attempts", self.attempts());
            self.restore(store, machine, &checkpoint, block + 1)?;
            return Ok(BlockOutcome::FailedStaging);
        }
        self.commit_and_close(store, machine, block, &checkpoint)
    }

    /// Closes whatever transaction the spare header left open.
    pub fn recover<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        record: Option<ProgressRecord>,
    ) -> Result<RecoveryReport> {
        let Some(record) = record else {
            return Ok(RecoveryReport { action: Recovery::Fresh, outcome: None });
        };
        let block = record.block_index;
        let idle = Checkpoint::idle(machine.layout(), self.idle_fill);
        let report = match record.phase {
            Phase::Idle => RecoveryReport { action: Recovery::Resumed { cursor: block }, outcome: None },
            Phase::Complete => RecoveryReport { action: Recovery::AlreadyComplete, outcome: None },
            Phase::Staging => {
                let payload = machine.layout().read_payload(store)?;
                let found = self.classifier.fingerprint(&payload);
                if found == self.classifier.expected_signature(block) {
                    info!("blockupdate: staged copy of block {block} verified, resuming commit");
                    let outcome = self.commit_and_close(store, machine, block, &idle)?;
                    RecoveryReport {
                        action: Recovery::ResumedStaging(block),
                        outcome: Some((block, outcome)),
                    }
                } else {
                    warn!("blockupdate: stale staging data for block {block} ({found:?}), discarding");
                    self.restore(store, machine, &idle, block)?;
                    RecoveryReport { action: Recovery::DiscardedStaging(block), outcome: None }
                }
            }
            Phase::Committing => {
                if self.classifier.is_up_to_date(store, block)? {
                    info!("blockupdate: block {block} committed before restart, closing");
                    self.restore(store, machine, &idle, block + 1)?;
                    RecoveryReport {
                        action: Recovery::FinalizedCommit(block),
                        outcome: Some((block, BlockOutcome::Updated)),
                    }
                } else {
                    info!("blockupdate: block {block} commit interrupted, retrying");
                    let outcome = self.commit_and_close(store, machine, block, &idle)?;
                    RecoveryReport {
                        action: Recovery::RetriedCommit(block),
                        outcome: Some((block, outcome)),
                    }
                }
            }
        };
        Ok(report)
    }

    fn commit_and_close<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        block: usize,
        checkpoint: &Checkpoint,
    ) -> Result<BlockOutcome> {
        let committed = self.commit(store, machine, block)?;
        if !committed {
            warn!("blockupdate: block {block} commit failed after {} attempts", self.attempts());
        }
        self.restore(store, machine, checkpoint, block + 1)?;
        Ok(if committed { BlockOutcome::Updated } else { BlockOutcome::FailedCommit })
    }

    fn stage<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        block: usize,
    ) -> Result<bool> {
        let target = self.classifier.target_content(block);
        let expected = self.classifier.expected_signature(block);
        for attempt in 1..=self.attempts() {
            machine.record(store, ProgressRecord::staging(block), Some(target.as_slice()))?;
            let found = self.classifier.fingerprint(&machine.layout().read_payload(store)?);
            if found == expected {
                return Ok(true);
            }
            warn!(
                "blockupdate: staging verification failed for block {block}: {found:?} \
                 (attempt {attempt}/{})",
                self.attempts()
            );
        }
        Ok(false)
    }

    fn commit<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        block: usize,
    ) -> Result<bool> {
        let target = self.classifier.target_content(block);
        let expected = self.classifier.expected_signature(block);
        for attempt in 1..=self.attempts() {
            store.write(block, &target)?;
            machine.record(store, ProgressRecord::committing(block), None)?;
            let found = self.classifier.fingerprint(&store.read(block)?);
            if found == expected {
                return Ok(true);
            }
            warn!(
                "blockupdate: commit verification failed for block {block}: {found:?} \
                 (attempt {attempt}/{})",
                self.attempts()
            );
        }
        Ok(false)
    }

    /// Puts the checkpointed payload back and records IDLE(next_block).
    /// A payload that will not verify is logged and left; the next transaction
    /// checkpoints whatever it finds.
    fn restore<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        machine: &mut UpdateStateMachine,
        checkpoint: &Checkpoint,
        next_block: usize,
    ) -> Result<bool> {
        let record = ProgressRecord::idle(next_block);
        for _ in 0..self.attempts() {
            machine.record(store, record, Some(checkpoint.payload()))?;
            if checkpoint.matches(&machine.layout().read_payload(store)?) {
                return Ok(true);
            }
        }
        error!("blockupdate: spare payload did not verify after restore");
        Ok(false)
    }
}
