// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

/// Result of driving one block through the staged write protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    AlreadyCurrent,
    Updated,
    /// Staged copy never verified; the block was not touched.
    FailedStaging,
    /// Block content never verified after the retry budget.
    FailedCommit,
}

impl BlockOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, BlockOutcome::FailedStaging | BlockOutcome::FailedCommit)
    }
}

/// What restart recovery found in the spare header and did about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No progress record.
    Fresh,
    /// Idle record; no transaction was open. `cursor` is the next block the
    /// interrupted pass would have visited.
    Resumed { cursor: usize },
    /// Staged payload verified; the block was committed.
    ResumedStaging(usize),
    /// Staged payload failed re-verification and was discarded.
    DiscardedStaging(usize),
    /// Block already held its target; only the transaction was closed.
    FinalizedCommit(usize),
    /// Block did not hold its target; commit was retried.
    RetriedCommit(usize),
    /// Previous run had completed; the flag was raised again, so the pass
    /// re-verifies every block.
    AlreadyComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub action: Recovery,
    /// Outcome of the block recovery finished, if any. The scan skips it.
    pub outcome: Option<(usize, BlockOutcome)>,
}

/// Aggregate verdict of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Converged,
    /// Some visited blocks failed, others converged.
    Degraded,
    /// Every visited block failed: the update had no effect.
    Ineffective,
}

/// Per-block outcomes of one invocation: every content block, unless the run was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    outcomes: BTreeMap<usize, BlockOutcome>,
    recovery: Recovery,
}

impl UpdateReport {
    pub(crate) fn new(recovery: &RecoveryReport) -> Self {
        let mut outcomes = BTreeMap::new();
        if let Some((block, outcome)) = recovery.outcome {
            outcomes.insert(block, outcome);
        }
        Self { outcomes, recovery: recovery.action }
    }

    pub(crate) fn record(&mut self, block: usize, outcome: BlockOutcome) {
        self.outcomes.insert(block, outcome);
    }

    pub fn outcomes(&self) -> &BTreeMap<usize, BlockOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, block: usize) -> Option<BlockOutcome> {
        self.outcomes.get(&block).copied()
    }

    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    pub fn count(&self, outcome: BlockOutcome) -> usize {
        self.outcomes.values().filter(|&&o| o == outcome).count()
    }

    pub fn status(&self) -> RunStatus {
        let failed = self.outcomes.values().filter(|o| o.is_failure()).count();
        if failed == 0 {
            RunStatus::Converged
        } else if failed == self.outcomes.len() {
            RunStatus::Ineffective
        } else {
            RunStatus::Degraded
        }
    }
}

/// Result of [`crate::Orchestrator::run_if_needed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Pending flag was clear; storage was not touched.
    NotNeeded,
    Completed(UpdateReport),
}
