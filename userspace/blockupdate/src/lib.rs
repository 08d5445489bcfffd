// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Fail-safe in-place block update with a journaled spare block
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Host unit tests + tests/blockupdate_host (interruption matrix)
//!
//! PUBLIC API:
//!   - Orchestrator: provision / run_if_needed over a device and a pending flag
//!   - StagedWriteProtocol: per-block stage/commit/restore and restart recovery
//!   - UpdateStateMachine: persisted progress with transition checks
//!   - BlockStore, SpareLayout, Checkpoint: storage context and spare block regions
//!   - Classifier: content fingerprints and update targets
//!   - UpdateConfig: geometry, fills and retry budget (TOML)
//!   - UpdateReport / RunOutcome: per-block outcomes of one invocation
//!
//! DEPENDENCIES:
//!   - storage: BlockDevice and the host/test backends
//!   - crc32fast: progress record checksum
//!   - sha2: checkpoint digest
//!   - serde/toml: configuration

#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod flag;
mod orchestrator;
pub mod protocol;
pub mod report;
pub mod signature;
pub mod spare;
pub mod state;
pub mod store;

pub use config::{ConfigError, UpdateConfig};
pub use error::{Result, UpdateError};
pub use flag::{FileFlag, MemFlag, PendingFlag};
pub use orchestrator::Orchestrator;
pub use protocol::StagedWriteProtocol;
pub use report::{BlockOutcome, Recovery, RecoveryReport, RunOutcome, RunStatus, UpdateReport};
pub use signature::{Classifier, Fingerprint};
pub use spare::{Checkpoint, Phase, ProgressRecord, SpareLayout, HEADER_LEN};
pub use state::{UpdateState, UpdateStateMachine};
pub use store::BlockStore;
