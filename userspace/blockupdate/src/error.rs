// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::io;

use storage::BlockError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::UpdateState;

pub type Result<T> = core::result::Result<T, UpdateError>;

/// Errors that end an update invocation.
///
/// Verification failures and stale staging data never show up here; they are
/// recovered per block and reported through [`crate::BlockOutcome`] and
/// [`crate::Recovery`].
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The device failed or went away (power loss ends the run here).
    #[error("storage error: {0}")]
    Storage(#[from] BlockError),
    /// Device geometry does not match the configured layout.
    #[error("device geometry mismatch: {0}")]
    Geometry(String),
    /// A progress write would move the run backwards.
    #[error("invalid progress transition {from:?} -> {to:?}")]
    InvalidTransition { from: UpdateState, to: UpdateState },
    /// Pending-update flag could not be read or written.
    #[error("pending flag i/o error: {0}")]
    Flag(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
