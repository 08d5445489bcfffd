#![forbid(unsafe_code)]
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootupd daemon – resumes or runs a pending block update at boot
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Host unit tests (tempfile-backed image, flag and dump)
//!
//! PUBLIC API: boot(), daemon_main(), render_image(), BootConfig
//! DEPENDS_ON: blockupdate, storage (FileBlockDevice)

mod std_server;
pub use std_server::*;
