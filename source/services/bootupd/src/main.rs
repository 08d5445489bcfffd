#![forbid(unsafe_code)]
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootupd entrypoint: `bootupd [--provision] <config.toml>`
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Covered through the library (daemon_main)

use std::path::PathBuf;
use std::process;

fn usage() -> ! {
    eprintln!("usage: bootupd [--provision] <config.toml>");
    process::exit(2);
}

fn main() {
    env_logger::init();

    let mut provision = false;
    let mut config = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--provision" => provision = true,
            _ if config.is_none() && !arg.starts_with('-') => config = Some(PathBuf::from(arg)),
            _ => usage(),
        }
    }
    let Some(config) = config else { usage() };

    if let Err(err) = bootupd::daemon_main(&config, provision) {
        eprintln!("bootupd: {err}");
        process::exit(1);
    }
}
