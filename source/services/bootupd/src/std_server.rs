// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootupd host daemon (std) – image file, marker-file flag, text dump
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (config load, pending/not pending boots, provision, dump)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blockupdate::{
    BlockOutcome, BlockStore, ConfigError, FileFlag, Orchestrator, RunOutcome, UpdateConfig,
    UpdateError,
};
use log::info;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use storage::{BlockDevice, FileBlockDevice};

/// Result type surfaced by the host daemon.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors emitted by the host daemon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Update run aborted (storage failure, flag I/O, geometry).
    #[error("update failed: {0}")]
    Update(#[from] UpdateError),
    #[error("cannot open image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write dump {path}: {source}")]
    Dump {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Daemon configuration. Relative paths resolve against the config file's directory.
///
/// ```toml
/// image = "flash.img"
/// flag = "update.pending"
/// dump = "flash.txt"
///
/// [update]
/// block_width = 100
/// block_count = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootConfig {
    pub image: PathBuf,
    /// Marker file; an update is pending while it exists.
    pub flag: PathBuf,
    pub dump: PathBuf,
    /// Fill for a freshly created image; defaults to the erase fill.
    #[serde(default)]
    pub initial_fill: Option<u8>,
    #[serde(default)]
    pub update: UpdateConfig,
}

impl BootConfig {
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let config: Self = toml::from_str(data).map_err(ConfigError::from)?;
        config.update.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config = Self::from_toml_str(&data)?;
        if let Some(base) = path.parent() {
            for file in [&mut config.image, &mut config.flag, &mut config.dump] {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        Ok(config)
    }

    pub fn initial_fill(&self) -> u8 {
        self.initial_fill.unwrap_or(self.update.erase_fill)
    }
}

/// What one boot did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSummary {
    pub outcome: RunOutcome,
    /// Hex SHA-256 of the dump text.
    pub dump_digest: String,
}

fn open(config: &BootConfig) -> Result<Orchestrator<FileBlockDevice, FileFlag>> {
    config.update.validate()?;
    let device = FileBlockDevice::open_or_create(
        &config.image,
        config.update.block_width,
        config.update.device_blocks(),
        config.initial_fill(),
    )
    .map_err(|source| Error::Image { path: config.image.clone(), source })?;
    Ok(Orchestrator::new(device, FileFlag::new(config.flag.clone()), &config.update)?)
}

/// Discards persisted progress and marks an update as pending.
pub fn provision(config: &BootConfig) -> Result<()> {
    let mut orchestrator = open(config)?;
    orchestrator.provision()?;
    info!("bootupd: update provisioned on {}", config.image.display());
    Ok(())
}

/// Runs or resumes a pending update, then dumps the image.
pub fn boot(config: &BootConfig) -> Result<BootSummary> {
    let mut orchestrator = open(config)?;
    let outcome = orchestrator.run_if_needed()?;
    match &outcome {
        RunOutcome::NotNeeded => info!("bootupd: no update pending"),
        RunOutcome::Completed(report) => info!(
            "bootupd: update {:?} ({:?}): {} updated, {} current, {} failed",
            report.status(),
            report.recovery(),
            report.count(BlockOutcome::Updated),
            report.count(BlockOutcome::AlreadyCurrent),
            report.outcomes().values().filter(|o| o.is_failure()).count(),
        ),
    }

    let image = render_image(orchestrator.store())?;
    fs::write(&config.dump, &image)
        .map_err(|source| Error::Dump { path: config.dump.clone(), source })?;
    let dump_digest = hex::encode(Sha256::digest(image.as_bytes()));
    info!("bootupd: image dumped to {} (sha256 {dump_digest})", config.dump.display());

    Ok(BootSummary { outcome, dump_digest })
}

/// Renders every content block on its own line, a blank line, then the spare
/// block. Bytes outside printable ASCII show as `.`.
pub fn render_image<D: BlockDevice>(store: &BlockStore<D>) -> blockupdate::Result<String> {
    let mut out = String::with_capacity((store.content_blocks() + 2) * (store.width() + 1));
    for block in 0..store.content_blocks() {
        push_line(&mut out, &store.read(block)?);
    }
    out.push('\n');
    push_line(&mut out, &store.read(store.spare_index())?);
    Ok(out)
}

fn push_line(out: &mut String, bytes: &[u8]) {
    out.extend(bytes.iter().map(|&b| if b == b' ' || b.is_ascii_graphic() { b as char } else { '.' }));
    out.push('\n');
}

/// Runs the host daemon once: optional provisioning, then a boot.
pub fn daemon_main(config_path: &Path, provision_first: bool) -> Result<BootSummary> {
    let config = BootConfig::load(config_path)?;
    if provision_first {
        provision(&config)?;
    }
    boot(&config)
}
