// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Persisted "an update run is owed" indicator.
pub trait PendingFlag {
    fn is_pending(&self) -> io::Result<bool>;

    fn set_pending(&mut self, pending: bool) -> io::Result<()>;
}

/// In-memory flag for tests and embedded callers that keep it elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemFlag {
    pending: bool,
}

impl MemFlag {
    pub fn new(pending: bool) -> Self {
        Self { pending }
    }
}

impl PendingFlag for MemFlag {
    fn is_pending(&self) -> io::Result<bool> {
        Ok(self.pending)
    }

    fn set_pending(&mut self, pending: bool) -> io::Result<()> {
        self.pending = pending;
        Ok(())
    }
}

/// Marker-file flag: the update is pending while the file exists.
#[derive(Debug, Clone)]
pub struct FileFlag {
    path: PathBuf,
}

impl FileFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PendingFlag for FileFlag {
    fn is_pending(&self) -> io::Result<bool> {
        self.path.try_exists()
    }

    fn set_pending(&mut self, pending: bool) -> io::Result<()> {
        if pending {
            let mut file = fs::File::create(&self.path)?;
            file.write_all(b"pending\n")?;
            file.sync_all()
        } else {
            match fs::remove_file(&self.path) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        }
    }
}
