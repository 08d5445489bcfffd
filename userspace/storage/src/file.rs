// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Host image-file backend for BlockDevice
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests (create, reopen, size mismatch)

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::{check_access, BlockDevice, BlockError};

/// BlockDevice over a flat image file of `block_count * block_size` bytes.
pub struct FileBlockDevice {
    path: PathBuf,
    file: File,
    block_size: usize,
    block_count: u64,
}

impl FileBlockDevice {
    /// Opens `path`, creating it filled with `fill` when missing or empty.
    ///
    /// An existing image of a different size is rejected rather than resized.
    pub fn open_or_create(
        path: &Path,
        block_size: usize,
        block_count: u64,
        fill: u8,
    ) -> io::Result<Self> {
        let mut file =
            OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        let expected = block_size as u64 * block_count;
        let actual = file.metadata()?.len();
        if actual == 0 {
            let block = vec![fill; block_size];
            for _ in 0..block_count {
                file.write_all(&block)?;
            }
            file.sync_all()?;
        } else if actual != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: image is {actual} bytes, expected {expected}", path.display()),
            ));
        }
        Ok(Self { path: path.to_path_buf(), file, block_size, block_count })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset(&self, idx: usize) -> u64 {
        idx as u64 * self.block_size as u64
    }
}

impl BlockDevice for FileBlockDevice {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, block_idx: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let idx = check_access(block_idx, self.block_count, self.block_size, buf.len())?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.offset(idx))).map_err(|_| BlockError::IoError)?;
        file.read_exact(&mut buf[..self.block_size]).map_err(|_| BlockError::IoError)
    }

    fn write_block(&mut self, block_idx: u64, buf: &[u8]) -> Result<(), BlockError> {
        let idx = check_access(block_idx, self.block_count, self.block_size, buf.len())?;
        let offset = self.offset(idx);
        self.file.seek(SeekFrom::Start(offset)).map_err(|_| BlockError::IoError)?;
        self.file.write_all(&buf[..self.block_size]).map_err(|_| BlockError::IoError)
    }

    fn sync(&mut self) -> Result<(), BlockError> {
        self.file.sync_data().map_err(|_| BlockError::IoError)
    }
}
