//! File-backed memory region
//!
//! A plain file stands in for the medium: on open it is padded to the
//! region size with the fill byte, so a fresh file looks like freshly
//! erased flash. Erase and write granularities are enforced the way a
//! flash part would enforce them, and `writable` really reads the range
//! back to confirm it still holds fill bytes.
//!
//! The store's crash-recovery argument assumes that a write the backend
//! acknowledged is actually on the medium, so `write` and `erase` sync
//! file data before returning their success flag. `File::sync_data`
//! maps to the strongest primitive each platform offers (`fdatasync` on
//! Linux, `F_FULLFSYNC` on Apple systems, `FlushFileBuffers` on
//! Windows); a record sitting in the page cache would not survive the
//! power loss the store is built to tolerate.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;
use nvcell_core::{BackendOp, NvError, NvMemory};

/// File-backed region with configurable erase and write granularities.
pub struct FileMemory<const SIZE: u32, const E: u32, const W: u32> {
    file: File,
    path: PathBuf,
}

impl<const SIZE: u32, const E: u32, const W: u32> FileMemory<SIZE, E, W> {
    /// Open `path`, creating it if needed, and pad it to the region size
    /// with the fill byte.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len < SIZE as u64 {
            file.seek(SeekFrom::End(0))?;
            let pad = vec![Self::FILL_BYTE; (SIZE as u64 - len) as usize];
            file.write_all(&pad)?;
            file.sync_data()?;
        }

        Ok(Self { file, path })
    }

    /// The backing file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn in_bounds(offset: u32, len: usize) -> bool {
        (offset as usize).checked_add(len).is_some_and(|end| end <= SIZE as usize)
    }

    /// Push file data to the medium before the store sees the success
    /// flag. Failure here is reported exactly as the store would report
    /// it: the access that could not be made durable.
    fn commit(&mut self, op: BackendOp, offset: u32, len: u32) -> bool {
        match self.file.sync_data() {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "{} in {}: sync failed: {}",
                    NvError::Backend { op, offset, len },
                    self.path.display(),
                    err
                );
                false
            }
        }
    }

    fn fill_range(&mut self, offset: u32, len: u32) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&vec![Self::FILL_BYTE; len as usize])
    }
}

impl<const SIZE: u32, const E: u32, const W: u32> NvMemory for FileMemory<SIZE, E, W> {
    const SIZE: u32 = SIZE;
    const ERASE_GRANULARITY: u32 = E;
    const WRITE_GRANULARITY: u32 = W;

    fn read(&mut self, offset: u32, dst: &mut [u8]) -> bool {
        if !Self::in_bounds(offset, dst.len()) {
            return false;
        }

        let result = self
            .file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.read_exact(dst));

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "read of {} bytes at {} from {} failed: {}",
                    dst.len(),
                    offset,
                    self.path.display(),
                    err
                );
                false
            }
        }
    }

    fn writable(&mut self, offset: u32, len: u32) -> bool {
        if offset % W != 0 || len % W != 0 || !Self::in_bounds(offset, len as usize) {
            return false;
        }

        if self.file.seek(SeekFrom::Start(offset as u64)).is_err() {
            return false;
        }

        let mut remaining = len as usize;
        let mut chunk = [0u8; 256];
        while remaining > 0 {
            let take = remaining.min(chunk.len());
            if self.file.read_exact(&mut chunk[..take]).is_err() {
                return false;
            }
            if chunk[..take].iter().any(|&b| b != Self::FILL_BYTE) {
                return false;
            }
            remaining -= take;
        }

        true
    }

    fn write(&mut self, offset: u32, src: &[u8]) -> bool {
        if !Self::in_bounds(offset, src.len()) {
            return false;
        }

        let result = self
            .file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.write_all(src));

        match result {
            Ok(()) => self.commit(BackendOp::Write, offset, src.len() as u32),
            Err(err) => {
                warn!(
                    "write of {} bytes at {} to {} failed: {}",
                    src.len(),
                    offset,
                    self.path.display(),
                    err
                );
                false
            }
        }
    }

    fn erase(&mut self, offset: u32, len: u32) -> bool {
        if offset % E != 0 || len % E != 0 || !Self::in_bounds(offset, len as usize) {
            return false;
        }

        match self.fill_range(offset, len) {
            Ok(()) => self.commit(BackendOp::Erase, offset, len),
            Err(err) => {
                warn!(
                    "erase of {} bytes at {} in {} failed: {}",
                    len,
                    offset,
                    self.path.display(),
                    err
                );
                false
            }
        }
    }
}
