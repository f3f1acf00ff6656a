// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII wrappers for opening/creating a file, sizing it, and memory-mapping
//! it, per `SPEC_FULL.md` §4.3.
//!
//! [`Mapping`] owns both the open file descriptor (needed to hold the
//! advisory lock for the mapping's lifetime) and the `mmap` region. Dropping
//! it unmaps and implicitly releases the lock, matching the teacher
//! crate's `Drop`-based resource release discipline.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use memmap2::{Mmap, MmapMut};

use crate::error::{Error, Result};
use crate::lock::{self, LockMode};

/// How a file should be opened/created before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file read-only. Fails if missing.
    ReadOnly,
    /// Open an existing file read-write. Fails if missing.
    ReadWrite,
    /// Create a new file of the given size, failing with
    /// [`Error::FlowAlreadyExists`] if one is already present.
    CreateExclusive(u64),
}

/// The backing memory-map of either a read-only or read-write mapping.
enum Backing {
    Ro(Mmap),
    Rw(MmapMut),
}

impl Backing {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Backing::Ro(m) => m,
            Backing::Rw(m) => m,
        }
    }
}

/// An owned file + mmap + advisory lock, unmapped and unlocked on drop.
pub struct Mapping {
    file: File,
    backing: Backing,
    lock_mode: LockMode,
    inode: u64,
}

impl Mapping {
    /// Opens or creates `path` per `mode`, maps it, and acquires the
    /// requested advisory lock. Rejects mappings smaller than
    /// `min_size` (the declared structure size).
    pub fn open(path: &Path, mode: OpenMode, lock_mode: LockMode, min_size: usize) -> Result<Self> {
        let (file, writable) = match mode {
            OpenMode::ReadOnly => (
                OpenOptions::new()
                    .read(true)
                    .open(path)
                    .map_err(map_open_err)?,
                false,
            ),
            OpenMode::ReadWrite => (
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(map_open_err)?,
                true,
            ),
            OpenMode::CreateExclusive(size) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .mode(0o644)
                    .open(path)
                    .map_err(|e| {
                        if e.kind() == io::ErrorKind::AlreadyExists {
                            Error::FlowAlreadyExists
                        } else {
                            map_open_err(e)
                        }
                    })?;
                file.set_len(size).map_err(Error::Io)?;
                (file, true)
            }
        };

        let metadata = file.metadata().map_err(Error::Io)?;
        let len = metadata.len() as usize;
        if len < min_size {
            return Err(Error::FlowInvalid(format!(
                "mapping {} is {} bytes, smaller than required {}",
                path.display(),
                len,
                min_size
            )));
        }
        let inode = metadata.ino();

        match lock_mode {
            LockMode::Exclusive => lock::lock_exclusive(&file).map_err(map_lock_err)?,
            LockMode::Shared => lock::lock_shared(&file).map_err(map_lock_err)?,
            LockMode::None => {}
        }

        let backing = if writable {
            // SAFETY: `file` stays open for the lifetime of `backing` since
            // both live inside the returned `Mapping`; the file is not
            // concurrently truncated by this process after this point.
            Backing::Rw(unsafe { MmapMut::map_mut(&file) }.map_err(Error::Io)?)
        } else {
            // SAFETY: see above.
            Backing::Ro(unsafe { Mmap::map(&file) }.map_err(Error::Io)?)
        };

        Ok(Self {
            file,
            backing,
            lock_mode,
            inode,
        })
    }

    /// Read-only view of the entire mapping.
    pub fn bytes(&self) -> &[u8] {
        self.backing.as_bytes()
    }

    /// Mutable view, available only for read-write mappings.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Rw(m) => m,
            Backing::Ro(_) => panic!("mapping is read-only"),
        }
    }

    /// The inode of the file as opened, for stale-mapping detection (I6).
    pub fn inode(&self) -> u64 {
        self.inode
    }

    /// Re-reads the file's current on-disk inode (used to detect
    /// delete+recreate races independent of this mapping's cached value).
    pub fn current_inode_on_disk(path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.ino())
    }

    /// Attempts to upgrade a shared lock to exclusive without blocking.
    /// Never blocks; returns `false` if another holder exists.
    pub fn try_make_exclusive(&mut self) -> Result<bool> {
        let ok = lock::try_lock_exclusive(&self.file).map_err(map_lock_err)?;
        if ok {
            self.lock_mode = LockMode::Exclusive;
        }
        Ok(ok)
    }

    /// Downgrades an exclusive lock to shared, on the same open-file
    /// description.
    ///
    /// A creator holds `Exclusive` only to initialize a flow without another
    /// writer racing it; per `SPEC_FULL.md` §4.4 step 7 it must downgrade
    /// afterward so later writers can attach. Converting the lock type on the
    /// *same* fd is a self-conversion, not a fresh acquisition, so this never
    /// blocks on the lock this mapping itself already holds.
    pub fn downgrade_to_shared(&mut self) -> Result<()> {
        lock::lock_shared(&self.file).map_err(map_lock_err)?;
        self.lock_mode = LockMode::Shared;
        Ok(())
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    /// Exposes the underlying file descriptor for additional fcntl calls
    /// (used by the flow manager's delete/GC paths).
    pub fn file(&self) -> &File {
        &self.file
    }
}

fn map_open_err(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::NotFound => Error::FlowNotFound,
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(e.to_string()),
        _ => Error::Io(e),
    }
}

fn map_lock_err(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(e.to_string()),
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        {
            let mut m = Mapping::open(
                &path,
                OpenMode::CreateExclusive(64),
                LockMode::Exclusive,
                64,
            )
            .unwrap();
            m.bytes_mut()[0] = 0xAB;
        }
        let m2 = Mapping::open(&path, OpenMode::ReadOnly, LockMode::None, 64).unwrap();
        assert_eq!(m2.bytes()[0], 0xAB);
    }

    #[test]
    fn create_exclusive_fails_if_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let _m = Mapping::open(
            &path,
            OpenMode::CreateExclusive(64),
            LockMode::None,
            64,
        )
        .unwrap();
        let err = Mapping::open(&path, OpenMode::CreateExclusive(64), LockMode::None, 64)
            .unwrap_err();
        assert!(matches!(err, Error::FlowAlreadyExists));
    }

    #[test]
    fn rejects_undersized_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        let _m = Mapping::open(&path, OpenMode::CreateExclusive(8), LockMode::None, 8).unwrap();
        let err = Mapping::open(&path, OpenMode::ReadOnly, LockMode::None, 64).unwrap_err();
        assert!(matches!(err, Error::FlowInvalid(_)));
    }
}
