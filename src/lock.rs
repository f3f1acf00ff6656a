// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Advisory whole-file locks used for garbage-collection coordination.
//!
//! Locks are never used for data synchronization (`SPEC_FULL.md` §5) — only
//! to let the garbage collector and [`crate::instance::Instance::is_flow_active`]
//! tell whether some process still holds a flow's "data" file open. We use
//! Linux open-file-description locks (`F_OFD_SETLK`) rather than classic
//! `fcntl` process locks so that releasing one file descriptor in a
//! multi-threaded process does not silently drop another thread's lock on a
//! dup'd descriptor.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// The mode in which a [`crate::mapping::Mapping`] holds its advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// An exclusive (write) lock; at most one holder across all processes.
    Exclusive,
    /// A shared (read) lock; any number of holders may coexist.
    Shared,
    /// No lock is held.
    None,
}

fn flock(file: &File, l_type: i16, blocking: bool) -> io::Result<bool> {
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = l_type;
    fl.l_whence = libc::SEEK_SET as i16;
    fl.l_start = 0;
    fl.l_len = 0; // whole file

    let cmd = if blocking {
        libc::F_OFD_SETLKW
    } else {
        libc::F_OFD_SETLK
    };

    // SAFETY: `fl` is a valid, fully initialized `flock` and `file`'s
    // descriptor remains open for the duration of the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), cmd, &mut fl as *mut libc::flock) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::EACCES) if !blocking => Ok(false),
        _ => Err(err),
    }
}

/// Acquires an exclusive whole-file advisory lock, blocking until available.
pub fn lock_exclusive(file: &File) -> io::Result<()> {
    flock(file, libc::F_WRLCK as i16, true).map(|_| ())
}

/// Acquires a shared whole-file advisory lock, blocking until available.
pub fn lock_shared(file: &File) -> io::Result<()> {
    flock(file, libc::F_RDLCK as i16, true).map(|_| ())
}

/// Attempts to acquire an exclusive lock without blocking.
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if another
/// holder currently has the file locked.
pub fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    flock(file, libc::F_WRLCK as i16, false)
}

/// Attempts to acquire a shared lock without blocking.
pub fn try_lock_shared(file: &File) -> io::Result<bool> {
    flock(file, libc::F_RDLCK as i16, false)
}

/// Releases any lock this file descriptor holds.
pub fn unlock(file: &File) -> io::Result<()> {
    flock(file, libc::F_UNLCK as i16, false).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn exclusive_excludes_exclusive() {
        let f1 = tempfile().unwrap();
        let f2 = File::open(format!("/proc/self/fd/{}", f1.as_raw_fd())).unwrap();
        lock_exclusive(&f1).unwrap();
        assert!(!try_lock_exclusive(&f2).unwrap());
        unlock(&f1).unwrap();
        assert!(try_lock_exclusive(&f2).unwrap());
    }

    #[test]
    fn shared_allows_shared() {
        let f1 = tempfile().unwrap();
        let f2 = File::open(format!("/proc/self/fd/{}", f1.as_raw_fd())).unwrap();
        lock_shared(&f1).unwrap();
        assert!(try_lock_shared(&f2).unwrap());
    }
}
