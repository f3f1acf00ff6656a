// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII write session for a single open grain.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::header::{GRAIN_PAYLOAD_OFFSET, GrainHeaderViewMut};
use crate::mapping::Mapping;
use crate::time::{self, Clock};
use crate::wait;

/// An open write session for one grain, returned by
/// [`super::writer::GrainWriter::open_grain`].
///
/// Holding this borrows the writer mutably, so the borrow checker enforces
/// the "at most one grain open at a time" rule in `SPEC_FULL.md` §4.5
/// without any runtime bookkeeping. Dropping without calling
/// [`Self::commit`] or [`Self::cancel`] cancels the grain, matching the
/// teacher crate's `GrainWriteAccess::drop`.
pub struct GrainWriteAccess<'a> {
    grain: &'a mut Mapping,
    head_index: &'a AtomicU64,
    last_write_time: &'a AtomicU64,
    sync_counter: &'a AtomicU32,
    index: u64,
    total_slices: u32,
    payload_size: u32,
    finished: bool,
}

impl<'a> GrainWriteAccess<'a> {
    pub(crate) fn new(
        grain: &'a mut Mapping,
        head_index: &'a AtomicU64,
        last_write_time: &'a AtomicU64,
        sync_counter: &'a AtomicU32,
        index: u64,
        total_slices: u32,
        payload_size: u32,
    ) -> Self {
        Self {
            grain,
            head_index,
            last_write_time,
            sync_counter,
            index,
            total_slices,
            payload_size,
            finished: false,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn total_slices(&self) -> u32 {
        self.total_slices
    }

    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// Mutable, zero-copy access to the full grain payload buffer.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let end = GRAIN_PAYLOAD_OFFSET + self.payload_size as usize;
        &mut self.grain.bytes_mut()[GRAIN_PAYLOAD_OFFSET..end]
    }

    /// Publishes a (possibly partial) commit: `committed_slices` must not
    /// decrease across calls and must not exceed `total_slices` (§4.5).
    /// Advances `headIndex` if this grain's index is newer, bumps the sync
    /// counter, and wakes any waiting readers. The session remains open for
    /// further slice commits unless `committed_slices == total_slices`.
    pub fn commit_slices(
        &mut self,
        committed_slices: u32,
        flags: u32,
        origin_timestamp: u64,
    ) -> Result<()> {
        if committed_slices > self.total_slices {
            return Err(Error::InvalidArgument(format!(
                "committed_slices {} exceeds total_slices {}",
                committed_slices, self.total_slices
            )));
        }
        {
            let mut hv = GrainHeaderViewMut::new(self.grain.bytes_mut());
            let current = hv.as_view().snapshot().committed_slices;
            if committed_slices < current {
                return Err(Error::InvalidArgument(
                    "committed_slices must not decrease".to_string(),
                ));
            }
            hv.publish_commit(flags, committed_slices, origin_timestamp);
        }
        self.head_index.fetch_max(self.index, Ordering::Release);
        self.last_write_time.store(time::now(Clock::Tai), Ordering::Release);
        wait::bump_and_wake(self.sync_counter);
        if committed_slices == self.total_slices {
            self.finished = true;
        }
        Ok(())
    }

    /// Convenience for a single, complete commit of `committed_slices`
    /// slices, consuming the session.
    pub fn commit(mut self, committed_slices: u32, flags: u32, origin_timestamp: u64) -> Result<()> {
        self.commit_slices(committed_slices, flags, origin_timestamp)?;
        self.finished = true;
        Ok(())
    }

    /// Releases the slot without advancing `headIndex` or touching the
    /// sync counter (§4.5 `cancelGrain`).
    pub fn cancel(mut self) {
        self.finished = true;
    }
}

impl<'a> Drop for GrainWriteAccess<'a> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(index = self.index, "grain write access dropped without commit; canceling");
        }
    }
}
