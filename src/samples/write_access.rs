// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! RAII write session for a single open sample range.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::time::{self, Clock};
use crate::wait;

use super::data::SampleGeometry;

/// An open write session for `[index, index + count)`, returned by
/// [`super::writer::SamplesWriter::open_samples`].
///
/// As with [`crate::grain::write_access::GrainWriteAccess`], holding this
/// borrows the writer mutably, enforcing "at most one open range" via the
/// borrow checker rather than runtime state.
pub struct SamplesWriteAccess<'a> {
    channels: &'a mut Mapping,
    head_index: &'a AtomicU64,
    last_write_time: &'a AtomicU64,
    sync_counter: &'a AtomicU32,
    geometry: SampleGeometry,
    start: u64,
    count: u64,
    finished: bool,
}

impl<'a> SamplesWriteAccess<'a> {
    pub(crate) fn new(
        channels: &'a mut Mapping,
        head_index: &'a AtomicU64,
        last_write_time: &'a AtomicU64,
        sync_counter: &'a AtomicU32,
        geometry: SampleGeometry,
        start: u64,
        count: u64,
    ) -> Self {
        Self {
            channels,
            head_index,
            last_write_time,
            sync_counter,
            geometry,
            start,
            count,
            finished: false,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mutable `(fragment1, fragment2)` spans for `channel`. `fragment2` is
    /// empty unless this range wraps the ring boundary.
    pub fn channel_data_mut(&mut self, channel: u32) -> Result<(&mut [u8], &mut [u8])> {
        if channel >= self.geometry.channel_count {
            return Err(Error::InvalidArgument(format!(
                "channel {} out of range (count {})",
                channel, self.geometry.channel_count
            )));
        }
        let (s1, e1) = self.geometry.first_range(channel);
        let (s2, e2) = self.geometry.second_range(channel);
        // Two disjoint, non-overlapping byte ranges of the same slice.
        let bytes = self.channels.bytes_mut();
        if e2 <= s1 {
            let (left, right) = bytes.split_at_mut(s1);
            Ok((&mut right[..e1 - s1], &mut left[s2..e2]))
        } else {
            let (left, right) = bytes.split_at_mut(s2);
            Ok((&mut left[s1..e1], &mut right[..e2 - s2]))
        }
    }

    /// Publishes this range: advances `headIndex` to
    /// `max(headIndex, start + count)`, bumps the sync counter, and wakes
    /// readers (§4.6 `commitSamples`).
    pub fn commit(mut self) -> Result<()> {
        self.head_index
            .fetch_max(self.start + self.count, Ordering::Release);
        self.last_write_time.store(time::now(Clock::Tai), Ordering::Release);
        wait::bump_and_wake(self.sync_counter);
        self.finished = true;
        Ok(())
    }

    /// Discards the range without publishing it (§4.6 `cancelSamples`).
    pub fn cancel(mut self) {
        self.finished = true;
    }
}

impl<'a> Drop for SamplesWriteAccess<'a> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(start = self.start, count = self.count, "samples write access dropped without commit; canceling");
        }
    }
}
