// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Zero-copy, possibly-wrapping view of multi-channel sample data.

use crate::error::{Error, Result};

/// Computes the ring-buffer split for a request of `count` samples starting
/// at absolute `index`, against a ring of `buffer_length` samples.
///
/// Returns `(slot_start, first_count, second_count)`. `second_count` is
/// non-zero only when the request wraps past the end of the ring, in which
/// case `first_count + second_count == count`. Shared by reader and writer
/// so both sides compute identical split positions (the "Geometry
/// guarantee" of `SPEC_FULL.md` §4.6).
pub(crate) fn compute_spans(index: u64, count: u64, buffer_length: u64) -> (u64, u64, u64) {
    let slot = index % buffer_length;
    if slot + count <= buffer_length {
        (slot, count, 0)
    } else {
        let first = buffer_length - slot;
        (slot, first, count - first)
    }
}

/// Per-channel geometry shared by [`SamplesData`] and
/// [`super::write_access::SamplesWriteAccess`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleGeometry {
    pub channel_count: u32,
    pub sample_word_size: u32,
    pub buffer_length: u64,
    pub slot_start: u64,
    pub first_count: u64,
    pub second_count: u64,
}

impl SampleGeometry {
    pub fn channel_stride_bytes(&self) -> u64 {
        self.buffer_length * self.sample_word_size as u64
    }

    /// Byte range of a channel's first fragment within the channels file.
    pub fn first_range(&self, channel: u32) -> (usize, usize) {
        let base = channel as u64 * self.channel_stride_bytes();
        let start = base + self.slot_start * self.sample_word_size as u64;
        let len = self.first_count * self.sample_word_size as u64;
        (start as usize, (start + len) as usize)
    }

    /// Byte range of a channel's second (wrapped) fragment, empty if the
    /// request did not wrap.
    pub fn second_range(&self, channel: u32) -> (usize, usize) {
        let base = channel as u64 * self.channel_stride_bytes();
        let len = self.second_count * self.sample_word_size as u64;
        (base as usize, (base + len) as usize)
    }
}

/// Zero-copy view of multi-channel sample data read from a flow.
///
/// Each channel's data is returned as up to two fragments (the second is
/// empty unless the read wrapped the ring buffer); the lifetime `'a` is
/// tied to the [`super::reader::SamplesReader`] that produced it.
pub struct SamplesData<'a> {
    bytes: &'a [u8],
    geometry: SampleGeometry,
}

impl<'a> SamplesData<'a> {
    pub(crate) fn new(bytes: &'a [u8], geometry: SampleGeometry) -> Self {
        Self { bytes, geometry }
    }

    pub fn num_of_channels(&self) -> u32 {
        self.geometry.channel_count
    }

    /// Number of samples returned, across both fragments.
    pub fn sample_count(&self) -> u64 {
        self.geometry.first_count + self.geometry.second_count
    }

    /// Returns `(fragment1, fragment2)` for `channel`. `fragment2` is empty
    /// unless the read wrapped the ring boundary.
    pub fn channel_data(&self, channel: u32) -> Result<(&'a [u8], &'a [u8])> {
        if channel >= self.geometry.channel_count {
            return Err(Error::InvalidArgument(format!(
                "channel {} out of range (count {})",
                channel, self.geometry.channel_count
            )));
        }
        let (s1, e1) = self.geometry.first_range(channel);
        let (s2, e2) = self.geometry.second_range(channel);
        Ok((&self.bytes[s1..e1], &self.bytes[s2..e2]))
    }

    pub fn to_owned_data(&self) -> OwnedSamplesData {
        let mut payload = Vec::with_capacity(self.geometry.channel_count as usize);
        for ch in 0..self.geometry.channel_count {
            let (f1, f2) = self.channel_data(ch).expect("channel in range");
            let mut v = Vec::with_capacity(f1.len() + f2.len());
            v.extend_from_slice(f1);
            v.extend_from_slice(f2);
            payload.push(v);
        }
        OwnedSamplesData { payload }
    }
}

/// Owned copy of multi-channel sample data, each channel's fragments joined
/// into one contiguous buffer.
#[derive(Debug, Clone)]
pub struct OwnedSamplesData {
    pub payload: Vec<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_wrap_when_request_fits() {
        assert_eq!(compute_spans(100, 50, 4096), (100, 50, 0));
    }

    #[test]
    fn wraps_at_ring_boundary() {
        // buffer_length=4096, request at 4090 for 10 samples wraps at 4096.
        assert_eq!(compute_spans(4090, 10, 4096), (4090, 6, 4));
    }

    #[test]
    fn wrap_positions_match_for_identical_inputs() {
        let a = compute_spans(4095, 10, 4096);
        let b = compute_spans(4095, 10, 4096);
        assert_eq!(a, b);
    }
}
