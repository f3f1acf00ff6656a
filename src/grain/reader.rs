// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Reader for discrete media grains (video frames, data packets).

use std::time::Instant;

use crate::error::{Error, Result};
use crate::flow_data::{self, DiscreteFlowData};
use crate::header::{GrainHeaderView, HeaderView};
use crate::wait;

use super::data::GrainData;

/// Reader handle for a discrete flow.
pub struct GrainReader {
    data: DiscreteFlowData,
}

impl GrainReader {
    pub(crate) fn new(data: DiscreteFlowData) -> Self {
        Self { data }
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        self.data.header_view()
    }

    pub fn grain_count(&self) -> u64 {
        self.data.grain_count()
    }

    pub fn head_index(&self) -> u64 {
        self.data.header_view().head_index()
    }

    /// Blocking read, per `SPEC_FULL.md` §4.5 `getGrain`.
    ///
    /// `min_valid_slices == 0` means "any valid data"; `== total_slices`
    /// means "wait for a fully committed grain". Deadline expiry returns
    /// `OutOfRange.TooEarly`, never a distinct timeout code (§5).
    pub fn get_grain(
        &self,
        index: u64,
        min_valid_slices: u32,
        deadline: Instant,
    ) -> Result<GrainData<'_>> {
        loop {
            match self.try_get_grain(index, min_valid_slices)? {
                Some(data) => return Ok(data),
                None => {
                    let sync_counter = self.data.header_view().sync_counter();
                    let expected = sync_counter.load(std::sync::atomic::Ordering::Acquire);
                    if !wait::wait_until_changed(sync_counter, expected, deadline) {
                        return Err(Error::TooEarly);
                    }
                }
            }
        }
    }

    /// Non-blocking variant: returns `Ok(None)` instead of waiting when the
    /// grain is not yet sufficiently committed.
    pub fn get_grain_non_blocking(
        &self,
        index: u64,
        min_valid_slices: u32,
    ) -> Result<Option<GrainData<'_>>> {
        self.try_get_grain(index, min_valid_slices)
    }

    fn try_get_grain(&self, index: u64, min_valid_slices: u32) -> Result<Option<GrainData<'_>>> {
        self.data.check_stale()?;

        let grain_count = self.data.grain_count();
        let head = self.data.header_view().head_index();
        if index.saturating_add(grain_count) <= head {
            return Err(Error::TooLate);
        }

        let slot = index % grain_count;
        let grain = self.data.grain(slot);
        let view = GrainHeaderView::new(grain.bytes());
        let snapshot = view.snapshot();

        if snapshot.index != index || snapshot.committed_slices < min_valid_slices {
            return Ok(None);
        }

        let valid_bytes = valid_payload_len(&snapshot);
        let payload_start = crate::header::GRAIN_PAYLOAD_OFFSET;
        let payload = &grain.bytes()[payload_start..payload_start + valid_bytes];

        flow_data::touch_access_file(self.data.flow_dir());

        Ok(Some(GrainData {
            payload,
            header: snapshot,
        }))
    }
}

fn valid_payload_len(header: &crate::header::GrainHeader) -> usize {
    if header.total_slices == 0 {
        return 0;
    }
    ((header.payload_size as u64 * header.committed_slices as u64) / header.total_slices as u64)
        as usize
}

#[cfg(test)]
mod tests {
    // End-to-end coverage lives in `tests/discrete_flow.rs`; this module's
    // logic is exercised there against real mmapped files since it has no
    // meaningful behavior in isolation from a `DiscreteFlowData`.
}
