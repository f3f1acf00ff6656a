// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Writer for discrete media grains (video frames, data packets).

use crate::error::{Error, Result};
use crate::flow_data::DiscreteFlowData;
use crate::header::{GRAIN_INDEX_NEVER_WRITTEN, GrainHeaderView, GrainHeaderViewMut, HeaderView};

use super::write_access::GrainWriteAccess;

/// Writer handle for a discrete flow, producing grains by index.
///
/// Only one [`GrainWriteAccess`] may be open at a time; this is enforced by
/// borrowing `self` mutably for the duration of the session (§4.5).
pub struct GrainWriter {
    data: DiscreteFlowData,
}

impl GrainWriter {
    pub(crate) fn new(data: DiscreteFlowData) -> Self {
        Self { data }
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        self.data.header_view()
    }

    pub fn grain_count(&self) -> u64 {
        self.data.grain_count()
    }

    /// Opens the grain at `index` for writing.
    ///
    /// Computes `slot = index mod grainCount`. If that slot already holds a
    /// committed grain whose recorded index is `>= index` (i.e. the ring has
    /// already moved past this index), fails with `OutOfRange.TooEarly` per
    /// §4.5 rather than silently overwriting newer data.
    pub fn open_grain(&mut self, index: u64) -> Result<GrainWriteAccess<'_>> {
        let grain_count = self.data.grain_count();
        if grain_count == 0 {
            return Err(Error::InvalidArgument("flow has no grains".to_string()));
        }
        let slot = index % grain_count;

        let recorded = GrainHeaderView::new(self.data.grain(slot).bytes()).index();
        if recorded != GRAIN_INDEX_NEVER_WRITTEN && recorded != index && recorded >= index {
            return Err(Error::TooEarly);
        }

        let (header_view, grain_mapping) = self.data.header_view_and_grain_mut(slot);
        let discrete_config = header_view.discrete_config();
        let total_slices = discrete_config.slice_count;
        let payload_size = discrete_config.payload_size;
        let head_index = header_view.head_index_atomic();
        let last_write_time = header_view.last_write_time_atomic();
        let sync_counter = header_view.sync_counter();

        GrainHeaderViewMut::new(grain_mapping.bytes_mut()).begin_open(
            index,
            total_slices,
            payload_size,
        );

        Ok(GrainWriteAccess::new(
            grain_mapping,
            head_index,
            last_write_time,
            sync_counter,
            index,
            total_slices,
            payload_size,
        ))
    }
}
