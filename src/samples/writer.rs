// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Writer for continuous media (audio sample streams).

use crate::error::{Error, Result};
use crate::flow_data::ContinuousFlowData;
use crate::header::HeaderView;

use super::data::{SampleGeometry, compute_spans};
use super::write_access::SamplesWriteAccess;

/// Writer handle for a continuous flow.
///
/// Only one [`SamplesWriteAccess`] may be open at a time, enforced by
/// borrowing `self` mutably for the session's lifetime (§4.6).
pub struct SamplesWriter {
    data: ContinuousFlowData,
}

impl SamplesWriter {
    pub(crate) fn new(data: ContinuousFlowData) -> Self {
        Self { data }
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        self.data.header_view()
    }

    /// Opens `[index, index + count)` for writing.
    ///
    /// `count` must be at most `bufferLength / 2` (I4); larger requests
    /// return `InvalidArgument` without touching any payload bytes (P6).
    pub fn open_samples(&mut self, index: u64, count: u64) -> Result<SamplesWriteAccess<'_>> {
        let cfg = self.data.header_view().continuous_config();
        if count > cfg.buffer_length / 2 {
            return Err(Error::InvalidArgument(format!(
                "count {} exceeds half the buffer length {}",
                count, cfg.buffer_length
            )));
        }

        let (slot_start, first_count, second_count) =
            compute_spans(index, count, cfg.buffer_length);
        let geometry = SampleGeometry {
            channel_count: cfg.channel_count,
            sample_word_size: cfg.sample_word_size,
            buffer_length: cfg.buffer_length,
            slot_start,
            first_count,
            second_count,
        };

        let (header_view, channels) = self.data.header_view_and_channels_mut();
        let head_index = header_view.head_index_atomic();
        let last_write_time = header_view.last_write_time_atomic();
        let sync_counter = header_view.sync_counter();

        Ok(SamplesWriteAccess::new(
            channels,
            head_index,
            last_write_time,
            sync_counter,
            geometry,
            index,
            count,
        ))
    }
}
