// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Reader for continuous media (audio sample streams).

use std::time::Instant;

use crate::error::{Error, Result};
use crate::flow_data::{self, ContinuousFlowData};
use crate::header::HeaderView;
use crate::wait;

use super::data::{SampleGeometry, SamplesData, compute_spans};

/// Reader handle for a continuous flow.
pub struct SamplesReader {
    data: ContinuousFlowData,
}

impl SamplesReader {
    pub(crate) fn new(data: ContinuousFlowData) -> Self {
        Self { data }
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        self.data.header_view()
    }

    pub fn head_index(&self) -> u64 {
        self.data.header_view().head_index()
    }

    /// Blocking read of `count` samples starting at `index`, per §4.6
    /// `getSamples`. `count` must be at most `bufferLength / 2` (I4, P6).
    pub fn get_samples(&self, index: u64, count: u64, deadline: Instant) -> Result<SamplesData<'_>> {
        loop {
            match self.try_get_samples(index, count)? {
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

    /// Non-blocking variant.
    pub fn get_samples_non_blocking(&self, index: u64, count: u64) -> Result<Option<SamplesData<'_>>> {
        self.try_get_samples(index, count)
    }

    fn try_get_samples(&self, index: u64, count: u64) -> Result<Option<SamplesData<'_>>> {
        let cfg = self.data.header_view().continuous_config();
        let half = cfg.buffer_length / 2;
        if count > half {
            return Err(Error::InvalidArgument(format!(
                "count {} exceeds half the buffer length {}",
                count, cfg.buffer_length
            )));
        }

        self.data.check_stale()?;

        let head = self.data.header_view().head_index();
        let tail = if head >= half { head - half + 1 } else { 0 };
        if index.saturating_add(count) <= tail {
            return Err(Error::TooLate);
        }

        if index.saturating_add(count) > head + 1 {
            return Ok(None);
        }

        let (slot_start, first_count, second_count) = compute_spans(index, count, cfg.buffer_length);
        let geometry = SampleGeometry {
            channel_count: cfg.channel_count,
            sample_word_size: cfg.sample_word_size,
            buffer_length: cfg.buffer_length,
            slot_start,
            first_count,
            second_count,
        };

        flow_data::touch_access_file(self.data.flow_dir());

        Ok(Some(SamplesData::new(self.data.channels().bytes(), geometry)))
    }
}
