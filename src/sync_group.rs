// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Synchronization group: sequentially waits for data to arrive across a set
//! of readers from possibly distinct flows (`SPEC_FULL.md` §4.7).
//!
//! The group is intentionally sequential rather than parallel per §4.7: the
//! latency of the slowest flow dominates, and joining N independent waits
//! into one would require a primitive this core does not provide.

use std::time::Instant;

use crate::error::Result;
use crate::grain::GrainReader;
use crate::samples::SamplesReader;
use crate::time::{self, Rational};

enum Entry {
    Discrete {
        reader: GrainReader,
        min_valid_slices: u32,
        max_observed_delay_ns: u64,
    },
    Continuous {
        reader: SamplesReader,
        sample_count: u64,
        max_observed_delay_ns: u64,
    },
}

impl Entry {
    fn rate(&self) -> Rational {
        match self {
            Entry::Discrete { reader, .. } => reader.header_view().common().rate,
            Entry::Continuous { reader, .. } => reader.header_view().common().rate,
        }
    }

    fn max_observed_delay_ns(&self) -> u64 {
        match self {
            Entry::Discrete {
                max_observed_delay_ns,
                ..
            } => *max_observed_delay_ns,
            Entry::Continuous {
                max_observed_delay_ns,
                ..
            } => *max_observed_delay_ns,
        }
    }

    /// Waits for this entry's target index to become available, then
    /// updates its max-observed-delay upward per §4.7 step 4.
    fn wait(&mut self, origin_time_ns: u64, deadline: Instant) -> Result<()> {
        let rate = self.rate();
        let period_ns = rate.period_ns().unwrap_or(1).max(1) as u64;
        let base_index = time::timestamp_to_index(&rate, origin_time_ns);
        let k = base_index.saturating_add(self.max_observed_delay_ns() / period_ns);

        match self {
            Entry::Discrete {
                reader,
                min_valid_slices,
                max_observed_delay_ns,
            } => {
                let grain = reader.get_grain(k, *min_valid_slices, deadline)?;
                let observed = grain.header.origin_timestamp;
                let gap = observed.abs_diff(origin_time_ns);
                if gap > *max_observed_delay_ns {
                    *max_observed_delay_ns = gap;
                }
            }
            Entry::Continuous {
                reader,
                sample_count,
                max_observed_delay_ns,
            } => {
                reader.get_samples(k, *sample_count, deadline)?;
                let observed = reader.header_view().last_write_time();
                let gap = observed.abs_diff(origin_time_ns);
                if gap > *max_observed_delay_ns {
                    *max_observed_delay_ns = gap;
                }
            }
        }
        Ok(())
    }
}

/// A group of readers waited on together against a common origin timestamp.
///
/// Typical use: one discrete (video) reader plus one continuous (audio)
/// reader for a paired essence pair, so a caller can request "give me the
/// frame and samples for this instant" as a single blocking call.
#[derive(Default)]
pub struct SyncGroup {
    entries: Vec<Entry>,
}

impl SyncGroup {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a discrete (grain) reader to the group, requiring at least
    /// `min_valid_slices` committed before its wait is satisfied.
    pub fn add_discrete_reader(&mut self, reader: GrainReader, min_valid_slices: u32) {
        self.entries.push(Entry::Discrete {
            reader,
            min_valid_slices,
            max_observed_delay_ns: 0,
        });
    }

    /// Adds a continuous (sample) reader to the group, requesting
    /// `sample_count` samples per wait.
    pub fn add_continuous_reader(&mut self, reader: SamplesReader, sample_count: u64) {
        self.entries.push(Entry::Continuous {
            reader,
            sample_count,
            max_observed_delay_ns: 0,
        });
    }

    /// Waits until every member reader has data available for `origin_time_ns`
    /// (adjusted by each entry's own observed delay), or the deadline expires.
    ///
    /// On any member error other than `TooEarly`, returns that error
    /// immediately. On `TooEarly` past the deadline, returns `TooEarly`.
    pub fn wait_for_data_at(&mut self, origin_time_ns: u64, deadline: Instant) -> Result<()> {
        for entry in &mut self.entries {
            entry.wait(origin_time_ns, deadline)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
