// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Domain-level and per-flow creation options (`SPEC_FULL.md` §0, §4.11, §6).

use serde::{Deserialize, Serialize};

use crate::header::PayloadLocation as HeaderPayloadLocation;

fn default_batch_hint() -> u32 {
    1
}

/// Where payload bytes physically live. Mirrors [`HeaderPayloadLocation`]
/// but as a serde-friendly, string-tagged type for the JSON options surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadLocation {
    HostMemory,
    DeviceMemory,
}

impl Default for PayloadLocation {
    fn default() -> Self {
        PayloadLocation::HostMemory
    }
}

impl From<PayloadLocation> for HeaderPayloadLocation {
    fn from(v: PayloadLocation) -> Self {
        match v {
            PayloadLocation::HostMemory => HeaderPayloadLocation::HostMemory,
            PayloadLocation::DeviceMemory => HeaderPayloadLocation::DeviceMemory,
        }
    }
}

/// Domain-level defaults, parsed from `<domain>/options.json` when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainOptions {
    /// Default ring-sizing horizon; per-flow grain count / buffer length are
    /// derived from this when a creation call does not supply an explicit
    /// count (§6).
    #[serde(default)]
    pub history_duration_ns: Option<u64>,

    #[serde(default = "default_batch_hint")]
    pub max_commit_batch_size_hint: u32,

    #[serde(default = "default_batch_hint")]
    pub max_sync_batch_size_hint: u32,

    #[serde(default)]
    pub payload_location: PayloadLocation,
}

impl DomainOptions {
    /// Loads `options.json` from a domain directory, defaulting if absent.
    pub fn load(domain: &std::path::Path) -> crate::error::Result<Self> {
        let path = crate::layout::domain_options_path(domain);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(crate::error::Error::Io(e)),
        }
    }
}

/// Per-flow creation options, overriding any [`DomainOptions`] default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowCreateOptions {
    #[serde(default)]
    pub max_commit_batch_size_hint: Option<u32>,

    #[serde(default)]
    pub max_sync_batch_size_hint: Option<u32>,

    #[serde(default)]
    pub payload_location: Option<PayloadLocation>,

    /// Explicit ring size, bypassing history-duration derivation.
    #[serde(default)]
    pub grain_count: Option<u64>,

    #[serde(default)]
    pub buffer_length: Option<u64>,
}

impl FlowCreateOptions {
    pub fn commit_hint(&self, domain: &DomainOptions) -> u32 {
        self.max_commit_batch_size_hint
            .unwrap_or(domain.max_commit_batch_size_hint)
            .max(1)
    }

    pub fn sync_hint(&self, domain: &DomainOptions) -> u32 {
        self.max_sync_batch_size_hint
            .unwrap_or(domain.max_sync_batch_size_hint)
            .max(1)
    }

    pub fn payload_location(&self, domain: &DomainOptions) -> PayloadLocation {
        self.payload_location.unwrap_or(domain.payload_location)
    }
}

/// Derives a discrete flow's grain count from a history duration and frame
/// period: `ceil(history / framePeriod)`.
pub fn derive_grain_count(history_duration_ns: u64, frame_period_ns: u128) -> u64 {
    let history = history_duration_ns as u128;
    (history.div_ceil(frame_period_ns.max(1))) as u64
}

/// Derives a continuous flow's buffer length (in samples) from a history
/// duration and sample rate: `ceil(history * sampleRate)`.
pub fn derive_buffer_length(history_duration_ns: u64, rate: &crate::time::Rational) -> u64 {
    if !rate.is_valid() {
        return 0;
    }
    let history = history_duration_ns as u128;
    let num = history * rate.numerator as u128;
    let den = rate.denominator as u128 * 1_000_000_000u128;
    num.div_ceil(den.max(1)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Rational;

    #[test]
    fn grain_count_rounds_up() {
        // 30000/1001 fps, period ~= 33366666.67 ns. 1s history.
        let period = Rational::new(30000, 1001).period_ns().unwrap();
        let count = derive_grain_count(1_000_000_000, period);
        assert_eq!(count, 30); // ceil(1e9 / 33366666.67) == 30
    }

    #[test]
    fn buffer_length_rounds_up() {
        let rate = Rational::new(48000, 1);
        let len = derive_buffer_length(21_000_000, &rate); // 21ms
        assert_eq!(len, 1008); // 48000 * 0.021 = 1008 exactly
    }
}
