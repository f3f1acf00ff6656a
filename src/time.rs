// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! TAI-based timestamps, rational edit rates, and index/timestamp conversion.
//!
//! Timestamps are nanoseconds since the Unix epoch in the TAI timescale
//! (following SMPTE ST 2059). Hosts without a native TAI clock approximate it
//! by adding [`TAI_OFFSET_SECONDS`] to `CLOCK_REALTIME`.

use std::time::Duration;

/// TAI-UTC offset assumed on hosts without a native TAI clock, in seconds.
///
/// This is a deployment concern (see `SPEC_FULL.md` §9): the core does not
/// track the leap-second table itself, it applies this fixed offset. Override
/// by patching this constant for deployments that track leap seconds
/// out-of-band.
pub const TAI_OFFSET_SECONDS: u64 = 37;

/// Clock source for [`now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Monotonic, not necessarily tied to wall-clock time; unaffected by
    /// system clock adjustments.
    Monotonic,
    /// Wall-clock (UTC-like) time.
    Realtime,
    /// TAI: realtime plus [`TAI_OFFSET_SECONDS`] on hosts without a native
    /// TAI clock.
    Tai,
}

/// Returns a timepoint (nanoseconds since epoch for the given clock) for
/// `clock`.
pub fn now(clock: Clock) -> u64 {
    let id = match clock {
        Clock::Monotonic => libc::CLOCK_MONOTONIC,
        Clock::Realtime => libc::CLOCK_REALTIME,
        Clock::Tai => libc::CLOCK_REALTIME,
    };
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, appropriately sized out-parameter.
    let rc = unsafe { libc::clock_gettime(id, &mut ts) };
    if rc != 0 {
        return 0;
    }
    let ns = ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64;
    match clock {
        Clock::Tai => ns + TAI_OFFSET_SECONDS * 1_000_000_000,
        _ => ns,
    }
}

/// Adds a duration to a timestamp, in nanoseconds.
pub fn add_duration(t_ns: u64, d: Duration) -> u64 {
    t_ns.saturating_add(d.as_nanos() as u64)
}

/// Subtracts a duration from a timestamp, clamping at zero.
pub fn sub_duration(t_ns: u64, d: Duration) -> u64 {
    t_ns.saturating_sub(d.as_nanos() as u64)
}

/// A rational number (numerator/denominator) used for frame and sample
/// rates. `denominator` must be non-zero and both values must be positive
/// for the rate to be valid; [`Rational::is_valid`] checks this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Rational {
    /// Numerator.
    pub numerator: i64,
    /// Denominator.
    pub denominator: i64,
}

impl Rational {
    /// Constructs a new rational rate.
    pub const fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// A rate is valid if both numerator and denominator are strictly
    /// positive.
    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// The period of one unit at this rate, in nanoseconds (as a rational to
    /// avoid losing precision): `denominator * 1e9 / numerator`.
    pub fn period_ns(&self) -> Option<u128> {
        if !self.is_valid() {
            return None;
        }
        Some((self.denominator as u128 * 1_000_000_000) / self.numerator as u128)
    }
}

/// Sentinel index returned by [`timestamp_to_index`] for an invalid rate.
pub const INVALID_INDEX: u64 = u64::MAX;

/// Sentinel timestamp returned by [`index_to_timestamp`] for an invalid rate.
pub const INVALID_TIMESTAMP: u64 = u64::MAX;

/// Converts a TAI timestamp to an index at the given rate:
/// `round(t_ns * numerator / (denominator * 1e9))`, computed with a 128-bit
/// intermediate to avoid overflow across the full `u64` timestamp range.
///
/// Returns [`INVALID_INDEX`] if `rate` is invalid.
pub fn timestamp_to_index(rate: &Rational, t_ns: u64) -> u64 {
    if !rate.is_valid() {
        return INVALID_INDEX;
    }
    let num = t_ns as u128 * rate.numerator as u128;
    let den = rate.denominator as u128 * 1_000_000_000u128;
    round_div_u128(num, den) as u64
}

/// Converts an index to a TAI timestamp at the given rate: the inverse of
/// [`timestamp_to_index`], with symmetric rounding.
///
/// Returns [`INVALID_TIMESTAMP`] if `rate` is invalid.
pub fn index_to_timestamp(rate: &Rational, index: u64) -> u64 {
    if !rate.is_valid() {
        return INVALID_TIMESTAMP;
    }
    let num = index as u128 * rate.denominator as u128 * 1_000_000_000u128;
    let den = rate.numerator as u128;
    round_div_u128(num, den) as u64
}

/// Nanoseconds until `index` becomes current at `rate`, relative to `now_ns`.
/// Returns `None` if the rate is invalid.
pub fn ns_until_index(index: u64, rate: &Rational, now_ns: u64) -> Option<u64> {
    if !rate.is_valid() {
        return None;
    }
    let target = index_to_timestamp(rate, index);
    Some(target.saturating_sub(now_ns))
}

/// Rounds `num / den` to the nearest integer (ties away from zero is
/// unreachable here since both operands are non-negative; ties round up).
fn round_div_u128(num: u128, den: u128) -> u128 {
    if den == 0 {
        return 0;
    }
    (num + den / 2) / den
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_validity() {
        assert!(Rational::new(30, 1).is_valid());
        assert!(!Rational::new(0, 1).is_valid());
        assert!(!Rational::new(30, 0).is_valid());
        assert!(!Rational::new(-1, 1).is_valid());
    }

    #[test]
    fn round_trip_stable_for_common_rates() {
        let rates = [
            Rational::new(30000, 1001),
            Rational::new(25, 1),
            Rational::new(48000, 1),
            Rational::new(60, 1),
        ];
        for rate in rates {
            let period = rate.period_ns().unwrap();
            for t in [0u64, 1, 1_000_000, 1_000_000_000_000, 1u64 << 47] {
                let idx = timestamp_to_index(&rate, t);
                let back = index_to_timestamp(&rate, idx);
                let diff = back.abs_diff(t) as u128;
                assert!(
                    diff * 2 <= period,
                    "rate={rate:?} t={t} idx={idx} back={back} diff={diff} period={period}"
                );
            }
        }
    }

    #[test]
    fn invalid_rate_yields_sentinels() {
        let bad = Rational::new(0, 1);
        assert_eq!(timestamp_to_index(&bad, 1000), INVALID_INDEX);
        assert_eq!(index_to_timestamp(&bad, 1000), INVALID_TIMESTAMP);
    }

    #[test]
    fn duration_clamps_at_zero() {
        assert_eq!(sub_duration(5, Duration::from_nanos(10)), 0);
    }
}
