// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Cross-process wait/wake primitive on a 32-bit shared-memory word.
//!
//! Readers wait on the flow's sync counter without needing write access to
//! the page it lives on; writers bump the counter and wake everyone parked
//! on it. On Linux this is the kernel futex syscall, which tolerates
//! waiters holding only a read-only mapping of the word (the kernel only
//! ever reads it to validate `expected`). Other targets degrade to a bounded
//! exponential-backoff poll, as noted in `SPEC_FULL.md` §9.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Increments the counter by one with release ordering and wakes every
/// waiter currently parked on it.
///
/// The release store guarantees that any shared-memory writes preceding
/// this call (e.g. a grain's slice payload, or its committed-slice count)
/// are visible to any thread that observes the new counter value via
/// [`wait_until_changed`]'s acquire load.
pub fn bump_and_wake(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Release);
    wake_all(counter);
}

/// Wakes every waiter parked on `counter`.
pub fn wake_all(counter: &AtomicU32) {
    futex_wake(counter);
}

/// Blocks until `counter` differs from `expected` or `deadline` elapses.
///
/// Returns `true` if the counter changed, `false` on deadline expiry. The
/// load establishing `expected != counter.load()` uses acquire ordering, so
/// a `true` return value makes all writes preceding the matching
/// [`bump_and_wake`] visible to the caller.
pub fn wait_until_changed(counter: &AtomicU32, expected: u32, deadline: Instant) -> bool {
    loop {
        let current = counter.load(Ordering::Acquire);
        if current != expected {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let remaining = deadline - now;
        futex_wait(counter, expected, remaining);
        // Either we were woken, spuriously woken, or the OS-level wait
        // timed out short of `deadline` (e.g. on the polling fallback) —
        // loop back around and re-check the deadline ourselves.
    }
}

#[cfg(target_os = "linux")]
fn futex_wait(counter: &AtomicU32, expected: u32, timeout: Duration) {
    let ts = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as i64,
    };
    // SAFETY: `counter` is a valid aligned `u32` for the lifetime of this
    // call; the futex syscall only inspects memory, so this is sound even
    // through a read-only mapping.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            counter as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            &ts as *const libc::timespec,
            std::ptr::null::<u32>(),
            0,
        );
    }
    // Ignore the return value: EAGAIN (value already changed), ETIMEDOUT,
    // and EINTR are all handled by the caller's re-check loop.
}

#[cfg(target_os = "linux")]
fn futex_wake(counter: &AtomicU32) {
    // SAFETY: see `futex_wait`.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            counter as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0,
        );
    }
}

/// Polling fallback for platforms without a read-only-friendly futex.
#[cfg(not(target_os = "linux"))]
fn futex_wait(counter: &AtomicU32, expected: u32, timeout: Duration) {
    let start = Instant::now();
    let mut backoff = Duration::from_micros(50);
    const MAX_BACKOFF: Duration = Duration::from_millis(5);
    while counter.load(Ordering::Acquire) == expected {
        if start.elapsed() >= timeout {
            return;
        }
        std::thread::sleep(backoff.min(timeout.saturating_sub(start.elapsed())));
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wake(_counter: &AtomicU32) {
    // No-op: pollers will observe the new value on their next spin.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn wake_progress_within_deadline() {
        let counter = Arc::new(AtomicU32::new(0));
        let reader_counter = counter.clone();
        let handle = std::thread::spawn(move || {
            let expected = reader_counter.load(Ordering::Acquire);
            wait_until_changed(
                &reader_counter,
                expected,
                Instant::now() + Duration::from_secs(5),
            )
        });
        std::thread::sleep(Duration::from_millis(20));
        bump_and_wake(&counter);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn deadline_expires_without_change() {
        let counter = AtomicU32::new(0);
        let woke = wait_until_changed(&counter, 0, Instant::now() + Duration::from_millis(20));
        assert!(!woke);
    }

    #[test]
    fn survives_multiple_commits_between_waits() {
        let counter = AtomicU32::new(0);
        for _ in 0..5 {
            bump_and_wake(&counter);
        }
        // A waiter capturing the stale initial value still makes progress
        // immediately, without needing to catch every individual wake.
        let woke = wait_until_changed(&counter, 0, Instant::now() + Duration::from_secs(1));
        assert!(woke);
    }
}
