//! Event timestamps
//!
//! Events carry nanoseconds on the monotonic clock, the same base as
//! `bpf_ktime_get_ns()`, so records from both backends order together.

/// Source of event timestamps
pub trait Clock {
    /// Current monotonic time in nanoseconds
    fn now_ns(&self) -> u64;
}

/// `CLOCK_MONOTONIC`, matching `bpf_ktime_get_ns()`
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[allow(unsafe_code, clippy::cast_sign_loss)]
    fn now_ns(&self) -> u64 {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: `ts` is a valid, writable timespec. CLOCK_MONOTONIC is
        // always supported on Linux, so the call cannot fail.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
    }
}
