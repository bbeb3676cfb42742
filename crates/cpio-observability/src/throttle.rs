//! Lock-free log throttles
//!
//! Each throttle is a single atomic meant to live in a `static` at one log
//! call site, so two call sites never share state. The logging macros
//! declare them automatically.
//!
//! - [`EveryPeriod`]: at most one emission per period. The first caller past
//!   the deadline advances it with a compare-and-swap; losers skip.
//! - [`EveryN`]: emits on calls 1, N+1, 2N+1, ... in the order callers
//!   reserve their ordinal with `fetch_add`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds on a process-local monotonic clock
pub fn monotonic_nanos() -> u64 {
    let anchor = CLOCK_ANCHOR.get_or_init(Instant::now);
    duration_nanos(anchor.elapsed())
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Time-windowed throttle
#[derive(Debug, Default)]
pub struct EveryPeriod {
    /// Monotonic nanos before which nothing is emitted; zero lets the first call through
    next_allowed: AtomicU64,
}

impl EveryPeriod {
    pub const fn new() -> Self {
        Self {
            next_allowed: AtomicU64::new(0),
        }
    }

    /// True if the caller should emit now
    pub fn should_log(&self, period: Duration) -> bool {
        self.should_log_at(monotonic_nanos(), duration_nanos(period))
    }

    /// Same as [`should_log`](Self::should_log) with an explicit clock reading
    pub fn should_log_at(&self, now_nanos: u64, period_nanos: u64) -> bool {
        let next_allowed = self.next_allowed.load(Ordering::Acquire);
        if now_nanos < next_allowed {
            return false;
        }
        self.next_allowed
            .compare_exchange(
                next_allowed,
                now_nanos.saturating_add(period_nanos),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Count-windowed throttle
#[derive(Debug, Default)]
pub struct EveryN {
    calls: AtomicU64,
}

impl EveryN {
    pub const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }

    /// True on calls 1, n+1, 2n+1, ...; `n == 0` behaves like `n == 1`.
    ///
    /// The counter wraps after 2^64 calls.
    pub fn should_log(&self, n: u64) -> bool {
        let ordinal = self.calls.fetch_add(1, Ordering::Relaxed);
        n <= 1 || ordinal % n == 0
    }

    /// Calls observed so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
