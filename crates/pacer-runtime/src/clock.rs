#![forbid(unsafe_code)]

//! Monotonic clocks for the host event loop.
//!
//! Time is a [`Duration`] since the clock's own epoch. Two implementations:
//!
//! - [`ManualClock`]: deterministic, controlled by the caller. Waiting jumps
//!   time forward instantly, so tests never sleep.
//! - [`SystemClock`]: backed by `std::time::Instant`. Waiting sleeps the
//!   current thread.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic time source that can also wait for a deadline.
pub trait MonoClock {
    /// Current monotonic time since the clock's epoch.
    fn now_mono(&self) -> Duration;

    /// Block (or jump) until `now_mono() >= deadline`. Deadlines in the past
    /// return immediately.
    fn wait_until(&self, deadline: Duration);
}

/// Deterministic monotonic clock controlled by the host.
///
/// Time never moves backward: [`set`](Self::set) and
/// [`wait_until`](MonoClock::wait_until) ignore earlier instants.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
        }
    }

    /// Create a clock starting at `start`.
    #[must_use]
    pub const fn starting_at(start: Duration) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Set current monotonic time. Earlier instants are ignored.
    pub fn set(&self, now: Duration) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&self, dt: Duration) {
        self.now.set(self.now.get().saturating_add(dt));
    }
}

impl MonoClock for ManualClock {
    fn now_mono(&self) -> Duration {
        self.now.get()
    }

    fn wait_until(&self, deadline: Duration) {
        self.set(deadline);
    }
}

/// Monotonic clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoClock for SystemClock {
    fn now_mono(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn wait_until(&self, deadline: Duration) {
        let now = self.now_mono();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}
