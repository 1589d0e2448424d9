#![forbid(unsafe_code)]

//! The timer port.
//!
//! Everything in this crate that waits does so through [`TimerHost`]. In a
//! browser-like embedding this maps onto `setTimeout` and
//! `requestAnimationFrame`; in tests it is an [`EventLoop`](crate::EventLoop)
//! over a [`ManualClock`](crate::ManualClock).
//!
//! All hosts are single-threaded: tasks are `'static` but not `Send`, and they
//! run one at a time to completion.

use std::time::Duration;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Deferred-execution capability.
pub trait TimerHost {
    /// Current monotonic time.
    fn now(&self) -> Duration;

    /// Run `task` once `delay` has elapsed. A zero delay still defers: the
    /// task never runs inside this call.
    fn defer(&self, delay: Duration, task: Task);

    /// Run `task` at the next paint frame.
    fn request_frame(&self, task: Task);
}
