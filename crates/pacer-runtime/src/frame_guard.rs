#![forbid(unsafe_code)]

//! Paint-aligned execution.
//!
//! [`FrameGuard`] defers a single action until after the next paint frame plus
//! the profile's settle delay. It is independent of the [`Scheduler`]: it never
//! touches the queue, the pending set, or the drain state, and it does not
//! deduplicate. Callers that need dedup use
//! [`Scheduler::submit`](crate::Scheduler::submit).
//!
//! Under the `Default` profile the action runs inline.
//!
//! [`Scheduler`]: crate::Scheduler

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use pacer_core::{DelayPolicy, RuntimeProfile};
use tracing::{trace, warn};

use crate::error::{Action, OperationError, infallible, run_guarded};
use crate::host::TimerHost;
use crate::scheduler::Scheduler;

/// Counters for frame-guarded actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameGuardStats {
    /// Actions handed to `run_after_paint`.
    pub requested: u64,
    /// Actions that have run (inline or deferred).
    pub ran: u64,
    /// Actions that returned `Err` or panicked.
    pub failed: u64,
}

/// Queue-independent, paint-aligned execution channel.
#[derive(Clone)]
pub struct FrameGuard {
    profile: RuntimeProfile,
    settle: Duration,
    host: Rc<dyn TimerHost>,
    stats: Rc<Cell<FrameGuardStats>>,
}

impl std::fmt::Debug for FrameGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("profile", &self.profile)
            .field("settle", &self.settle)
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl FrameGuard {
    /// Frame guard for `profile` on `host`.
    #[must_use]
    pub fn new(host: Rc<dyn TimerHost>, profile: RuntimeProfile) -> Self {
        Self {
            profile,
            settle: DelayPolicy::lookup(profile).frame_settle_delay,
            host,
            stats: Rc::new(Cell::new(FrameGuardStats::default())),
        }
    }

    /// Frame guard sharing a scheduler's host and profile (but none of its state).
    #[must_use]
    pub fn for_scheduler(scheduler: &Scheduler) -> Self {
        Self::new(Rc::clone(scheduler.host()), scheduler.profile())
    }

    /// Settle delay applied after the paint frame.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    #[must_use]
    pub fn stats(&self) -> FrameGuardStats {
        self.stats.get()
    }

    /// Run `action` after the next paint plus the settle delay.
    pub fn run_after_paint<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.schedule(infallible(action));
    }

    /// Like [`run_after_paint`](Self::run_after_paint) for an action whose
    /// `Err` result counts as a failure.
    pub fn run_after_paint_fallible<F>(&self, action: F)
    where
        F: FnOnce() -> Result<(), OperationError> + 'static,
    {
        self.schedule(Box::new(action));
    }

    fn schedule(&self, action: Action) {
        bump(&self.stats, |s| s.requested += 1);

        if !self.profile.is_paced() {
            run_counted(&self.stats, action);
            return;
        }

        let weak_host = Rc::downgrade(&self.host);
        let stats = Rc::clone(&self.stats);
        let settle = self.settle;
        self.host.request_frame(Box::new(move || {
            let Some(host) = weak_host.upgrade() else {
                return;
            };
            trace!(settle_ms = settle.as_millis() as u64, "frame painted, settling");
            host.defer(settle, Box::new(move || run_counted(&stats, action)));
        }));
    }
}

fn bump(stats: &Cell<FrameGuardStats>, f: impl FnOnce(&mut FrameGuardStats)) {
    let mut s = stats.get();
    f(&mut s);
    stats.set(s);
}

fn run_counted(stats: &Cell<FrameGuardStats>, action: Action) {
    let outcome = run_guarded(action);
    bump(stats, |s| s.ran += 1);
    if let Err(error) = outcome {
        bump(stats, |s| s.failed += 1);
        warn!(%error, "frame-guarded action failed");
    }
}
