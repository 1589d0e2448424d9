#![forbid(unsafe_code)]

//! Single-threaded host event loop.
//!
//! [`EventLoop`] is the concrete [`TimerHost`]: a timer heap ordered by
//! `(deadline, registration order)` plus paint-frame alignment. The embedding
//! drives it explicitly; nothing runs unless the host calls
//! [`run_due`](EventLoop::run_due), [`advance`](EventLoop::advance), or
//! [`run_until_idle`](EventLoop::run_until_idle).
//!
//! # Frames
//!
//! [`request_frame`](TimerHost::request_frame) schedules a task at the next
//! frame boundary strictly after the current time, where boundaries are the
//! multiples of the frame interval (16 ms by default).
//!
//! # Invariants
//!
//! 1. **Ordering**: tasks run in deadline order; equal deadlines run in the
//!    order they were registered.
//! 2. **No reentrancy hazard**: no internal borrow is held while a task runs,
//!    so tasks may schedule further tasks.
//! 3. **Clock discipline**: while a task runs, the clock reads that task's
//!    deadline (for [`ManualClock`]) or later (for a real clock).
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use pacer_runtime::{EventLoop, ManualClock, TimerHost};
//!
//! let host = EventLoop::new(ManualClock::new());
//! let hits = Rc::new(Cell::new(0));
//! let h = Rc::clone(&hits);
//! host.defer(Duration::from_millis(10), Box::new(move || h.set(h.get() + 1)));
//!
//! host.advance(Duration::from_millis(9));
//! assert_eq!(hits.get(), 0);
//! host.advance(Duration::from_millis(1));
//! assert_eq!(hits.get(), 1);
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

use pacer_core::PacerConfig;
use pacer_core::config::DEFAULT_FRAME_INTERVAL;
use tracing::trace;

use crate::clock::{ManualClock, MonoClock};
use crate::host::{Task, TimerHost};

/// Default cap on turns for [`EventLoop::run_until_idle`].
pub const DEFAULT_MAX_TURNS: usize = 100_000;

/// What kind of wait scheduled a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// `defer(delay, ..)`.
    Deferred,
    /// `request_frame(..)`.
    Frame,
}

struct Timer {
    due: Duration,
    seq: u64,
    kind: TimerKind,
    task: Task,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (due, seq) pops first.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct LoopState {
    timers: BinaryHeap<Timer>,
    next_seq: u64,
    frames_run: u64,
}

/// Outcome of [`EventLoop::run_until_idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    /// Tasks run.
    pub turns: usize,
    /// Clock reading when the loop stopped.
    pub now: Duration,
    /// True if the turn cap was hit with tasks still pending.
    pub exhausted: bool,
}

/// Host-driven timer loop.
pub struct EventLoop<C: MonoClock = ManualClock> {
    clock: C,
    frame_interval: Duration,
    state: RefCell<LoopState>,
}

impl<C: MonoClock> fmt::Debug for EventLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventLoop")
            .field("now", &self.clock.now_mono())
            .field("frame_interval", &self.frame_interval)
            .field("pending", &state.timers.len())
            .field("frames_run", &state.frames_run)
            .finish()
    }
}

impl<C: MonoClock> EventLoop<C> {
    /// Create a loop with the default 16 ms frame interval.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self::with_frame_interval(clock, DEFAULT_FRAME_INTERVAL)
    }

    /// Create a loop with a custom frame interval. A zero interval is
    /// treated as 1 ns so frames still land strictly in the future.
    #[must_use]
    pub fn with_frame_interval(clock: C, frame_interval: Duration) -> Self {
        Self {
            clock,
            frame_interval: frame_interval.max(Duration::from_nanos(1)),
            state: RefCell::new(LoopState::default()),
        }
    }

    /// Create a loop using the frame interval from `config`.
    #[must_use]
    pub fn from_config(clock: C, config: &PacerConfig) -> Self {
        Self::with_frame_interval(clock, config.frame_interval)
    }

    /// The underlying clock.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Paint-frame interval.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Number of scheduled, not yet run, tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Deadline of the earliest scheduled task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.state.borrow().timers.peek().map(|t| t.due)
    }

    /// Number of frame tasks run so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.state.borrow().frames_run
    }

    /// First frame boundary strictly after `now`.
    #[must_use]
    pub fn next_frame_boundary(&self, now: Duration) -> Duration {
        let interval = self.frame_interval.as_nanos();
        let frames = now.as_nanos() / interval + 1;
        let nanos = frames.saturating_mul(interval);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Run every task due at the current time, including tasks those tasks
    /// schedule with zero delay. Returns the number of tasks run.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some(timer) = self.pop_due(self.clock.now_mono()) {
            self.run_timer(timer);
            ran += 1;
        }
        ran
    }

    /// Move time forward by `dt`, running every task whose deadline falls in
    /// the window, in order. Returns the number of tasks run.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.clock.now_mono().saturating_add(dt);
        let mut ran = 0;
        while let Some(timer) = self.pop_due(target) {
            self.clock.wait_until(timer.due);
            self.run_timer(timer);
            ran += 1;
        }
        self.clock.wait_until(target);
        ran
    }

    /// Wait for and run tasks until none remain or `max_turns` have run.
    pub fn run_until_idle(&self, max_turns: usize) -> LoopReport {
        let mut turns = 0;
        while turns < max_turns {
            let Some(due) = self.next_deadline() else {
                break;
            };
            self.clock.wait_until(due);
            if let Some(timer) = self.pop_due(self.clock.now_mono()) {
                self.run_timer(timer);
                turns += 1;
            }
        }
        LoopReport {
            turns,
            now: self.clock.now_mono(),
            exhausted: turns == max_turns && self.pending_tasks() > 0,
        }
    }

    fn pop_due(&self, limit: Duration) -> Option<Timer> {
        let mut state = self.state.borrow_mut();
        if state.timers.peek().is_some_and(|t| t.due <= limit) {
            state.timers.pop()
        } else {
            None
        }
    }

    fn run_timer(&self, timer: Timer) {
        trace!(due = ?timer.due, seq = timer.seq, kind = ?timer.kind, "event loop turn");
        if timer.kind == TimerKind::Frame {
            self.state.borrow_mut().frames_run += 1;
        }
        (timer.task)();
    }

    fn push(&self, due: Duration, kind: TimerKind, task: Task) {
        let mut state = self.state.borrow_mut();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.timers.push(Timer {
            due,
            seq,
            kind,
            task,
        });
    }
}

impl<C: MonoClock> TimerHost for EventLoop<C> {
    fn now(&self) -> Duration {
        self.clock.now_mono()
    }

    fn defer(&self, delay: Duration, task: Task) {
        let due = self.clock.now_mono().saturating_add(delay);
        self.push(due, TimerKind::Deferred, task);
    }

    fn request_frame(&self, task: Task) {
        let due = self.next_frame_boundary(self.clock.now_mono());
        self.push(due, TimerKind::Frame, task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let make = move |name: &'static str| -> Task {
            let l = Rc::clone(&l);
            Box::new(move || l.borrow_mut().push(name))
        };
        (log, make)
    }

    #[test]
    fn tasks_run_in_deadline_order() {
        let host = EventLoop::new(ManualClock::new());
        let (log, task) = recorder();
        host.defer(ms(30), task("c"));
        host.defer(ms(10), task("a"));
        host.defer(ms(20), task("b"));

        let report = host.run_until_idle(DEFAULT_MAX_TURNS);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(report.turns, 3);
        assert_eq!(report.now, ms(30));
        assert!(!report.exhausted);
    }

    #[test]
    fn equal_deadlines_keep_registration_order() {
        let host = EventLoop::new(ManualClock::new());
        let (log, task) = recorder();
        for name in ["first", "second", "third"] {
            host.defer(ms(5), task(name));
        }
        host.advance(ms(5));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn zero_delay_defers_until_run_due() {
        let host = EventLoop::new(ManualClock::new());
        let (log, task) = recorder();
        host.defer(Duration::ZERO, task("now"));
        assert!(log.borrow().is_empty());
        assert_eq!(host.run_due(), 1);
        assert_eq!(*log.borrow(), vec!["now"]);
    }

    #[test]
    fn advance_sets_clock_to_each_deadline() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        for delay in [7, 3] {
            let h = Rc::clone(&host);
            let s = Rc::clone(&seen);
            host.defer(ms(delay), Box::new(move || s.borrow_mut().push(h.now())));
        }
        host.advance(ms(50));
        assert_eq!(*seen.borrow(), vec![ms(3), ms(7)]);
        assert_eq!(host.now(), ms(50));
    }

    #[test]
    fn tasks_can_schedule_tasks() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let (log, task) = recorder();
        let h = Rc::clone(&host);
        let follow_up = task("follow-up");
        host.defer(
            ms(1),
            Box::new(move || h.defer(ms(1), follow_up)),
        );
        host.advance(ms(1));
        assert!(log.borrow().is_empty());
        host.advance(ms(1));
        assert_eq!(*log.borrow(), vec!["follow-up"]);
    }

    #[test]
    fn frames_align_to_next_boundary() {
        let host = EventLoop::with_frame_interval(ManualClock::new(), ms(16));
        assert_eq!(host.next_frame_boundary(Duration::ZERO), ms(16));
        assert_eq!(host.next_frame_boundary(ms(15)), ms(16));
        assert_eq!(host.next_frame_boundary(ms(16)), ms(32));

        host.clock().set(ms(20));
        let (log, task) = recorder();
        host.request_frame(task("paint"));
        assert_eq!(host.next_deadline(), Some(ms(32)));
        host.advance(ms(11));
        assert!(log.borrow().is_empty());
        host.advance(ms(1));
        assert_eq!(*log.borrow(), vec!["paint"]);
        assert_eq!(host.frames_run(), 1);
    }

    #[test]
    fn turn_cap_reports_exhaustion() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));

        fn reschedule(host: Rc<EventLoop>) {
            let h = Rc::clone(&host);
            host.defer(Duration::from_millis(1), Box::new(move || reschedule(h)));
        }
        reschedule(Rc::clone(&host));

        let report = host.run_until_idle(10);
        assert_eq!(report.turns, 10);
        assert!(report.exhausted);
        assert_eq!(host.pending_tasks(), 1);
    }

    #[test]
    fn from_config_uses_frame_interval() {
        let config = PacerConfig::new().with_frame_interval(ms(33));
        let host = EventLoop::from_config(ManualClock::new(), &config);
        assert_eq!(host.frame_interval(), ms(33));
    }
}
