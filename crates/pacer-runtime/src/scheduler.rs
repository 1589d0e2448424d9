#![forbid(unsafe_code)]

//! Adaptive operation scheduler.
//!
//! [`Scheduler`] accepts short side-effecting operations keyed by an id and,
//! depending on the runtime profile, either runs them inline or queues,
//! deduplicates, and paces them through the host's timers.
//!
//! # Submission Rules
//!
//! | Condition | Outcome | Returns |
//! |-----------|---------|---------|
//! | Profile is `Default` | run inline | `true` |
//! | Id already pending | drop | `false` |
//! | Profile blocks during drain and a drain is running | drop | `false` |
//! | Otherwise | enqueue, start drain if idle | `true` |
//!
//! # Drain State Machine
//!
//! ```text
//!            submit (queue was empty)
//!   Idle ─────────────────────────────► Draining ──┐
//!    ▲     set BlockFlag if blocking        │      │ wait initial_delay
//!    │                                      ▼      │
//!    │   queue empty: clear BlockFlag    ┌──────┐  │
//!    └───────────────────────────────────│ step │◄─┘
//!                                        └──┬───┘
//!                   pop head, run it,       │ ▲
//!                   unmark id (always)      └─┘ wait step_delay
//! ```
//!
//! # Invariants
//!
//! 1. **FIFO**: queued operations run in submission order.
//! 2. **Dedup**: an id is queued or running at most once.
//! 3. **Cleanup**: an id leaves the pending set after its action runs,
//!    whether the action returned `Ok`, `Err`, or panicked.
//! 4. **Block flag**: true exactly while draining under a blocking profile.
//! 5. **Clear wins**: after [`clear`](Scheduler::clear), steps scheduled by an
//!    earlier drain are no-ops (tracked by an epoch counter).
//!
//! # Failure Modes
//!
//! | Mode | Behavior |
//! |------|----------|
//! | Action returns `Err` / panics | Logged, counted, reported to observer; drain continues |
//! | `clear()` from inside an action | The running action finishes; nothing else from the old drain runs |
//! | Scheduler dropped mid-drain | Pending steps find no scheduler and do nothing |
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use std::time::Duration;
//! use pacer_core::RuntimeProfile;
//! use pacer_runtime::{EventLoop, ManualClock, Scheduler};
//!
//! let host = Rc::new(EventLoop::new(ManualClock::new()));
//! let scheduler = Scheduler::new(host.clone(), RuntimeProfile::ConstrainedA);
//!
//! assert!(scheduler.submit("resize", || {}));
//! assert!(!scheduler.submit("resize", || {}));
//! assert_eq!(scheduler.pending_count(), 1);
//!
//! host.run_until_idle(1_000);
//! assert_eq!(scheduler.pending_count(), 0);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use pacer_core::{
    DelayConfig, DelayPolicy, PacerConfig, ProfileDetector, RuntimeProfile, SignatureDetector,
};
use tracing::{debug, info, trace, warn};

use crate::dedup::{OpId, PendingSet};
use crate::error::{
    Action, FailureObserver, FailureReport, OperationError, infallible, run_guarded,
};
use crate::host::TimerHost;
use crate::trace::{RejectReason, ScheduleTrace, TraceEvent};

/// Drain loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainState {
    /// Nothing queued, no step scheduled.
    #[default]
    Idle,
    /// A drain is in progress.
    Draining,
}

/// Counters for scheduler decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Calls to `submit`/`submit_fallible`.
    pub submitted: u64,
    /// Operations run inline (unpaced profile).
    pub ran_inline: u64,
    /// Operations accepted into the queue.
    pub enqueued: u64,
    /// Submissions dropped as duplicates.
    pub rejected_duplicate: u64,
    /// Submissions dropped because a blocking drain was running.
    pub rejected_blocked: u64,
    /// Queued operations whose action ran.
    pub executed: u64,
    /// Actions (inline or queued) that failed.
    pub failed: u64,
    /// Idle -> Draining transitions.
    pub drains_started: u64,
    /// Draining -> Idle transitions caused by an empty queue.
    pub drains_completed: u64,
    /// Calls to `clear`.
    pub clears: u64,
}

impl SchedulerStats {
    /// Total rejected submissions.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected_duplicate + self.rejected_blocked
    }
}

struct Operation {
    id: OpId,
    action: Action,
}

struct State {
    queue: VecDeque<Operation>,
    pending: PendingSet,
    drain: DrainState,
    blocked: bool,
    epoch: u64,
    stats: SchedulerStats,
    trace: ScheduleTrace,
}

struct Inner {
    profile: RuntimeProfile,
    delays: &'static DelayConfig,
    host: Rc<dyn TimerHost>,
    observer: Option<FailureObserver>,
    state: RefCell<State>,
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    host: Rc<dyn TimerHost>,
    config: PacerConfig,
    detector: Box<dyn ProfileDetector>,
    observer: Option<FailureObserver>,
}

impl SchedulerBuilder {
    /// Force the profile (skips detection).
    #[must_use]
    pub fn profile(mut self, profile: RuntimeProfile) -> Self {
        self.config.profile = Some(profile);
        self
    }

    /// Runtime signature to classify when no profile is forced.
    #[must_use]
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.config.signature = Some(signature.into());
        self
    }

    /// Replace the signature classifier.
    #[must_use]
    pub fn detector(mut self, detector: impl ProfileDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Take profile, signature, and trace capacity from `config`.
    #[must_use]
    pub fn config(mut self, config: &PacerConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Trace ring capacity; `0` disables tracing.
    #[must_use]
    pub fn trace_capacity(mut self, capacity: usize) -> Self {
        self.config.trace_capacity = capacity;
        self
    }

    /// Observe failed operations.
    #[must_use]
    pub fn failure_observer(mut self, observer: impl Fn(&FailureReport) + 'static) -> Self {
        self.observer = Some(Rc::new(observer));
        self
    }

    /// Resolve the profile once and build the scheduler.
    #[must_use]
    pub fn build(self) -> Scheduler {
        let profile = self.config.resolve_profile(self.detector.as_ref());
        let delays = DelayPolicy::lookup(profile);
        info!(
            %profile,
            initial_ms = delays.initial_delay.as_millis() as u64,
            step_ms = delays.step_delay.as_millis() as u64,
            blocks = delays.blocks_during_drain,
            "scheduler created"
        );
        Scheduler {
            inner: Rc::new(Inner {
                profile,
                delays,
                host: self.host,
                observer: self.observer,
                state: RefCell::new(State {
                    queue: VecDeque::new(),
                    pending: PendingSet::new(),
                    drain: DrainState::Idle,
                    blocked: false,
                    epoch: 0,
                    stats: SchedulerStats::default(),
                    trace: ScheduleTrace::new(self.config.trace_capacity),
                }),
            }),
        }
    }
}

/// Paced, deduplicating operation scheduler.
///
/// Cloning yields another handle to the same scheduler. Handles are `!Send`:
/// everything runs on the host's single thread.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scheduler")
            .field("profile", &self.inner.profile)
            .field("drain", &state.drain)
            .field("blocked", &state.blocked)
            .field("queued", &state.queue.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl Scheduler {
    /// Start building a scheduler on `host`.
    #[must_use]
    pub fn builder(host: Rc<dyn TimerHost>) -> SchedulerBuilder {
        SchedulerBuilder {
            host,
            config: PacerConfig::default(),
            detector: Box::new(SignatureDetector),
            observer: None,
        }
    }

    /// Scheduler with an injected profile.
    #[must_use]
    pub fn new(host: Rc<dyn TimerHost>, profile: RuntimeProfile) -> Self {
        Self::builder(host).profile(profile).build()
    }

    /// Scheduler whose profile is detected from `signature`.
    #[must_use]
    pub fn detect(host: Rc<dyn TimerHost>, signature: &str) -> Self {
        Self::builder(host).signature(signature).build()
    }

    /// Submit an operation. See the module docs for the decision table.
    pub fn submit<F>(&self, id: impl Into<OpId>, action: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        self.submit_action(id.into(), infallible(action))
    }

    /// Submit an operation whose `Err` result counts as a failure.
    pub fn submit_fallible<F>(&self, id: impl Into<OpId>, action: F) -> bool
    where
        F: FnOnce() -> Result<(), OperationError> + 'static,
    {
        self.submit_action(id.into(), Box::new(action))
    }

    fn submit_action(&self, id: OpId, action: Action) -> bool {
        let inner = &self.inner;
        let now = inner.host.now();

        if !inner.profile.is_paced() {
            {
                let mut state = inner.state.borrow_mut();
                state.stats.submitted += 1;
                state.stats.ran_inline += 1;
                state.trace.record(now, TraceEvent::Inline { id: id.to_string() });
            }
            trace!(%id, "running inline");
            if let Err(error) = run_guarded(action) {
                inner.report_failure(id, error);
            }
            return true;
        }

        let start_epoch = {
            let mut state = inner.state.borrow_mut();
            state.stats.submitted += 1;

            let reject = if state.pending.contains(id.as_str()) {
                state.stats.rejected_duplicate += 1;
                Some(RejectReason::Duplicate)
            } else if state.blocked {
                state.stats.rejected_blocked += 1;
                Some(RejectReason::Blocked)
            } else {
                None
            };
            if let Some(reason) = reject {
                debug!(%id, ?reason, "submission rejected");
                state.trace.record(
                    now,
                    TraceEvent::Rejected {
                        id: id.to_string(),
                        reason,
                    },
                );
                return false;
            }

            state.pending.insert(id.clone());
            state.queue.push_back(Operation {
                id: id.clone(),
                action,
            });
            state.stats.enqueued += 1;
            let queued = state.queue.len();
            state.trace.record(
                now,
                TraceEvent::Enqueued {
                    id: id.to_string(),
                    queued,
                },
            );

            if state.drain == DrainState::Idle {
                state.drain = DrainState::Draining;
                state.blocked = inner.delays.blocks_during_drain;
                state.stats.drains_started += 1;
                let blocking = state.blocked;
                state.trace.record(now, TraceEvent::DrainStarted { blocking });
                debug!(%id, blocking, epoch = state.epoch, "drain started");
                Some(state.epoch)
            } else {
                None
            }
        };

        if let Some(epoch) = start_epoch {
            Inner::schedule_step(inner, inner.delays.initial_delay, epoch);
        }
        true
    }

    /// Drop everything queued and reset to idle.
    ///
    /// An action that is running right now is not interrupted, and its id is
    /// not re-marked when it finishes.
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.inner.state.borrow_mut();
            let dropped = std::mem::take(&mut state.queue);
            state.pending.clear();
            state.drain = DrainState::Idle;
            state.blocked = false;
            state.epoch = state.epoch.wrapping_add(1);
            state.stats.clears += 1;
            let now = self.inner.host.now();
            state.trace.record(
                now,
                TraceEvent::Cleared {
                    dropped: dropped.len(),
                },
            );
            dropped
        };
        info!(dropped = dropped.len(), "scheduler cleared");
        // Dropped closures may own values whose Drop reenters the scheduler.
        drop(dropped);
    }

    /// Debounce window for the active profile.
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        self.inner.delays.debounce_delay
    }

    /// Throttle window for the active profile.
    #[must_use]
    pub fn throttle_delay(&self) -> Duration {
        self.inner.delays.throttle_delay
    }

    /// The profile chosen at construction.
    #[must_use]
    pub fn profile(&self) -> RuntimeProfile {
        self.inner.profile
    }

    /// The active delay table entry.
    #[must_use]
    pub fn delays(&self) -> &'static DelayConfig {
        self.inner.delays
    }

    /// The timer host this scheduler runs on.
    #[must_use]
    pub fn host(&self) -> &Rc<dyn TimerHost> {
        &self.inner.host
    }

    #[must_use]
    pub fn drain_state(&self) -> DrainState {
        self.inner.state.borrow().drain
    }

    /// Whether new submissions are currently rejected for drain activity.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.inner.state.borrow().blocked
    }

    /// Ids queued or executing.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    /// Operations waiting in the queue (excludes one currently executing).
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.state.borrow().queue.len()
    }

    #[must_use]
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.state.borrow().pending.contains(id)
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.borrow().stats
    }

    /// Snapshot of the decision trace.
    #[must_use]
    pub fn trace(&self) -> ScheduleTrace {
        self.inner.state.borrow().trace.clone()
    }
}

impl Inner {
    fn schedule_step(this: &Rc<Self>, delay: Duration, epoch: u64) {
        let weak: Weak<Self> = Rc::downgrade(this);
        this.host.defer(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::step(&inner, epoch);
                }
            }),
        );
    }

    fn step(this: &Rc<Self>, epoch: u64) {
        let now = this.host.now();
        let op = {
            let mut state = this.state.borrow_mut();
            if state.epoch != epoch || state.drain != DrainState::Draining {
                trace!(epoch, current = state.epoch, "stale drain step ignored");
                return;
            }
            match state.queue.pop_front() {
                Some(op) => op,
                None => {
                    state.drain = DrainState::Idle;
                    state.blocked = false;
                    state.stats.drains_completed += 1;
                    state.trace.record(now, TraceEvent::DrainFinished);
                    debug!(epoch, "drain finished");
                    return;
                }
            }
        };

        let Operation { id, action } = op;
        trace!(%id, "drain step");
        let outcome = run_guarded(action);

        let still_current = {
            let mut state = this.state.borrow_mut();
            let current = state.epoch == epoch;
            if current {
                state.pending.remove(id.as_str());
            }
            state.stats.executed += 1;
            let now = this.host.now();
            state.trace.record(now, TraceEvent::Executed { id: id.to_string() });
            current
        };

        if let Err(error) = outcome {
            this.report_failure(id, error);
        }
        if still_current {
            Self::schedule_step(this, this.delays.step_delay, epoch);
        }
    }

    fn report_failure(&self, id: OpId, error: OperationError) {
        let at = self.host.now();
        {
            let mut state = self.state.borrow_mut();
            state.stats.failed += 1;
            state.trace.record(
                at,
                TraceEvent::Failed {
                    id: id.to_string(),
                    error: error.to_string(),
                },
            );
        }
        warn!(%id, %error, "operation failed");
        if let Some(observer) = &self.observer {
            observer(&FailureReport { id, error, at });
        }
    }
}
