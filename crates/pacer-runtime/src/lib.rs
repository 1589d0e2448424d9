#![forbid(unsafe_code)]

//! Pacer Runtime
//!
//! Stateful half of pacer: the adaptive operation scheduler and the timer
//! host it runs on.
//!
//! # Key Components
//!
//! - [`Scheduler`] - Queues, deduplicates, and paces operations per profile
//! - [`FrameGuard`] - Runs work after the next paint has settled
//! - [`EventLoop`] - Deterministic timer host with paint-frame alignment
//! - [`TimerHost`] - Port the scheduler uses for time, delays, and frames
//! - [`Debouncer`] / [`Throttler`] - Per-key coalescing using profile windows
//! - [`ScheduleTrace`] - Bounded, exportable record of scheduler decisions
//!
//! # How it fits
//! `pacer-core` picks the [`RuntimeProfile`](pacer_core::RuntimeProfile) and
//! its delays. This crate applies them. Everything here is single-threaded:
//! handles are `Rc`-based and actions run on the host's turn.

pub mod clock;
pub mod dedup;
pub mod error;
pub mod event_loop;
pub mod frame_guard;
pub mod host;
pub mod pacing;
pub mod scheduler;
pub mod trace;

pub use clock::{ManualClock, MonoClock, SystemClock};
pub use dedup::{OpId, PendingSet};
pub use error::{FailureObserver, FailureReport, OperationError};
pub use event_loop::{EventLoop, LoopReport};
pub use frame_guard::{FrameGuard, FrameGuardStats};
pub use host::{Task, TimerHost};
pub use pacing::{Debouncer, Throttler};
pub use scheduler::{DrainState, Scheduler, SchedulerBuilder, SchedulerStats};
pub use trace::{RejectReason, ScheduleTrace, TraceEntry, TraceEvent};
