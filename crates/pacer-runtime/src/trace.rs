//! Scheduler decision trace.
//!
//! A bounded ring of every decision the scheduler makes: inline runs, enqueues,
//! rejections, drain transitions, executions, failures, and clears. Entries are
//! stamped with a monotonic sequence number and the host time, so two runs
//! against a [`ManualClock`](crate::ManualClock) produce identical traces.
//!
//! Traces export as JSONL and hash to a stable FNV-1a checksum for golden
//! comparisons.
//!
//! ```
//! use pacer_runtime::trace::{ScheduleTrace, TraceEvent};
//! use std::time::Duration;
//!
//! let mut trace = ScheduleTrace::new(8);
//! trace.record(Duration::ZERO, TraceEvent::DrainStarted { blocking: false });
//! assert_eq!(
//!     trace.to_jsonl(),
//!     "{\"seq\":0,\"at_us\":0,\"event\":\"drain_started\",\"blocking\":false}\n"
//! );
//! ```

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0100_0000_01b3;

/// Why a submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// An operation with the same id is already queued or running.
    Duplicate,
    /// The profile blocks submissions while a drain is in progress.
    Blocked,
}

/// One scheduler decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Ran synchronously inside `submit` (unpaced profile).
    Inline { id: String },
    /// Appended to the queue.
    Enqueued { id: String, queued: usize },
    /// Not accepted.
    Rejected { id: String, reason: RejectReason },
    /// Idle -> Draining.
    DrainStarted { blocking: bool },
    /// Action ran (whatever the outcome).
    Executed { id: String },
    /// Action returned an error or panicked.
    Failed { id: String, error: String },
    /// Draining -> Idle because the queue emptied.
    DrainFinished,
    /// `clear()` dropped `dropped` queued operations.
    Cleared { dropped: usize },
}

/// A stamped trace entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Host time in microseconds.
    pub at_us: u64,
    #[serde(flatten)]
    pub event: TraceEvent,
}

impl TraceEntry {
    /// Host time as a duration.
    #[must_use]
    pub fn at(&self) -> Duration {
        Duration::from_micros(self.at_us)
    }
}

/// Bounded trace recorder. Capacity `0` disables recording.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTrace {
    capacity: usize,
    entries: VecDeque<TraceEntry>,
    seq: u64,
}

impl ScheduleTrace {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            seq: 0,
        }
    }

    /// Whether recording is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Record `event` at host time `at`, evicting the oldest entry when full.
    pub fn record(&mut self, at: Duration, event: TraceEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TraceEntry {
            seq: self.seq,
            at_us: u64::try_from(at.as_micros()).unwrap_or(u64::MAX),
            event,
        });
        self.seq += 1;
    }

    /// Retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &VecDeque<TraceEntry> {
        &self.entries
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total events recorded, including evicted ones.
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.seq
    }

    /// Export as JSON lines.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            if let Ok(line) = serde_json::to_string(entry) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }

    /// FNV-1a checksum of the JSONL export.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        self.to_jsonl()
            .bytes()
            .fold(FNV64_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV64_PRIME)
            })
    }
}
