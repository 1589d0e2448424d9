#![forbid(unsafe_code)]

//! Per-profile timing constants.
//!
//! [`DelayPolicy`] is a static lookup table from [`RuntimeProfile`] to
//! [`DelayConfig`]. It exists so tuning constants stay out of the scheduler's
//! control flow.
//!
//! | Profile | initial | step | debounce | throttle | frame settle | blocks |
//! |---------|---------|------|----------|----------|--------------|--------|
//! | `Default` | 0 ms | 0 ms | 150 ms | 100 ms | 0 ms | no |
//! | `ConstrainedA` | 50 ms | 16 ms | 300 ms | 200 ms | 8 ms | no |
//! | `ConstrainedB` | 100 ms | 32 ms | 500 ms | 300 ms | 16 ms | yes |
//!
//! # Invariants
//!
//! 1. For every paced profile, `frame_settle_delay < step_delay`: the settle
//!    wait is tuned for DOM-write safety, not queue pacing.
//! 2. Only `ConstrainedB` blocks during drain.

use std::time::Duration;

use crate::profile::RuntimeProfile;

/// Timing constants for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayConfig {
    /// Warm-up wait between drain start and the first queued operation.
    pub initial_delay: Duration,
    /// Wait between consecutive queued operations.
    pub step_delay: Duration,
    /// Debounce window for call sites that coalesce bursts.
    pub debounce_delay: Duration,
    /// Minimum spacing for call sites that throttle.
    pub throttle_delay: Duration,
    /// Settle wait after a paint frame before a frame-guarded action runs.
    pub frame_settle_delay: Duration,
    /// Reject new submissions while a drain is in progress.
    pub blocks_during_drain: bool,
}

impl DelayConfig {
    const fn from_millis(
        initial: u64,
        step: u64,
        debounce: u64,
        throttle: u64,
        frame_settle: u64,
        blocks_during_drain: bool,
    ) -> Self {
        Self {
            initial_delay: Duration::from_millis(initial),
            step_delay: Duration::from_millis(step),
            debounce_delay: Duration::from_millis(debounce),
            throttle_delay: Duration::from_millis(throttle),
            frame_settle_delay: Duration::from_millis(frame_settle),
            blocks_during_drain,
        }
    }
}

static DEFAULT_DELAYS: DelayConfig = DelayConfig::from_millis(0, 0, 150, 100, 0, false);
static CONSTRAINED_A_DELAYS: DelayConfig = DelayConfig::from_millis(50, 16, 300, 200, 8, false);
static CONSTRAINED_B_DELAYS: DelayConfig = DelayConfig::from_millis(100, 32, 500, 300, 16, true);

/// Static `RuntimeProfile -> DelayConfig` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayPolicy;

impl DelayPolicy {
    /// Look up the delays for `profile`.
    #[must_use]
    pub fn lookup(profile: RuntimeProfile) -> &'static DelayConfig {
        match profile {
            RuntimeProfile::Default => &DEFAULT_DELAYS,
            RuntimeProfile::ConstrainedA => &CONSTRAINED_A_DELAYS,
            RuntimeProfile::ConstrainedB => &CONSTRAINED_B_DELAYS,
        }
    }
}
