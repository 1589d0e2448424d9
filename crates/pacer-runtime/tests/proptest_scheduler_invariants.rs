//! Property-based invariant tests for the scheduler.
//!
//! Arbitrary interleavings of submit / advance / clear, for every profile:
//!
//! 1. FIFO: accepted operations run in acceptance order.
//! 2. At-most-once: every accepted operation runs at most once.
//! 3. Between host turns, the pending set equals the queue.
//! 4. The block flag is set exactly while a blocking profile drains.
//! 5. `clear()` leaves nothing pending and nothing from before it runs.
//! 6. Once the host is idle, every accepted, uncleared operation has run.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use pacer_core::RuntimeProfile;
use pacer_runtime::{DrainState, EventLoop, ManualClock, Scheduler};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Submit(u8),
    Advance(u64),
    Clear,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (0u8..6).prop_map(Step::Submit),
        3 => (0u64..80).prop_map(Step::Advance),
        1 => Just(Step::Clear),
    ]
}

fn profile_strategy() -> impl Strategy<Value = RuntimeProfile> {
    prop_oneof![
        Just(RuntimeProfile::Default),
        Just(RuntimeProfile::ConstrainedA),
        Just(RuntimeProfile::ConstrainedB),
    ]
}

// ── Harness ───────────────────────────────────────────────────────────────

struct Harness {
    host: Rc<EventLoop>,
    scheduler: Scheduler,
    ran: Rc<RefCell<Vec<u64>>>,
    accepted: Vec<u64>,
    dropped: HashSet<u64>,
    next_token: u64,
}

impl Harness {
    fn new(profile: RuntimeProfile) -> Self {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let scheduler = Scheduler::new(host.clone(), profile);
        Self {
            host,
            scheduler,
            ran: Rc::new(RefCell::new(Vec::new())),
            accepted: Vec::new(),
            dropped: HashSet::new(),
            next_token: 0,
        }
    }

    fn apply(&mut self, step: &Step) {
        match *step {
            Step::Submit(id) => {
                let token = self.next_token;
                self.next_token += 1;
                let ran = Rc::clone(&self.ran);
                if self
                    .scheduler
                    .submit(format!("op-{id}"), move || ran.borrow_mut().push(token))
                {
                    self.accepted.push(token);
                }
            }
            Step::Advance(ms) => {
                self.host.advance(Duration::from_millis(ms));
            }
            Step::Clear => {
                let ran: HashSet<u64> = self.ran.borrow().iter().copied().collect();
                self.dropped
                    .extend(self.accepted.iter().copied().filter(|t| !ran.contains(t)));
                self.scheduler.clear();
            }
        }
    }

    fn expected_runs(&self) -> Vec<u64> {
        self.accepted
            .iter()
            .copied()
            .filter(|t| !self.dropped.contains(t))
            .collect()
    }
}

proptest! {
    #[test]
    fn scheduler_invariants_hold(
        profile in profile_strategy(),
        steps in proptest::collection::vec(step_strategy(), 0..60),
    ) {
        let mut h = Harness::new(profile);
        let blocking = profile == RuntimeProfile::ConstrainedB;

        for step in &steps {
            h.apply(step);

            prop_assert_eq!(h.scheduler.pending_count(), h.scheduler.queued_len());
            let draining = h.scheduler.drain_state() == DrainState::Draining;
            prop_assert_eq!(h.scheduler.is_blocked(), blocking && draining);
            if matches!(step, Step::Clear) {
                prop_assert_eq!(h.scheduler.pending_count(), 0);
                prop_assert!(!draining);
            }

            let ran = h.ran.borrow();
            prop_assert!(ran.windows(2).all(|w| w[0] < w[1]), "FIFO violated: {:?}", ran);
            prop_assert!(ran.iter().all(|t| !h.dropped.contains(t)));
        }

        let report = h.host.run_until_idle(10_000);
        prop_assert!(!report.exhausted);
        prop_assert_eq!(h.scheduler.pending_count(), 0);
        prop_assert_eq!(h.scheduler.drain_state(), DrainState::Idle);
        prop_assert!(!h.scheduler.is_blocked());
        prop_assert_eq!(h.ran.borrow().clone(), h.expected_runs());
    }

    #[test]
    fn default_profile_never_touches_the_host(ids in proptest::collection::vec(0u8..4, 0..40)) {
        let h = Harness::new(RuntimeProfile::Default);
        for id in &ids {
            let accepted = h.scheduler.submit(format!("op-{id}"), || {});
            prop_assert!(accepted);
        }
        prop_assert_eq!(h.host.pending_tasks(), 0);
        prop_assert_eq!(h.scheduler.stats().ran_inline, ids.len() as u64);
    }
}
