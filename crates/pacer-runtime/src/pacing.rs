#![forbid(unsafe_code)]

//! Debounce and throttle helpers driven by the scheduler's profile.
//!
//! Call sites that coalesce bursts (typing, dragging, resizing) read
//! [`Scheduler::debounce_delay`] and [`Scheduler::throttle_delay`]. These
//! helpers apply those windows on the scheduler's own timer host so the
//! timing stays consistent with the active profile.
//!
//! - [`Debouncer`]: trailing edge. Each call for a key re-arms the timer; only
//!   the last action for a key runs, `debounce_delay` after the last call.
//! - [`Throttler`]: leading edge. A key runs at most once per
//!   `throttle_delay`; calls inside the window are dropped.
//!
//! Neither helper goes through the scheduler queue.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::{infallible, run_guarded};
use crate::host::TimerHost;
use crate::scheduler::Scheduler;

/// Trailing-edge, per-key debouncer.
pub struct Debouncer {
    host: Rc<dyn TimerHost>,
    delay: Duration,
    armed: Rc<RefCell<HashMap<String, u64>>>,
    next_generation: Cell<u64>,
}

impl Debouncer {
    /// Debouncer using the scheduler's host and `debounce_delay`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_delay(Rc::clone(scheduler.host()), scheduler.debounce_delay())
    }

    /// Debouncer with an explicit window.
    #[must_use]
    pub fn with_delay(host: Rc<dyn TimerHost>, delay: Duration) -> Self {
        Self {
            host,
            delay,
            armed: Rc::new(RefCell::new(HashMap::new())),
            next_generation: Cell::new(0),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) `key`. Any earlier action for `key` that has not run
    /// yet is superseded.
    pub fn call<F>(&self, key: impl Into<String>, action: F)
    where
        F: FnOnce() + 'static,
    {
        let key = key.into();
        let generation = self.next_generation.get();
        self.next_generation.set(generation.wrapping_add(1));
        self.armed.borrow_mut().insert(key.clone(), generation);

        let armed = Rc::clone(&self.armed);
        self.host.defer(
            self.delay,
            Box::new(move || {
                let current = {
                    let mut armed = armed.borrow_mut();
                    if armed.get(&key) == Some(&generation) {
                        armed.remove(&key);
                        true
                    } else {
                        false
                    }
                };
                if !current {
                    trace!(%key, "debounced call superseded");
                    return;
                }
                if let Err(error) = run_guarded(infallible(action)) {
                    warn!(%key, %error, "debounced action failed");
                }
            }),
        );
    }

    /// Disarm `key`. Returns whether an action was armed.
    pub fn cancel(&self, key: &str) -> bool {
        self.armed.borrow_mut().remove(key).is_some()
    }

    /// Keys currently armed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.armed.borrow().len()
    }
}

/// Leading-edge, per-key throttler.
pub struct Throttler {
    host: Rc<dyn TimerHost>,
    window: Duration,
    last_run: RefCell<HashMap<String, Duration>>,
}

impl Throttler {
    /// Throttler using the scheduler's host and `throttle_delay`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_window(Rc::clone(scheduler.host()), scheduler.throttle_delay())
    }

    /// Throttler with an explicit window.
    #[must_use]
    pub fn with_window(host: Rc<dyn TimerHost>, window: Duration) -> Self {
        Self {
            host,
            window,
            last_run: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `action` now unless `key` ran within the window. Returns whether it ran.
    pub fn call<F>(&self, key: impl Into<String>, action: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        let key = key.into();
        let now = self.host.now();
        {
            let mut last_run = self.last_run.borrow_mut();
            // Only keys still inside their window are kept.
            last_run.retain(|_, last| now.saturating_sub(*last) < self.window);
            if last_run.contains_key(&key) {
                trace!(%key, "throttled");
                return false;
            }
            last_run.insert(key.clone(), now);
        }
        if let Err(error) = run_guarded(infallible(action)) {
            warn!(%key, %error, "throttled action failed");
        }
        true
    }

    /// Keys still inside their window.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.last_run.borrow().len()
    }

    /// Forget all history.
    pub fn reset(&self) {
        self.last_run.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event_loop::EventLoop;
    use pacer_core::RuntimeProfile;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debouncer_runs_only_last_call() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let scheduler = Scheduler::new(host.clone(), RuntimeProfile::ConstrainedA);
        let debouncer = Debouncer::new(&scheduler);
        assert_eq!(debouncer.delay(), ms(300));

        let seen = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let s = Rc::clone(&seen);
            debouncer.call("search", move || s.borrow_mut().push(n));
            host.advance(ms(100));
        }
        assert!(seen.borrow().is_empty());
        host.advance(ms(200));
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn debouncer_keys_are_independent() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let debouncer = Debouncer::with_delay(host.clone(), ms(10));
        let seen = Rc::new(RefCell::new(Vec::new()));
        for key in ["a", "b"] {
            let s = Rc::clone(&seen);
            debouncer.call(key, move || s.borrow_mut().push(key));
        }
        host.run_until_idle(10);
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn debouncer_cancel() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let debouncer = Debouncer::with_delay(host.clone(), ms(10));
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        debouncer.call("k", move || r.set(true));
        assert!(debouncer.cancel("k"));
        assert!(!debouncer.cancel("k"));
        host.run_until_idle(10);
        assert!(!ran.get());
    }

    #[test]
    fn throttler_drops_calls_inside_window() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let scheduler = Scheduler::new(host.clone(), RuntimeProfile::ConstrainedB);
        let throttler = Throttler::new(&scheduler);
        assert_eq!(throttler.window(), ms(300));

        let runs = Rc::new(Cell::new(0));
        let mut accepted = Vec::new();
        for _ in 0..4 {
            let r = Rc::clone(&runs);
            accepted.push(throttler.call("drag", move || r.set(r.get() + 1)));
            host.advance(ms(100));
        }
        assert_eq!(accepted, vec![true, false, false, true]);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn throttler_reset_forgets_history() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let throttler = Throttler::with_window(host, ms(50));
        assert!(throttler.call("k", || {}));
        assert!(!throttler.call("k", || {}));
        throttler.reset();
        assert!(throttler.call("k", || {}));
    }

    #[test]
    fn throttler_forgets_expired_keys() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let throttler = Throttler::with_window(host.clone(), ms(50));
        for n in 0..100 {
            assert!(throttler.call(format!("node-{n}"), || {}));
        }
        assert_eq!(throttler.tracked(), 100);

        host.advance(ms(50));
        assert!(throttler.call("node-0", || {}));
        assert_eq!(throttler.tracked(), 1);
    }

    #[test]
    fn throttled_panic_is_contained() {
        let host = Rc::new(EventLoop::new(ManualClock::new()));
        let throttler = Throttler::with_window(host, ms(50));
        assert!(throttler.call("k", || panic!("bad drag")));
        assert!(throttler.call("other", || {}));
    }
}
