//! Property tests for profile detection and the delay table.
//!
//! 1. Detection is total: arbitrary strings never panic.
//! 2. Detection is deterministic.
//! 3. Adding a Firefox token to any signature selects `ConstrainedB`.
//! 4. Chromium tokens never select `ConstrainedA`.

use pacer_core::profile::detect;
use pacer_core::{DelayPolicy, RuntimeProfile};
use proptest::prelude::*;

proptest! {
    #[test]
    fn detection_is_total_and_deterministic(sig in ".*") {
        let first = detect(&sig);
        prop_assert_eq!(first, detect(&sig));
        prop_assert!(RuntimeProfile::all().contains(&first));
    }

    #[test]
    fn firefox_token_always_wins(prefix in "[ -~]{0,40}", suffix in "[ -~]{0,40}") {
        let sig = format!("{prefix} Firefox/128.0 {suffix}");
        prop_assert_eq!(detect(&sig), RuntimeProfile::ConstrainedB);
    }

    #[test]
    fn chrome_token_never_selects_constrained_a(prefix in "[a-z ]{0,40}") {
        let sig = format!("{prefix} Chrome/126.0 Safari/537.36");
        prop_assert_ne!(detect(&sig), RuntimeProfile::ConstrainedA);
    }

    #[test]
    fn delays_follow_detected_profile(sig in "[ -~]{0,80}") {
        let profile = detect(&sig);
        let delays = DelayPolicy::lookup(profile);
        prop_assert_eq!(delays.blocks_during_drain, profile == RuntimeProfile::ConstrainedB);
    }
}
