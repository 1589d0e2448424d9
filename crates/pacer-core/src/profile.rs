#![forbid(unsafe_code)]

//! Runtime profile detection.
//!
//! A runtime identity string (a user-agent-like signature) is classified into
//! one of three tuning profiles. Detection is pure and total: every input maps
//! to exactly one profile, and anything unrecognized maps to
//! [`RuntimeProfile::Default`].
//!
//! # Detection Strategy
//!
//! Matching is case-insensitive and evaluated in order:
//!
//! | Rule | Signature contains | Profile |
//! |------|--------------------|---------|
//! | 1 | `firefox`, or `gecko/` without `like gecko` | `ConstrainedB` |
//! | 2 | `safari` without `chrome`, `chromium`, `crios`, `edg`, `android` | `ConstrainedA` |
//! | 3 | anything else | `Default` |
//!
//! Chromium-family signatures also advertise `Safari`, so rule 2 has to rule
//! them out explicitly.
//!
//! # Invariants
//!
//! 1. **Totality**: `detect` never fails.
//! 2. **Determinism**: the same signature always yields the same profile.
//! 3. **Stability**: a profile is computed once per scheduler and never
//!    re-detected.
//!
//! # Example
//!
//! ```
//! use pacer_core::profile::{detect, RuntimeProfile};
//!
//! let ua = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
//! assert_eq!(detect(ua), RuntimeProfile::ConstrainedB);
//! assert_eq!(detect(""), RuntimeProfile::Default);
//! ```

use std::fmt;
use std::str::FromStr;

/// Markers that identify the most fragile runtime (rule 1).
const CONSTRAINED_B_MARKERS: &[&str] = &["firefox"];

/// Engines that advertise `Safari` without being WebKit-only (rule 2 exclusions).
const SAFARI_IMPOSTORS: &[&str] = &["chrome", "chromium", "crios", "edg", "android"];

/// Named tuning profile for the current runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RuntimeProfile {
    /// Unconstrained baseline. Operations run inline, nothing is queued.
    #[default]
    Default,
    /// Runtime that stutters under rapid DOM churn (WebKit-only browsers).
    /// Operations are queued and paced but never rejected for drain activity.
    ConstrainedA,
    /// The most fragile runtime (Gecko). Operations are queued and paced, and
    /// new submissions are rejected while a drain is in progress.
    ConstrainedB,
}

impl RuntimeProfile {
    /// Get the profile name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ConstrainedA => "constrained-a",
            Self::ConstrainedB => "constrained-b",
        }
    }

    /// All profiles, baseline first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Default, Self::ConstrainedA, Self::ConstrainedB]
    }

    /// Whether operations under this profile go through the queue.
    #[must_use]
    #[inline]
    pub const fn is_paced(&self) -> bool {
        !matches!(self, Self::Default)
    }
}

impl FromStr for RuntimeProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "baseline" => Ok(Self::Default),
            "constrained-a" | "constrained_a" | "a" => Ok(Self::ConstrainedA),
            "constrained-b" | "constrained_b" | "b" => Ok(Self::ConstrainedB),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for RuntimeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`RuntimeProfile::from_str`] for an unrecognized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProfile(pub String);

impl fmt::Display for UnknownProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown runtime profile: {:?}", self.0)
    }
}

impl std::error::Error for UnknownProfile {}

/// Classify a runtime signature into a profile.
#[must_use]
pub fn detect(signature: &str) -> RuntimeProfile {
    let sig = signature.to_ascii_lowercase();

    let is_gecko = CONSTRAINED_B_MARKERS.iter().any(|m| sig.contains(m))
        || (sig.contains("gecko/") && !sig.contains("like gecko"));
    if is_gecko {
        return RuntimeProfile::ConstrainedB;
    }

    let is_webkit_only =
        sig.contains("safari") && !SAFARI_IMPOSTORS.iter().any(|m| sig.contains(m));
    if is_webkit_only {
        return RuntimeProfile::ConstrainedA;
    }

    RuntimeProfile::Default
}

/// Pluggable profile classifier.
///
/// Schedulers take a detector at construction so policy selection is not tied
/// to any one signature format. Any `Fn(&str) -> RuntimeProfile` is a detector.
pub trait ProfileDetector {
    /// Classify `signature`. Must be total and deterministic.
    fn detect(&self, signature: &str) -> RuntimeProfile;
}

/// The built-in user-agent style detector (see module docs for the rules).
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureDetector;

impl ProfileDetector for SignatureDetector {
    fn detect(&self, signature: &str) -> RuntimeProfile {
        detect(signature)
    }
}

impl<F> ProfileDetector for F
where
    F: Fn(&str) -> RuntimeProfile,
{
    fn detect(&self, signature: &str) -> RuntimeProfile {
        self(signature)
    }
}
