#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! [`PacerConfig`] carries everything a scheduler needs from its environment:
//! an optional forced profile, an optional runtime signature to detect from,
//! the paint-frame interval of the host loop, and the trace ring capacity.
//!
//! # Environment Variables
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `PACER_PROFILE` | Force a profile (`default`, `constrained-a`, `constrained-b`) |
//! | `PACER_SIGNATURE` | Runtime signature to classify when no profile is forced |
//! | `PACER_FRAME_INTERVAL_MS` | Paint-frame interval in milliseconds (> 0) |
//! | `PACER_TRACE_CAPACITY` | Trace ring size; `0` disables tracing |
//!
//! Reading the process environment is isolated in [`PacerConfig::from_env`];
//! [`PacerConfig::from_lookup`] takes the lookup as a parameter so tests never
//! touch global state.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::profile::{ProfileDetector, RuntimeProfile};

/// Default paint-frame interval (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Default number of trace entries retained.
pub const DEFAULT_TRACE_CAPACITY: usize = 256;

const ENV_PROFILE: &str = "PACER_PROFILE";
const ENV_SIGNATURE: &str = "PACER_SIGNATURE";
const ENV_FRAME_INTERVAL_MS: &str = "PACER_FRAME_INTERVAL_MS";
const ENV_TRACE_CAPACITY: &str = "PACER_TRACE_CAPACITY";

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// A profile name did not parse.
    InvalidProfile(String),
    /// A numeric setting did not parse or was out of range.
    InvalidNumber { key: &'static str, value: String },
    /// Malformed JSON configuration.
    Json(String),
    /// Config file could not be read.
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProfile(name) => write!(f, "invalid profile: {name:?}"),
            Self::InvalidNumber { key, value } => write!(f, "invalid value for {key}: {value:?}"),
            Self::Json(msg) => write!(f, "invalid config json: {msg}"),
            Self::Io(err) => write!(f, "config io: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct PacerConfig {
    /// Forced profile. Wins over `signature`.
    pub profile: Option<RuntimeProfile>,
    /// Runtime signature to classify when no profile is forced.
    pub signature: Option<String>,
    /// Paint-frame interval used by the host loop.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "frame_interval_ms", with = "duration_ms")
    )]
    pub frame_interval: Duration,
    /// Trace ring capacity. `0` disables tracing.
    pub trace_capacity: usize,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            profile: None,
            signature: None,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
        }
    }
}

impl PacerConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a profile.
    #[must_use]
    pub fn with_profile(mut self, profile: RuntimeProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Set the runtime signature to classify.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Set the paint-frame interval.
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the trace ring capacity.
    #[must_use]
    pub fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset keys keep their defaults;
    /// empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_PROFILE) {
            let profile = raw
                .parse::<RuntimeProfile>()
                .map_err(|_| ConfigError::InvalidProfile(raw.clone()))?;
            config.profile = Some(profile);
        }
        config.signature = get(ENV_SIGNATURE);

        if let Some(raw) = get(ENV_FRAME_INTERVAL_MS) {
            let ms = parse_number(ENV_FRAME_INTERVAL_MS, &raw)?;
            if ms == 0 {
                return Err(ConfigError::InvalidNumber {
                    key: ENV_FRAME_INTERVAL_MS,
                    value: raw,
                });
            }
            config.frame_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = get(ENV_TRACE_CAPACITY) {
            let capacity = parse_number(ENV_TRACE_CAPACITY, &raw)?;
            config.trace_capacity =
                usize::try_from(capacity).map_err(|_| ConfigError::InvalidNumber {
                    key: ENV_TRACE_CAPACITY,
                    value: raw,
                })?;
        }

        Ok(config)
    }

    /// Parse a JSON configuration document.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Json(err.to_string()))?;
        if config.frame_interval.is_zero() {
            return Err(ConfigError::InvalidNumber {
                key: "frame_interval_ms",
                value: "0".to_string(),
            });
        }
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Resolve the active profile: a forced profile wins, otherwise the
    /// signature is classified, otherwise [`RuntimeProfile::Default`].
    #[must_use]
    pub fn resolve_profile(&self, detector: &dyn ProfileDetector) -> RuntimeProfile {
        let (profile, source) = match (&self.profile, &self.signature) {
            (Some(profile), _) => (*profile, "forced"),
            (None, Some(signature)) => (detector.detect(signature), "detected"),
            (None, None) => (RuntimeProfile::Default, "fallback"),
        };
        debug!(%profile, source, "runtime profile resolved");
        profile
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

#[cfg(feature = "serde")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
