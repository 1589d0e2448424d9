#![forbid(unsafe_code)]

//! Logging setup.
//!
//! The scheduler logs through the `tracing` facade. Hosts that do not install
//! their own subscriber can call [`init`] (human-readable) or, with the
//! `tracing-json` feature, [`init_json`] (one JSON object per line).
//!
//! The filter is read from `PACER_LOG` using `tracing-subscriber`'s
//! `EnvFilter` syntax (e.g. `PACER_LOG=pacer_runtime=debug`) and defaults to
//! `warn`. Installing twice is harmless: the second call returns `false`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "PACER_LOG";

const DEFAULT_DIRECTIVES: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install a formatted stderr subscriber. Returns `false` if a global
/// subscriber was already set.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a JSON-lines stderr subscriber. Returns `false` if a global
/// subscriber was already set.
#[cfg(feature = "tracing-json")]
pub fn init_json() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_current_span(false)
        .try_init()
        .is_ok()
}
