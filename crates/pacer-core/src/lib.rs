#![forbid(unsafe_code)]

//! Core: runtime profile detection, delay policy, and configuration.
//!
//! This crate is pure policy. It decides *which* tuning profile applies to
//! the current runtime and *what* timing constants that profile uses. It owns
//! no timers and no mutable state; the stateful scheduler lives in
//! `pacer-runtime`.

pub mod config;
pub mod delay_policy;
pub mod logging;
pub mod profile;

pub use config::{ConfigError, PacerConfig};
pub use delay_policy::{DelayConfig, DelayPolicy};
pub use profile::{ProfileDetector, RuntimeProfile, SignatureDetector};
