//! Loading configuration from JSON files on disk.

#![cfg(feature = "serde")]

use std::io::Write;
use std::time::Duration;

use pacer_core::{ConfigError, PacerConfig, RuntimeProfile};
use pretty_assertions::assert_eq;

#[test]
fn loads_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"signature":"Mozilla/5.0 Gecko/20100101 Firefox/128.0","frame_interval_ms":20}}"#
    )
    .unwrap();

    let config = PacerConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.profile, None);
    assert_eq!(config.frame_interval, Duration::from_millis(20));
    assert_eq!(
        config.resolve_profile(&pacer_core::SignatureDetector),
        RuntimeProfile::ConstrainedB
    );
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PacerConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn zero_frame_interval_in_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"frame_interval_ms":0}}"#).unwrap();
    let err = PacerConfig::from_json_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidNumber { .. }));
}

#[test]
fn config_round_trips_through_json() {
    let config = PacerConfig::new()
        .with_profile(RuntimeProfile::ConstrainedA)
        .with_trace_capacity(4);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"frame_interval_ms\":16"));
    assert_eq!(PacerConfig::from_json_str(&json).unwrap(), config);
}
