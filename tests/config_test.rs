//! Tests for loading client configuration from disk.

use std::io::Write;
use strictly_onchain::SyncConfig;
use tempfile::NamedTempFile;

#[test]
fn test_from_file_reads_values_and_defaults() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
gateway_url = "http://ledger.local:8080"
contract_address = "0x23a4"
player_identity = "0xbeef"
poll_interval_ms = 250
"#
    )
    .expect("write config");

    let config = SyncConfig::from_file(file.path()).expect("valid config");

    assert_eq!(config.gateway_url(), "http://ledger.local:8080");
    assert_eq!(config.contract_address(), "0x23a4");
    assert_eq!(config.player_identity(), "0xbeef");
    assert_eq!(*config.poll_interval_ms(), 250);
    assert_eq!(*config.max_refresh_polls(), 20);
    assert_eq!(*config.request_timeout_secs(), 30);
    assert_eq!(config.log_filter(), "info");
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = SyncConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
    assert!(err.message.contains("Failed to read config file"));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "poll_interval_ms = \"soon\"").expect("write config");

    let err = SyncConfig::from_file(file.path()).expect_err("malformed");
    assert!(err.message.contains("Failed to parse config"));
}

#[test]
fn test_load_without_path_uses_defaults() {
    let config = SyncConfig::load(None).expect("defaults");
    assert_eq!(*config.poll_interval_ms(), 500);
}
