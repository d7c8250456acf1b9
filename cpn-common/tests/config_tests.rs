//! Tests for config file resolution and environment helpers
//!
//! Uses serial_test: tests that set or clear environment variables are
//! marked #[serial] so they never interleave.

use cpn_common::config::{env_or_file, env_var, load_toml_or_default, resolve_config_path, LoggingConfig};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    logging: LoggingConfig,
    name: String,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var("CPN_TEST_CONFIG", "/tmp/from-env.toml");

    let path = resolve_config_path(None, "CPN_TEST_CONFIG", "puzzle.toml");
    assert_eq!(path, Some(PathBuf::from("/tmp/from-env.toml")));

    env::remove_var("CPN_TEST_CONFIG");
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var("CPN_TEST_CONFIG", "/tmp/from-env.toml");

    let path = resolve_config_path(Some("/tmp/from-cli.toml"), "CPN_TEST_CONFIG", "puzzle.toml");
    assert_eq!(path, Some(PathBuf::from("/tmp/from-cli.toml")));

    env::remove_var("CPN_TEST_CONFIG");
}

#[test]
#[serial]
fn test_blank_env_var_is_unset() {
    env::set_var("CPN_TEST_BLANK", "   ");
    assert_eq!(env_var("CPN_TEST_BLANK"), None);
    env::remove_var("CPN_TEST_BLANK");
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let config: SampleConfig = load_toml_or_default(Some(&missing)).unwrap();
    assert_eq!(config, SampleConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_file_keeps_defaults_for_missing_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name = \"puzzles\"").unwrap();

    let config: SampleConfig = load_toml_or_default(Some(file.path())).unwrap();
    assert_eq!(config.name, "puzzles");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "name = [unterminated").unwrap();

    let result: cpn_common::Result<SampleConfig> = load_toml_or_default(Some(file.path()));
    assert!(matches!(result, Err(cpn_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_secret_read_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "  s3cret  ").unwrap();

    env::remove_var("CPN_TEST_KEY");
    env::set_var("CPN_TEST_KEY_FILE", file.path());
    assert_eq!(env_or_file("CPN_TEST_KEY").as_deref(), Some("s3cret"));

    // Direct value wins over the file
    env::set_var("CPN_TEST_KEY", "direct");
    assert_eq!(env_or_file("CPN_TEST_KEY").as_deref(), Some("direct"));

    env::remove_var("CPN_TEST_KEY");
    env::remove_var("CPN_TEST_KEY_FILE");
}

#[test]
#[serial]
fn test_unreadable_secret_file_is_unset() {
    env::remove_var("CPN_TEST_KEY");
    env::set_var("CPN_TEST_KEY_FILE", "/definitely/not/here");
    assert_eq!(env_or_file("CPN_TEST_KEY"), None);
    env::remove_var("CPN_TEST_KEY_FILE");
}
