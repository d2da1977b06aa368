use docvec::config::{load_settings_from, save_settings, ConfigError, Settings};
use std::fs;
use tempfile::tempdir;

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("absent.yaml")).expect("defaults");
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_overrides_are_applied_per_section() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        r#"
server:
  port: 9000
  max_concurrent_jobs: 1
chunking:
  max_tokens_per_chunk: 200
  overlap_tokens: 20
client:
  api_base: http://10.0.0.5:9000
"#,
    )
    .expect("write config");

    let settings = load_settings_from(&path).expect("load");
    assert_eq!(settings.server.socket_addr(), "127.0.0.1:9000");
    assert_eq!(settings.server.max_concurrent_jobs, 1);
    assert_eq!(settings.chunking.max_tokens_per_chunk, 200);
    assert_eq!(settings.chunking.overlap_tokens, 20);
    assert_eq!(settings.client.api_base, "http://10.0.0.5:9000");
}

#[test]
fn malformed_yaml_reports_the_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, "server: [unclosed").expect("write config");
    let err = load_settings_from(&path).expect_err("parse error");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn values_that_parse_but_fail_validation_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, "server:\n  max_upload_mb: 0\n").expect("write config");
    let err = load_settings_from(&path).expect_err("invalid");
    assert!(matches!(err, ConfigError::Settings(_)));
    assert!(err.to_string().contains("max_upload_mb"));
}

#[test]
fn saved_file_is_plain_yaml() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    save_settings(&path, &Settings::default()).expect("save");
    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains("max_tokens_per_chunk: 1000"));
    assert!(raw.contains("port: 8080"));
}
