//! Loading `collection-runner.json` into the global configuration.

use super::write_file;
use collection_runner::config::{
    get_config, load_config_file, reset_config, resolve_config_path, update_config, ConfigError,
    CONFIG_FILE_NAME,
};
use collection_runner::executor::ExecutionConfig;
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

#[test]
#[serial]
fn test_config_file_drives_execution_config() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        CONFIG_FILE_NAME,
        r#"{
            "timeout": 5000,
            "validateSsl": false,
            "defaultHeaders": {"Accept": "application/json"},
            "environmentFile": "envs/local.json",
            "delayMs": 250,
            "doctor": {"python": "python3", "steps": [{"name": "check", "argv": ["python3", "manage.py", "check"]}]}
        }"#,
    );

    let path = resolve_config_path(None, dir.path());
    let config = load_config_file(&path).unwrap();
    assert_eq!(config.environment_file.as_deref(), Some("envs/local.json"));
    assert_eq!(config.delay(), Duration::from_millis(250));
    assert_eq!(config.doctor.python, "python3");
    assert_eq!(config.doctor.manage, "manage.py");
    assert_eq!(config.doctor.steps.as_ref().unwrap()[0].name, "check");

    let execution = ExecutionConfig::from_global_config();
    assert_eq!(execution.timeout, Duration::from_secs(5));
    assert!(!execution.validate_ssl);
    assert!(execution.follow_redirects);
    assert_eq!(
        execution.default_headers,
        vec![("Accept".to_string(), "application/json".to_string())]
    );

    reset_config();
}

#[test]
#[serial]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_file(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config.timeout, 30000);
    assert!(config.default_headers.contains_key("User-Agent"));
    reset_config();
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "bad.json", r#"{"timeout": 0}"#);
    assert!(matches!(
        load_config_file(&path),
        Err(ConfigError::Invalid(_))
    ));

    let path = write_file(dir.path(), "broken.json", "{not json");
    assert!(matches!(
        load_config_file(&path),
        Err(ConfigError::Parse { .. })
    ));
    reset_config();
}

#[test]
#[serial]
fn test_cli_overrides_applied_with_update_config() {
    reset_config();
    update_config(|c| {
        c.timeout = 1500;
        c.bail = true;
    });
    let config = get_config();
    assert_eq!(config.timeout_duration(), Duration::from_millis(1500));
    assert!(config.bail);

    // An invalid override falls back to defaults
    update_config(|c| c.timeout = 0);
    assert_eq!(get_config().timeout, 30000);
    reset_config();
}
