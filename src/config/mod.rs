//! Configuration management.
//!
//! Settings come from a JSON file merged over defaults and are held in a
//! process-wide singleton. The CLI applies its flags on top with
//! [`update_config`].

pub mod schema;

pub use schema::{DoctorConfig, RunnerConfig};

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Name of the settings file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "collection-runner.json";

/// Global configuration instance.
static CONFIG: Lazy<RwLock<RunnerConfig>> = Lazy::new(|| RwLock::new(RunnerConfig::default()));

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a JSON settings value.
///
/// Settings are merged over the defaults. Settings that fail to deserialize
/// are logged and the defaults are kept; a configuration that deserializes
/// but fails validation is an error. On success the global configuration is
/// replaced.
///
/// # Example
///
/// ```
/// use collection_runner::config::load_config;
/// use serde_json::json;
///
/// let config = load_config(Some(json!({"timeout": 60000, "validateSsl": false}))).unwrap();
/// assert_eq!(config.timeout, 60000);
/// assert!(config.follow_redirects);
/// # collection_runner::config::reset_config();
/// ```
pub fn load_config(settings_json: Option<Value>) -> Result<RunnerConfig, ConfigError> {
    let mut config = RunnerConfig::default();

    if let Some(settings) = settings_json {
        match serde_json::from_value::<RunnerConfig>(settings) {
            Ok(user_config) => config = user_config,
            Err(e) => warn!("failed to parse settings: {}. Using defaults.", e),
        }
    }

    config.validate().map_err(ConfigError::Invalid)?;

    if let Ok(mut global_config) = CONFIG.write() {
        *global_config = config.clone();
    }

    Ok(config)
}

/// Loads configuration from a file; a missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<RunnerConfig, ConfigError> {
    if !path.exists() {
        debug!("no config file at {}, using defaults", path.display());
        return load_config(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loaded config from {}", path.display());
    load_config(Some(settings))
}

/// Picks the explicit path when given, else `collection-runner.json` in `dir`.
pub fn resolve_config_path(explicit: Option<&Path>, dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(CONFIG_FILE_NAME))
}

/// Returns a clone of the current global configuration.
pub fn get_config() -> RunnerConfig {
    CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_else(|_| RunnerConfig::default())
}

/// Updates the global configuration in place.
///
/// If the result fails validation, the defaults are restored.
///
/// # Example
///
/// ```
/// use collection_runner::config::{get_config, reset_config, update_config};
///
/// update_config(|config| config.bail = true);
/// assert!(get_config().bail);
/// reset_config();
/// ```
pub fn update_config<F>(updater: F)
where
    F: FnOnce(&mut RunnerConfig),
{
    if let Ok(mut config) = CONFIG.write() {
        updater(&mut config);

        if let Err(e) = config.validate() {
            warn!("configuration invalid after update: {}. Reverting to defaults.", e);
            *config = RunnerConfig::default();
        }
    }
}

/// Resets the configuration to defaults.
pub fn reset_config() {
    if let Ok(mut config) = CONFIG.write() {
        *config = RunnerConfig::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_config_partial_settings() {
        let config = load_config(Some(json!({"timeout": 45000, "bail": true}))).unwrap();
        assert_eq!(config.timeout, 45000);
        assert!(config.bail);
        assert_eq!(config.max_redirects, 10);
        assert_eq!(get_config().timeout, 45000);
        reset_config();
    }

    #[test]
    #[serial]
    fn test_load_config_invalid_json_keeps_defaults() {
        let config = load_config(Some(json!({"timeout": "not-a-number"}))).unwrap();
        assert_eq!(config.timeout, 30000);
    }

    #[test]
    #[serial]
    fn test_load_config_validation_error() {
        let err = load_config(Some(json!({"timeout": 0}))).unwrap_err();
        assert!(err.to_string().contains("timeout must be greater than 0"));
    }

    #[test]
    #[serial]
    fn test_update_config_with_invalid_value_reverts() {
        reset_config();
        update_config(|config| {
            config.delay_ms = 250;
            config.timeout = 0;
        });
        let config = get_config();
        assert_eq!(config.timeout, 30000);
        assert_eq!(config.delay_ms, 0);
        reset_config();
    }

    #[test]
    #[serial]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = resolve_config_path(None, dir.path());
        assert_eq!(path, dir.path().join("collection-runner.json"));

        // Missing file: defaults
        assert_eq!(load_config_file(&path).unwrap().timeout, 30000);

        fs::write(&path, r#"{"delayMs": 100, "doctor": {"manage": "backend/manage.py"}}"#).unwrap();
        let config = load_config_file(&path).unwrap();
        assert_eq!(config.delay_ms, 100);
        assert_eq!(config.doctor.manage, "backend/manage.py");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        reset_config();
    }
}
