//! Configuration schema for collection-runner.
//!
//! Settings are read from a JSON file (`collection-runner.json` by default)
//! using camelCase keys. Every field has a default, so a partial file only
//! overrides what it names.

use crate::doctor::DoctorStep;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Request timeout in milliseconds.
    ///
    /// Covers connecting, sending and downloading the whole response.
    /// Defaults to 30000ms. Must be greater than 0.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Whether to follow 3xx redirects. Defaults to true.
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow. Defaults to 10.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Whether to validate TLS certificates. Defaults to true.
    ///
    /// **Warning:** disabling validation accepts self-signed and expired
    /// certificates.
    #[serde(default = "default_validate_ssl")]
    pub validate_ssl: bool,

    /// Headers added to every request that does not set them itself.
    #[serde(default = "default_headers")]
    pub default_headers: HashMap<String, String>,

    /// Environment file used when `--env` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_file: Option<String>,

    /// Pause between two requests of a run, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,

    /// Stop a run at the first request that does not pass.
    #[serde(default)]
    pub bail: bool,

    #[serde(default)]
    pub doctor: DoctorConfig,
}

/// Settings for the `doctor` command plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorConfig {
    /// Python interpreter used by the default plan
    #[serde(default = "default_python")]
    pub python: String,

    /// Path to the project's manage.py
    #[serde(default = "default_manage")]
    pub manage: String,

    /// Bytes of stdout/stderr kept per step
    #[serde(default = "default_output_cap_bytes")]
    pub output_cap_bytes: usize,

    /// Replaces the default plan when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<DoctorStep>>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            manage: default_manage(),
            output_cap_bytes: default_output_cap_bytes(),
            steps: None,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            follow_redirects: default_follow_redirects(),
            max_redirects: default_max_redirects(),
            validate_ssl: default_validate_ssl(),
            default_headers: default_headers(),
            environment_file: None,
            delay_ms: 0,
            bail: false,
            doctor: DoctorConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// `Ok(())` if all settings are valid, or `Err` naming the offending key.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout == 0 {
            return Err("timeout must be greater than 0".to_string());
        }
        if self.doctor.output_cap_bytes == 0 {
            return Err("doctor.outputCapBytes must be greater than 0".to_string());
        }
        if let Some(steps) = &self.doctor.steps {
            if let Some(step) = steps.iter().find(|s| s.argv.is_empty()) {
                return Err(format!("doctor step '{}' has an empty command", step.name));
            }
        }
        Ok(())
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// Default value functions for serde

fn default_timeout() -> u64 {
    30000
}

fn default_follow_redirects() -> bool {
    true
}

fn default_max_redirects() -> u32 {
    10
}

fn default_validate_ssl() -> bool {
    true
}

fn default_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        format!("collection-runner/{}", env!("CARGO_PKG_VERSION")),
    );
    headers
}

fn default_python() -> String {
    "python".to_string()
}

fn default_manage() -> String {
    "manage.py".to_string()
}

fn default_output_cap_bytes() -> usize {
    16 * 1024
}
