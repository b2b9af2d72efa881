//! HTTP request execution configuration.

use crate::config::{get_config, RunnerConfig};
use std::time::Duration;

/// Settings the HTTP client is built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Maximum time for a complete request, including the body download.
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub validate_ssl: bool,
    /// Added to every request that does not set the header itself.
    pub default_headers: Vec<(String, String)>,
}

impl ExecutionConfig {
    /// Creates a config with the given timeout and default everything else.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::from_runner_config(&RunnerConfig::default())
        }
    }

    /// Creates an ExecutionConfig from the global configuration.
    pub fn from_global_config() -> Self {
        Self::from_runner_config(&get_config())
    }

    pub fn from_runner_config(config: &RunnerConfig) -> Self {
        let mut default_headers: Vec<(String, String)> = config
            .default_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        default_headers.sort();

        Self {
            timeout: config.timeout_duration(),
            follow_redirects: config.follow_redirects,
            max_redirects: config.max_redirects,
            validate_ssl: config.validate_ssl,
            default_headers,
        }
    }
}

impl Default for ExecutionConfig {
    /// Reads the global configuration.
    fn default() -> Self {
        Self::from_global_config()
    }
}
