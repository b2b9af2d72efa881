//! Environment file loader.
//!
//! Two layouts are accepted:
//!
//! * a Postman environment export:
//!   `{"name": "local", "values": [{"key": "base_url", "value": "...", "enabled": true}]}`
//! * a multi-environment map:
//!   `{"$shared": {...}, "local": {...}, "staging": {...}, "$active": "local"}`

use super::models::{Environment, Environments};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur during environment loading
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// IO error occurred while reading the file
    #[error("failed to read environment file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON
    #[error("failed to parse environment file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Valid JSON with an unexpected structure
    #[error("invalid environment format: {0}")]
    InvalidFormat(String),

    /// The requested environment does not exist
    #[error("unknown environment '{name}' (available: {available})")]
    UnknownEnvironment { name: String, available: String },
}

/// File names searched by [`find_environment_file`], in order of preference
const ENV_FILE_NAMES: &[&str] = &["collection-runner.env.json", ".collection-runner-env.json"];

/// Maximum number of parent directories to search
const MAX_PARENT_SEARCH_DEPTH: usize = 3;

/// Loads environments from an explicit file path.
pub fn load_environment_file(path: &Path) -> Result<Environments, EnvError> {
    let content = fs::read_to_string(path).map_err(|source| EnvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loading environments from {}", path.display());
    parse_environments(&content)
}

/// Searches `start` and up to three parent directories for an environment file.
pub fn find_environment_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(MAX_PARENT_SEARCH_DEPTH + 1)
        .flat_map(|dir| ENV_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Parses environment JSON in either supported layout.
pub fn parse_environments(content: &str) -> Result<Environments, EnvError> {
    let raw: Value = serde_json::from_str(content)?;
    let obj = raw
        .as_object()
        .ok_or_else(|| EnvError::InvalidFormat("root must be a JSON object".to_string()))?;

    if obj.get("values").is_some_and(Value::is_array) {
        parse_postman_environment(obj)
    } else {
        parse_environment_map(obj)
    }
}

fn parse_postman_environment(obj: &serde_json::Map<String, Value>) -> Result<Environments, EnvError> {
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("default")
        .to_string();

    let mut variables = HashMap::new();
    for entry in obj.get("values").and_then(Value::as_array).into_iter().flatten() {
        let Some(key) = entry.get("key").and_then(Value::as_str) else {
            return Err(EnvError::InvalidFormat(format!(
                "environment '{}' has a value without a key",
                name
            )));
        };
        if entry.get("enabled").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        let value = entry.get("value").unwrap_or(&Value::Null);
        variables.insert(key.to_string(), value_to_string(value, key, &name)?);
    }

    let mut environments = Environments::new();
    environments.add_environment(Environment::with_variables(name.clone(), variables));
    environments.active = Some(name);
    Ok(environments)
}

fn parse_environment_map(obj: &serde_json::Map<String, Value>) -> Result<Environments, EnvError> {
    let mut environments = Environments::new();

    for (key, value) in obj {
        match key.as_str() {
            "$shared" => {
                environments.shared = parse_variable_map(value, "$shared")?;
            }
            "$active" => {
                let Some(active) = value.as_str() else {
                    return Err(EnvError::InvalidFormat(
                        "'$active' must be an environment name".to_string(),
                    ));
                };
                environments.active = Some(active.to_string());
            }
            env_name => {
                if !is_valid_identifier(env_name) {
                    return Err(EnvError::InvalidFormat(format!(
                        "invalid environment name '{}': use letters, digits, '_' or '-'",
                        env_name
                    )));
                }
                let variables = parse_variable_map(value, env_name)?;
                environments.add_environment(Environment::with_variables(env_name, variables));
            }
        }
    }

    if let Some(active) = &environments.active {
        if !environments.has_environment(active) {
            return Err(EnvError::InvalidFormat(format!(
                "active environment '{}' does not exist",
                active
            )));
        }
    }

    Ok(environments)
}

fn parse_variable_map(value: &Value, context: &str) -> Result<HashMap<String, String>, EnvError> {
    let obj = value
        .as_object()
        .ok_or_else(|| EnvError::InvalidFormat(format!("'{}' must be a JSON object", context)))?;

    obj.iter()
        .map(|(key, val)| Ok((key.clone(), value_to_string(val, key, context)?)))
        .collect()
}

fn value_to_string(value: &Value, key: &str, context: &str) -> Result<String, EnvError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(EnvError::InvalidFormat(format!(
            "variable '{}' in '{}' must be a string, number or boolean",
            key, context
        ))),
    }
}

/// Environment names start with a letter or `_` and continue with
/// alphanumerics, `_` or `-`.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
