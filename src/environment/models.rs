//! Named variable sets (`local`, `staging`, ...) that let one collection be
//! replayed against different deployments.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One named environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    pub name: String,

    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_variables(name, HashMap::new())
    }

    pub fn with_variables(name: impl Into<String>, variables: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            variables,
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }
}

/// Every environment from one file, plus the `$shared` layer and the
/// selected `$active` name.
///
/// Environments are keyed by name in sorted order so listings and error
/// messages are stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Environments {
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,

    /// Lowest-priority variables, visible whichever environment is active
    #[serde(default)]
    pub shared: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

impl Environments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `env`, replacing any environment with the same name.
    pub fn add_environment(&mut self, env: Environment) {
        self.environments.insert(env.name.clone(), env);
    }

    /// Selects `name`. Unknown names leave the selection untouched and
    /// return `false`.
    pub fn set_active(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let known = self.environments.contains_key(&name);
        if known {
            self.active = Some(name);
        }
        known
    }

    /// The selected environment. `None` when nothing is selected or the
    /// `$active` name does not match a defined environment.
    pub fn get_active(&self) -> Option<&Environment> {
        self.environments.get(self.active.as_deref()?)
    }

    /// Active environment first, then `$shared`.
    pub fn get_variable(&self, key: &str) -> Option<String> {
        self.get_active()
            .and_then(|env| env.get(key))
            .or_else(|| self.shared.get(key))
            .cloned()
    }

    pub fn set_shared(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.shared.insert(key.into(), value.into());
    }

    pub fn list_environments(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn has_environment(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
