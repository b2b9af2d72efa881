//! Variable substitution engine.
//!
//! Replaces `{{variable}}` patterns in request text with their resolved
//! values. Supports nested variables, circular reference detection, escaped
//! braces and the `$`-prefixed system variables.

use super::system::{is_system_variable, resolve_system_variable, VarError};
use crate::environment::{Environment, Environments};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Maximum recursion depth for nested variable substitution
const MAX_RECURSION_DEPTH: usize = 10;

const ESCAPED_OPEN: &str = "\u{E000}";
const ESCAPED_CLOSE: &str = "\u{E001}";

/// Matches `{{name}}` with optional inner whitespace.
static VARIABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("variable regex is valid"));

/// All variable sources available while resolving one request.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Values captured from earlier responses in the same run.
    pub captured: HashMap<String, String>,

    /// Values given on the command line with `--var key=value`.
    pub overrides: HashMap<String, String>,

    /// The active environment, if one was selected.
    pub environment: Option<Environment>,

    /// Variables declared on the collection itself.
    pub collection: HashMap<String, String>,

    /// Variables shared across every environment.
    pub shared: HashMap<String, String>,
}

impl VariableContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from loaded environments and collection variables.
    pub fn from_sources(
        environments: &Environments,
        collection: HashMap<String, String>,
        overrides: HashMap<String, String>,
    ) -> Self {
        Self {
            captured: HashMap::new(),
            overrides,
            environment: environments.get_active().cloned(),
            collection,
            shared: environments.shared.clone(),
        }
    }

    /// Records a value captured from a response.
    pub fn capture(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.captured.insert(name.into(), value.into());
    }

    /// Whether `name` resolves from any source (system variables included).
    pub fn is_defined(&self, name: &str) -> bool {
        if let Some(system) = name.strip_prefix('$') {
            let base = system.split_whitespace().next().unwrap_or_default();
            return is_system_variable(base);
        }
        self.lookup(name).is_some()
    }

    /// Resolves a variable by name, checking all sources in priority order:
    ///
    /// 1. System variables (`$` prefix)
    /// 2. Captured response values
    /// 3. Command-line overrides
    /// 4. Active environment
    /// 5. Collection variables
    /// 6. Shared environment variables
    fn resolve_variable(&self, name: &str) -> Result<String, VarError> {
        if let Some(system) = name.strip_prefix('$') {
            let mut parts = system.split_whitespace();
            let var_name = parts.next().ok_or_else(|| {
                VarError::InvalidSyntax("empty system variable name".to_string())
            })?;
            let args: Vec<&str> = parts.collect();
            return resolve_system_variable(var_name, &args);
        }

        self.lookup(name)
            .cloned()
            .ok_or_else(|| VarError::Undefined(name.to_string()))
    }

    fn lookup(&self, name: &str) -> Option<&String> {
        self.captured
            .get(name)
            .or_else(|| self.overrides.get(name))
            .or_else(|| self.environment.as_ref().and_then(|env| env.get(name)))
            .or_else(|| self.collection.get(name))
            .or_else(|| self.shared.get(name))
    }
}

/// Substitutes all `{{variable}}` patterns in `text`.
///
/// Escaped braces (`\{{` and `\}}`) are kept as literal `{{` / `}}`.
/// Resolved values are themselves substituted, so a variable may refer to
/// another one.
///
/// # Errors
///
/// Fails when a variable is undefined, a circular reference is detected, or
/// nesting exceeds the maximum depth.
///
/// # Examples
///
/// ```
/// use collection_runner::variables::substitution::{substitute_variables, VariableContext};
///
/// let mut context = VariableContext::new();
/// context.collection.insert("base_url".to_string(), "http://localhost:8000".to_string());
///
/// let result = substitute_variables("{{base_url}}/inventory/products/", &context).unwrap();
/// assert_eq!(result, "http://localhost:8000/inventory/products/");
/// ```
pub fn substitute_variables(text: &str, context: &VariableContext) -> Result<String, VarError> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let escaped = text
        .replace("\\{{", ESCAPED_OPEN)
        .replace("\\}}", ESCAPED_CLOSE);
    let result = substitute_with_depth(&escaped, context, 0, &mut HashSet::new())?;

    Ok(result
        .replace(ESCAPED_OPEN, "{{")
        .replace(ESCAPED_CLOSE, "}}"))
}

fn substitute_with_depth(
    text: &str,
    context: &VariableContext,
    depth: usize,
    visiting: &mut HashSet<String>,
) -> Result<String, VarError> {
    if depth >= MAX_RECURSION_DEPTH {
        return Err(VarError::CircularReference(
            "maximum nesting depth exceeded".to_string(),
        ));
    }

    let mut result = String::with_capacity(text.len() + text.len() / 4);
    let mut last_match_end = 0;

    for cap in VARIABLE_REGEX.captures_iter(text) {
        let (Some(full_match), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = name.as_str().trim();

        result.push_str(&text[last_match_end..full_match.start()]);

        if visiting.contains(var_name) {
            return Err(VarError::CircularReference(format!(
                "variable '{}' refers to itself",
                var_name
            )));
        }

        let resolved = context.resolve_variable(var_name)?;

        // System variables produce fresh values, never nested references
        let substituted = if var_name.starts_with('$') {
            resolved
        } else {
            visiting.insert(var_name.to_string());
            let nested = substitute_with_depth(&resolved, context, depth + 1, visiting)?;
            visiting.remove(var_name);
            nested
        };

        result.push_str(&substituted);
        last_match_end = full_match.end();
    }

    result.push_str(&text[last_match_end..]);
    Ok(result)
}

/// Lists the variable names referenced in `text`, in order of appearance.
///
/// Escaped references are ignored; duplicates are kept.
pub fn find_variable_references(text: &str) -> Vec<String> {
    let escaped = text
        .replace("\\{{", ESCAPED_OPEN)
        .replace("\\}}", ESCAPED_CLOSE);

    VARIABLE_REGEX
        .captures_iter(&escaped)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}
