//! Static checks over a collection, run without sending anything.
//!
//! Each check works on the flattened request list so it sees the same URL,
//! headers, body and inherited auth the runner would use. Variables captured
//! by an earlier request count as defined for every later one.

pub mod diagnostic;

pub use diagnostic::{Diagnostic, Severity};

use crate::auth::AuthSpec;
use crate::collection::Collection;
use crate::environment::Environments;
use crate::executor::validate_url;
use crate::models::request::{HttpMethod, HttpRequest};
use crate::variables::{find_variable_references, substitute_variables, VariableContext};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Stand-in for values that only exist once an earlier response is captured.
const CAPTURE_PLACEHOLDER: &str = "0";

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]+\}\}").expect("placeholder regex is valid"));

/// Lints every request of a collection.
///
/// # Arguments
/// * `collection` - The parsed collection
/// * `environments` - Loaded environments; the active one is used for lookups
/// * `overrides` - `--var key=value` pairs from the command line
///
/// # Returns
/// Diagnostics in request order.
///
/// # Examples
/// ```
/// use collection_runner::collection::parse_collection;
/// use collection_runner::environment::Environments;
/// use collection_runner::lint::{has_errors, lint_collection};
/// use std::collections::HashMap;
///
/// let collection = parse_collection(r#"{
///     "info": {"name": "Inventory"},
///     "item": [{"name": "Categories", "request": {"method": "GET", "url": "{{base_url}}/inventory/categories/"}}]
/// }"#, "inventory.json").unwrap();
///
/// let diagnostics = lint_collection(&collection, &Environments::new(), &HashMap::new());
/// assert_eq!(diagnostics[0].code, "undefined-variable");
/// assert!(!has_errors(&diagnostics));
/// ```
pub fn lint_collection(
    collection: &Collection,
    environments: &Environments,
    overrides: &HashMap<String, String>,
) -> Vec<Diagnostic> {
    let mut context =
        VariableContext::from_sources(environments, collection.variables(), overrides.clone());
    let mut diagnostics = Vec::new();
    let mut seen_names: HashSet<(Vec<String>, String)> = HashSet::new();

    for request in collection.requests() {
        let path = request.display_path();

        if !seen_names.insert((request.folder.clone(), request.name.clone())) {
            diagnostics.push(Diagnostic::warning(
                &path,
                "duplicate-name",
                format!("another request in this folder is also named '{}'", request.name),
            ));
        }

        diagnostics.extend(check_url(&request, &context, &path));
        diagnostics.extend(check_undefined_variables(&request, &context, &path));
        diagnostics.extend(check_body(&request, &path));
        diagnostics.extend(check_auth(&request, &path));

        if request.expectation.is_implicit() {
            diagnostics.push(Diagnostic::info(
                &path,
                "no-expectation",
                "no @expect directive or saved example; any status below 400 passes",
            ));
        }

        for capture in &request.captures {
            context.capture(&capture.variable_name, CAPTURE_PLACEHOLDER);
        }
    }

    diagnostics
}

/// True when any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

fn check_url(request: &HttpRequest, context: &VariableContext, path: &str) -> Option<Diagnostic> {
    if request.url.trim().is_empty() {
        return Some(Diagnostic::error(path, "empty-url", "request has no URL"));
    }

    // Unresolvable URLs are reported as undefined variables instead
    let resolved = substitute_variables(&request.url, context).ok()?;
    match validate_url(&resolved) {
        Ok(_) => None,
        Err(e) => Some(Diagnostic::error(path, "invalid-url", e.to_string())),
    }
}

fn check_undefined_variables(
    request: &HttpRequest,
    context: &VariableContext,
    path: &str,
) -> Vec<Diagnostic> {
    let mut texts: Vec<&str> = vec![request.url.as_str()];
    for (name, value) in &request.headers {
        texts.push(name);
        texts.push(value);
    }
    if let Some(body) = &request.body {
        texts.push(body);
    }
    texts.extend(auth_values(&request.auth));

    let mut reported = HashSet::new();
    texts
        .into_iter()
        .flat_map(find_variable_references)
        .filter(|name| !context.is_defined(name))
        .filter(|name| reported.insert(name.clone()))
        .map(|name| {
            Diagnostic::warning(
                path,
                "undefined-variable",
                format!("undefined variable '{}'", name),
            )
        })
        .collect()
}

fn auth_values(auth: &AuthSpec) -> Vec<&str> {
    match auth {
        AuthSpec::None => Vec::new(),
        AuthSpec::Bearer { token } => vec![token.as_str()],
        AuthSpec::Basic { username, password } => vec![username.as_str(), password.as_str()],
        AuthSpec::ApiKey { key, value, .. } => vec![key.as_str(), value.as_str()],
    }
}

fn check_body(request: &HttpRequest, path: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let Some(body) = request.body.as_deref().filter(|b| !b.trim().is_empty()) else {
        return diagnostics;
    };

    if matches!(request.method, HttpMethod::GET | HttpMethod::HEAD) {
        diagnostics.push(Diagnostic::warning(
            path,
            "body-not-allowed",
            format!("{} request has a body", request.method),
        ));
    }

    let is_json = request
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    if is_json {
        let neutralised = PLACEHOLDER_REGEX.replace_all(body, CAPTURE_PLACEHOLDER);
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&neutralised) {
            diagnostics.push(Diagnostic::error(
                path,
                "invalid-json-body",
                format!("body is not valid JSON: {}", e),
            ));
        }
    }

    diagnostics
}

fn check_auth(request: &HttpRequest, path: &str) -> Option<Diagnostic> {
    match &request.auth {
        AuthSpec::Bearer { token } if token.trim().is_empty() => Some(Diagnostic::error(
            path,
            "missing-token",
            "bearer auth is configured but the token is empty",
        )),
        _ => None,
    }
}
