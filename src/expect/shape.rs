//! Structural comparison of JSON responses against saved examples.
//!
//! Values are compared by shape rather than content: the example defines
//! which keys must exist and which JSON type each one holds.

use serde_json::Value;
use std::fmt;

/// One place where the actual response diverges from the example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// JSON path of the offending value, e.g. `$.items[0].price`
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

/// Compares `actual` against the shape of `expected`.
///
/// * objects: every key of `expected` must exist in `actual` and match
///   recursively; extra keys in `actual` are fine
/// * arrays: when both are non-empty, every element of `actual` is checked
///   against the first element of `expected`
/// * scalars: JSON types must agree; `null` on either side matches anything
///
/// Returns every mismatch found, in document order.
///
/// # Examples
///
/// ```
/// use collection_runner::expect::check_shape;
/// use serde_json::json;
///
/// let expected = json!({"id": 1, "name": "Milk"});
/// assert!(check_shape(&expected, &json!({"id": 7, "name": "Bread", "unit": "pcs"})).is_empty());
///
/// let mismatches = check_shape(&expected, &json!({"id": "7"}));
/// assert_eq!(mismatches[0].to_string(), "$.id: expected number, got string");
/// assert_eq!(mismatches[1].to_string(), "$.name: expected string, got missing");
/// ```
pub fn check_shape(expected: &Value, actual: &Value) -> Vec<ShapeMismatch> {
    let mut mismatches = Vec::new();
    compare(expected, actual, "$".to_string(), &mut mismatches);
    mismatches
}

fn compare(expected: &Value, actual: &Value, path: String, out: &mut Vec<ShapeMismatch>) {
    match (expected, actual) {
        (Value::Null, _) | (_, Value::Null) => {}
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let child = child_path(&path, key);
                match act.get(key) {
                    Some(act_value) => compare(exp_value, act_value, child, out),
                    None => out.push(ShapeMismatch {
                        path: child,
                        expected: type_name(exp_value).to_string(),
                        actual: "missing".to_string(),
                    }),
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            if let Some(template) = exp.first() {
                for (index, item) in act.iter().enumerate() {
                    compare(template, item, format!("{}[{}]", path, index), out);
                }
            }
        }
        (exp, act) if type_name(exp) == type_name(act) => {}
        (exp, act) => out.push(ShapeMismatch {
            path,
            expected: type_name(exp).to_string(),
            actual: type_name(act).to_string(),
        }),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    let simple = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if simple {
        format!("{}.{}", parent, key)
    } else {
        format!("{}['{}']", parent, key.replace('\'', "\\'"))
    }
}

/// JSON type name used in mismatch messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
