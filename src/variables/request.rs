//! Value extraction from HTTP responses.
//!
//! Evaluates a capture path against a response: a small JSONPath subset over
//! the JSON body, or a case-insensitive header lookup.

use super::{capture::PathType, VarError};
use crate::models::response::HttpResponse;
use serde_json::Value as JsonValue;

/// Extracts a value from a response.
///
/// Strings are returned without quotes, numbers/booleans/null as their JSON
/// text, objects and arrays as compact JSON.
///
/// # Examples
///
/// ```
/// use collection_runner::models::response::HttpResponse;
/// use collection_runner::variables::capture::PathType;
/// use collection_runner::variables::request::extract_response_variable;
///
/// let mut response = HttpResponse::new(200, "OK");
/// response.set_body(br#"{"results": [{"id": 42, "name": "Milk"}]}"#.to_vec());
///
/// let path = PathType::JsonPath("$.results[0].id".to_string());
/// assert_eq!(extract_response_variable(&response, &path).unwrap(), "42");
/// ```
pub fn extract_response_variable(
    response: &HttpResponse,
    path: &PathType,
) -> Result<String, VarError> {
    match path {
        PathType::Header(name) => response
            .header(name)
            .map(str::to_string)
            .ok_or_else(|| VarError::Capture(format!("header '{}' not found in response", name))),
        PathType::JsonPath(jsonpath) => {
            let json: JsonValue = serde_json::from_slice(&response.body).map_err(|e| {
                VarError::Capture(format!("response body is not valid JSON: {}", e))
            })?;
            let value = evaluate_jsonpath(&json, jsonpath)?;
            json_value_to_string(value)
        }
    }
}

/// Segment of a JSONPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Evaluates a JSONPath subset: `$`, `.field`, `[index]` and `['field']`.
pub(crate) fn evaluate_jsonpath<'a>(
    json: &'a JsonValue,
    path: &str,
) -> Result<&'a JsonValue, VarError> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);

    let mut current = json;
    for segment in parse_jsonpath_segments(path)? {
        current = match &segment {
            PathSegment::Field(name) => current.get(name.as_str()).ok_or_else(|| {
                VarError::Capture(format!("field '{}' not found in response JSON", name))
            })?,
            PathSegment::Index(index) => current.get(*index).ok_or_else(|| {
                VarError::Capture(format!("array index {} out of bounds", index))
            })?,
        };
    }

    Ok(current)
}

fn parse_jsonpath_segments(path: &str) -> Result<Vec<PathSegment>, VarError> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Field(std::mem::take(&mut current)));
                }

                let mut inner = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(next);
                }
                if !closed {
                    return Err(VarError::InvalidSyntax(format!(
                        "unclosed '[' in path '{}'",
                        path
                    )));
                }

                let inner = inner.trim();
                let quoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));

                match quoted {
                    Some(field) => segments.push(PathSegment::Field(field.to_string())),
                    None => {
                        let index = inner.parse::<usize>().map_err(|_| {
                            VarError::InvalidSyntax(format!("invalid array index '{}'", inner))
                        })?;
                        segments.push(PathSegment::Index(index));
                    }
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(PathSegment::Field(current));
    }

    Ok(segments)
}

fn json_value_to_string(value: &JsonValue) -> Result<String, VarError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Null => Ok("null".to_string()),
        JsonValue::Array(_) | JsonValue::Object(_) => serde_json::to_string(value)
            .map_err(|e| VarError::Capture(format!("failed to serialize JSON value: {}", e))),
    }
}
