//! JSON pretty-printing.

use crate::formatter::FormatError;
use serde::Serialize;
use serde_json::Value;

/// Maximum JSON size to reformat (10MB).
const MAX_JSON_FORMAT_SIZE: usize = 10 * 1024 * 1024;

/// Formats JSON with 2-space indentation.
///
/// # Errors
///
/// Returns [`FormatError::Json`] for malformed input and
/// [`FormatError::ResponseTooLarge`] above 10MB.
///
/// # Examples
///
/// ```
/// use collection_runner::formatter::format_json_pretty;
///
/// let formatted = format_json_pretty(r#"{"name":"Milk","sale_price":"12000.00"}"#).unwrap();
/// assert!(formatted.contains("  \"name\": \"Milk\""));
/// ```
pub fn format_json_pretty(json: &str) -> Result<String, FormatError> {
    if json.len() > MAX_JSON_FORMAT_SIZE {
        return Err(FormatError::ResponseTooLarge(json.len()));
    }

    let value: Value = serde_json::from_str(json).map_err(|e| FormatError::Json(e.to_string()))?;
    format_value_pretty(&value)
}

/// Formats an already parsed value with 2-space indentation.
pub fn format_value_pretty(value: &Value) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| FormatError::Json(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| FormatError::Encoding(e.to_string()))
}

/// Pretty-prints when possible, otherwise returns the input unchanged.
pub fn format_json_safe(json: &str) -> String {
    format_json_pretty(json).unwrap_or_else(|_| json.to_string())
}
