//! Serde model of the Postman Collection format (v2.0 and v2.1).
//!
//! Only the parts needed to replay requests are modelled. Unknown fields are
//! ignored, and fields Postman sometimes writes as `null` deserialize to
//! their defaults.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A whole collection file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub info: Info,
    #[serde(default, deserialize_with = "null_as_default")]
    pub item: Vec<Item>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variable: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
}

/// Free text, either a plain string or `{"content": "...", "type": "text/markdown"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Rich {
        #[serde(default)]
        content: Option<String>,
    },
}

impl Description {
    pub fn as_text(&self) -> &str {
        match self {
            Description::Text(text) => text,
            Description::Rich { content } => content.as_deref().unwrap_or(""),
        }
    }
}

/// A folder (has `item`) or a request (has `request`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestDef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: Vec<SavedResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthBlock>,
    /// Pre-request and test scripts; kept for round-tripping, never run
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: Vec<Value>,
}

/// A request is either a bare URL string (v2.0 shorthand) or a full object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestDef {
    Url(String),
    Full(RequestSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<UrlSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlSpec {
    Raw(String),
    Detailed(UrlDetail),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Segments>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Segments>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: Vec<QueryParam>,
}

/// Host and path are written as a single string or a list of segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segments {
    Joined(String),
    List(Vec<Segment>),
}

/// A path segment; v2.0 allows `{"type": "string", "value": "..."}` objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Text(String),
    Object {
        #[serde(default)]
        value: String,
    },
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Object { value } => value,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParam {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urlencoded: Vec<FormParam>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formdata: Vec<FormParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BodyOptions>,
}

impl BodySpec {
    /// `options.raw.language`, e.g. `json`
    pub fn raw_language(&self) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|o| o.raw.as_ref())
            .and_then(|r| r.language.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormParam {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `text` or `file`
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Authentication block attached to a collection, folder or request.
///
/// The parameters for `type` live under a key of the same name, as a
/// `[{"key": .., "value": ..}]` list (v2.1) or a plain object (v2.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthBlock {
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl AuthBlock {
    /// Looks up one parameter of a scheme, stringifying non-string values.
    pub fn param(&self, scheme: &str, key: &str) -> Option<String> {
        let value = match self.params.get(scheme)? {
            Value::Array(entries) => entries
                .iter()
                .find(|entry| entry.get("key").and_then(Value::as_str) == Some(key))
                .and_then(|entry| entry.get("value"))?,
            Value::Object(map) => map.get(key)?,
            _ => return None,
        };
        value_to_string(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub disabled: bool,
}

/// A saved example response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Strings as-is, numbers and booleans via `to_string`, `null` as nothing.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
