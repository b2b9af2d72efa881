//! Capture directive parsing.
//!
//! A request description may declare values to pull out of its response and
//! store as variables for the requests that follow:
//!
//! ```text
//! @capture access_token = $.access
//! @capture product_id = $.results[0].id
//! @capture session = headers.X-Session-Id
//! ```
//!
//! Lines may be prefixed with `#`, so the same syntax works in Markdown
//! descriptions.

use once_cell::sync::Lazy;
use regex::Regex;

static CAPTURE_DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:#\s*)?@capture\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*=\s*(.+?)\s*$")
        .expect("capture directive regex is valid")
});

/// Where a captured value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathType {
    /// JSONPath into the response body, e.g. `$.user.id`.
    JsonPath(String),

    /// A response header, e.g. `headers.Location`.
    Header(String),
}

impl PathType {
    /// Classifies a path string.
    ///
    /// `headers.Name` selects a header; anything else is a JSONPath. A path
    /// without a leading `$` is taken relative to the body root.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();

        if let Some(header_name) = trimmed.strip_prefix("headers.") {
            return PathType::Header(header_name.trim().to_string());
        }

        if trimmed.starts_with('$') {
            PathType::JsonPath(trimmed.to_string())
        } else if trimmed.starts_with('[') {
            PathType::JsonPath(format!("${}", trimmed))
        } else {
            PathType::JsonPath(format!("$.{}", trimmed))
        }
    }
}

impl std::fmt::Display for PathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathType::JsonPath(path) => write!(f, "{}", path),
            PathType::Header(name) => write!(f, "headers.{}", name),
        }
    }
}

/// A parsed `@capture` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDirective {
    /// Variable the captured value is stored under.
    pub variable_name: String,

    /// Extraction path.
    pub path: PathType,
}

impl CaptureDirective {
    /// Creates a new CaptureDirective.
    pub fn new(variable_name: impl Into<String>, path: PathType) -> Self {
        Self {
            variable_name: variable_name.into(),
            path,
        }
    }
}

/// Parses a single line, returning `None` when it is not a capture directive.
///
/// # Examples
///
/// ```
/// use collection_runner::variables::capture::{parse_capture_directive, PathType};
///
/// let directive = parse_capture_directive("# @capture token = $.access").unwrap();
/// assert_eq!(directive.variable_name, "token");
/// assert_eq!(directive.path, PathType::JsonPath("$.access".to_string()));
///
/// assert!(parse_capture_directive("Just a description").is_none());
/// ```
pub fn parse_capture_directive(line: &str) -> Option<CaptureDirective> {
    let captures = CAPTURE_DIRECTIVE_REGEX.captures(line)?;
    let variable_name = captures.get(1)?.as_str();
    let path = PathType::from_path(captures.get(2)?.as_str());
    Some(CaptureDirective::new(variable_name, path))
}

/// Parses every capture directive in a block of text.
pub fn parse_capture_directives(text: &str) -> Vec<CaptureDirective> {
    text.lines().filter_map(parse_capture_directive).collect()
}
