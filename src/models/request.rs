//! One flattened collection request: method, URL, headers and body, plus
//! the auth, capture and expectation metadata attached to it.

use crate::auth::AuthSpec;
use crate::expect::Expectation;
use crate::variables::CaptureDirective;
use serde::{Deserialize, Serialize};

/// HTTP request method. Collections write these uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
    TRACE,
    CONNECT,
}

impl HttpMethod {
    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
        }
    }

    /// Parses a method name, ignoring case.
    ///
    /// # Returns
    ///
    /// `Some(HttpMethod)` if the string is a valid HTTP method, `None` otherwise.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "HEAD" => Some(HttpMethod::HEAD),
            "TRACE" => Some(HttpMethod::TRACE),
            "CONNECT" => Some(HttpMethod::CONNECT),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single request description flattened out of a collection.
///
/// The URL, header values, body and auth parameters may still contain
/// `{{variable}}` placeholders; the runner resolves them right before
/// execution.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Position-derived identifier, stable for a given collection file.
    pub id: String,

    /// Human readable request name from the collection.
    pub name: String,

    /// Names of the enclosing folders, outermost first.
    pub folder: Vec<String>,

    /// HTTP method (GET, POST, PUT, DELETE, etc.).
    pub method: HttpMethod,

    /// Target URL, possibly containing `{{variables}}`.
    pub url: String,

    /// Request headers in collection order.
    ///
    /// Names are compared case-insensitively but stored as written.
    pub headers: Vec<(String, String)>,

    /// Optional request body, sent verbatim.
    pub body: Option<String>,

    /// Effective authentication after folder/collection inheritance.
    pub auth: AuthSpec,

    /// Values to capture from the response for later requests.
    pub captures: Vec<CaptureDirective>,

    /// What a passing response looks like.
    pub expectation: Expectation,
}

impl HttpRequest {
    /// Creates a new request with no headers, body, auth or captures.
    pub fn new(id: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            folder: Vec::new(),
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            auth: AuthSpec::None,
            captures: Vec::new(),
            expectation: Expectation::default(),
        }
    }

    /// Adds a header, replacing any existing header with the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    /// Looks up a header value case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header with this name is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Sets the request body.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// Gets the Content-Type header value if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Folder path and name joined for display, e.g. `Inventory / Batches / Create batch`.
    pub fn display_path(&self) -> String {
        if self.folder.is_empty() {
            return self.name.clone();
        }
        let mut parts: Vec<&str> = self.folder.iter().map(String::as_str).collect();
        parts.push(&self.name);
        parts.join(" / ")
    }
}
