//! Responses received while replaying a collection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timing breakdown for an executed request.
///
/// reqwest does not expose DNS/TCP/TLS phases separately, so connection
/// setup and request upload are folded into `connect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestTiming {
    /// From request start until the request was handed to the connection.
    pub connect: Duration,

    /// Time to first byte: from request sent to response headers received.
    pub first_byte: Duration,

    /// Time spent reading the response body.
    pub download: Duration,
}

impl RequestTiming {
    /// Creates a timing with all phases set to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all phases.
    pub fn total(&self) -> Duration {
        self.connect + self.first_byte + self.download
    }
}

/// A response as the executor recorded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404, 500).
    pub status_code: u16,

    /// Canonical reason phrase ("OK", "Not Found", ...).
    pub status_text: String,

    /// Response headers. Names are stored lowercase by the executor.
    pub headers: HashMap<String, String>,

    /// Response body as raw bytes.
    pub body: Vec<u8>,

    /// Total request duration from start to completion.
    pub duration: Duration,

    /// Detailed performance timing breakdown.
    pub timing: RequestTiming,

    /// Approximate size of headers plus body, in bytes.
    pub size: usize,
}

impl HttpResponse {
    /// Creates a new HttpResponse with the given status code and text.
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            duration: Duration::ZERO,
            timing: RequestTiming::new(),
            size: 0,
        }
    }

    /// Looks up a header value case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets the Content-Type header value if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Parses the body as JSON, returning `None` when it is not valid JSON.
    pub fn body_as_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Adds a header to the response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
        self.size = self.calculate_headers_size() + self.body.len();
    }

    /// Sets the response body and recomputes the size.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.size = self.calculate_headers_size() + body.len();
        self.body = body;
    }

    fn calculate_headers_size(&self) -> usize {
        self.headers
            .iter()
            .map(|(k, v)| k.len() + v.len() + 4) // ": " and "\r\n"
            .sum()
    }
}
