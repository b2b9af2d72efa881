//! HTTP response formatting for terminal output.
//!
//! Used by `run --verbose` to show what the service actually returned next
//! to a failing expectation.

pub mod content_type;
pub mod json;

pub use content_type::{detect_content_type, ContentType};
pub use json::{format_json_pretty, format_json_safe, format_value_pretty};

use crate::models::response::HttpResponse;
use std::collections::HashMap;
use std::time::Duration;

/// Maximum body size shown (64 KiB).
const MAX_DISPLAY_SIZE: usize = 64 * 1024;

/// Bytes shown in a binary hex preview.
const HEX_PREVIEW_SIZE: usize = 256;

/// Errors that can occur during response formatting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("JSON formatting error: {0}")]
    Json(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Response too large to format: {0} bytes")]
    ResponseTooLarge(usize),
}

/// A response rendered for display.
#[derive(Debug, Clone)]
pub struct FormattedResponse {
    pub content_type: ContentType,
    /// e.g. `HTTP/1.1 201 Created`
    pub status_line: String,
    pub headers_text: String,
    pub formatted_body: String,
    pub duration: Duration,
    pub size: usize,
    pub is_truncated: bool,
}

impl FormattedResponse {
    /// Status line, headers, metadata and body as one block of text.
    pub fn to_display_string(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.status_line);
        output.push('\n');
        output.push_str(&self.headers_text);
        output.push('\n');
        output.push_str(&format!(
            "Duration: {} | Size: {} | Type: {}\n",
            format_duration(self.duration),
            format_size(self.size),
            self.content_type
        ));
        if self.is_truncated {
            output.push_str("(body truncated to 64 KiB)\n");
        }
        if !self.formatted_body.is_empty() {
            output.push('\n');
            output.push_str(&self.formatted_body);
            output.push('\n');
        }
        output
    }
}

/// Formats a response for display.
///
/// # Examples
///
/// ```
/// use collection_runner::formatter::format_response;
/// use collection_runner::models::HttpResponse;
///
/// let mut response = HttpResponse::new(200, "OK");
/// response.add_header("content-type", "application/json");
/// response.set_body(br#"{"count":0,"results":[]}"#.to_vec());
///
/// let formatted = format_response(&response);
/// assert_eq!(formatted.status_line, "HTTP/1.1 200 OK");
/// assert!(formatted.formatted_body.contains("\"count\": 0"));
/// ```
pub fn format_response(response: &HttpResponse) -> FormattedResponse {
    let content_type = detect_content_type(&response.headers, &response.body);

    let is_truncated = response.body.len() > MAX_DISPLAY_SIZE;
    let body = &response.body[..response.body.len().min(MAX_DISPLAY_SIZE)];

    let formatted_body = match content_type {
        ContentType::Binary => format_binary_preview(body, response.body.len()),
        // A truncated document is no longer valid JSON, so show it raw
        ContentType::Json if !is_truncated => {
            let text = String::from_utf8_lossy(body);
            format_json_safe(&text)
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    };

    FormattedResponse {
        content_type,
        status_line: format!("HTTP/1.1 {} {}", response.status_code, response.status_text),
        headers_text: format_headers(&response.headers),
        formatted_body,
        duration: response.duration,
        size: response.size,
        is_truncated,
    }
}

/// `567ms` below a second, `1.234s` above.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

/// `456 B`, `1.23 KB` or `4.50 MB`.
pub fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.2} KB", size as f64 / 1024.0)
    } else {
        format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
    }
}

fn format_headers(headers: &HashMap<String, String>) -> String {
    if headers.is_empty() {
        return "(no headers)".to_string();
    }
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect();
    lines.sort();
    lines.join("\n")
}

fn format_binary_preview(body: &[u8], total: usize) -> String {
    let preview = &body[..body.len().min(HEX_PREVIEW_SIZE)];
    let mut output = format!("[binary content, {}]\n", format_size(total));
    for chunk in preview.chunks(16) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        output.push_str(&hex.join(" "));
        output.push('\n');
    }
    output
}
