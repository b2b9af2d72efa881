//! Content type detection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Content type classification for HTTP responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Json,
    Html,
    PlainText,
    Binary,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "JSON",
            ContentType::Html => "HTML",
            ContentType::PlainText => "Plain Text",
            ContentType::Binary => "Binary",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detects the content type from the Content-Type header, falling back to
/// sniffing the body.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use collection_runner::formatter::{detect_content_type, ContentType};
///
/// let mut headers = HashMap::new();
/// headers.insert("content-type".to_string(), "application/json; charset=utf-8".to_string());
/// assert_eq!(detect_content_type(&headers, b"{}"), ContentType::Json);
/// ```
pub fn detect_content_type(headers: &HashMap<String, String>, body: &[u8]) -> ContentType {
    let header = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_ascii_lowercase());

    if let Some(header) = header {
        let mime = header.split(';').next().unwrap_or("").trim();
        if mime.contains("json") {
            return ContentType::Json;
        } else if mime.contains("html") {
            return ContentType::Html;
        } else if mime.starts_with("text/") || mime.contains("xml") {
            return ContentType::PlainText;
        } else if mime.starts_with("image/")
            || mime == "application/octet-stream"
            || mime.contains("pdf")
            || mime.contains("zip")
        {
            return ContentType::Binary;
        }
    }

    inspect_body_content(body)
}

fn inspect_body_content(body: &[u8]) -> ContentType {
    let Ok(text) = std::str::from_utf8(body) else {
        return ContentType::Binary;
    };
    let trimmed = text.trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(text).is_ok()
    {
        ContentType::Json
    } else if trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case("<!doc")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML")
    {
        ContentType::Html
    } else {
        ContentType::PlainText
    }
}
