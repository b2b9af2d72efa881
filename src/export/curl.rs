//! cURL command generator.
//!
//! Converts requests into shell-safe cURL commands, keeping header order as
//! written in the collection.

use crate::models::request::{HttpMethod, HttpRequest};

/// Options for cURL command generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurlOptions {
    /// Generate a single-line command
    pub compact: bool,
    /// Include the insecure flag (-k)
    pub insecure: bool,
}

/// Generates a cURL command, split over several lines when longer than
/// 80 characters.
///
/// # Examples
///
/// ```
/// use collection_runner::export::generate_curl_command;
/// use collection_runner::models::{HttpMethod, HttpRequest};
///
/// let mut request = HttpRequest::new("0", HttpMethod::POST, "http://localhost:8000/sales/transactions/");
/// request.add_header("Content-Type", "application/json");
/// request.set_body(r#"{"items":[{"product_id":1,"quantity":2}],"payment_method":"cash"}"#);
///
/// let curl = generate_curl_command(&request);
/// assert!(curl.starts_with("curl \\\n  -X POST"));
/// assert!(curl.contains("--data-raw '{\"items\""));
/// ```
pub fn generate_curl_command(request: &HttpRequest) -> String {
    format_multiline(&command_parts(request, &CurlOptions::default()))
}

/// Generates a single-line cURL command.
pub fn generate_curl_command_compact(request: &HttpRequest) -> String {
    command_parts(request, &CurlOptions::default()).join(" ")
}

/// Generates a cURL command honouring `options`.
pub fn generate_curl_with_options(request: &HttpRequest, options: &CurlOptions) -> String {
    let parts = command_parts(request, options);
    if options.compact {
        parts.join(" ")
    } else {
        format_multiline(&parts)
    }
}

/// Flag and value pairs stay together so line breaks never separate them.
fn command_parts(request: &HttpRequest, options: &CurlOptions) -> Vec<String> {
    let mut parts = vec!["curl".to_string()];

    if options.insecure {
        parts.push("-k".to_string());
    }

    if request.method == HttpMethod::HEAD {
        parts.push("-I".to_string());
    } else if request.method != HttpMethod::GET {
        parts.push(format!("-X {}", request.method.as_str()));
    }

    for (name, value) in &request.headers {
        parts.push(format!(
            "-H {}",
            escape_shell_arg(&format!("{}: {}", name, value))
        ));
    }

    if let Some(body) = &request.body {
        parts.push(format!("--data-raw {}", escape_shell_arg(body)));
    }

    parts.push(escape_shell_arg(&request.url));
    parts
}

/// Single-quotes an argument when it contains shell metacharacters,
/// escaping embedded single quotes as `'\''`.
pub fn escape_shell_arg(arg: &str) -> String {
    if needs_quoting(arg) {
        format!("'{}'", arg.replace('\'', "'\\''"))
    } else {
        arg.to_string()
    }
}

fn needs_quoting(s: &str) -> bool {
    const SPECIAL: &[char] = &[
        ' ', '\t', '\n', '\r', '|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', '*',
        '?', '[', ']', '#', '~', '=', '%', '{', '}', '!',
    ];
    s.is_empty() || s.chars().any(|c| SPECIAL.contains(&c))
}

fn format_multiline(parts: &[String]) -> String {
    let single_line = parts.join(" ");
    if single_line.len() <= 80 {
        return single_line;
    }

    let mut result = parts[0].clone();
    for part in &parts[1..] {
        result.push_str(" \\\n  ");
        result.push_str(part);
    }
    result
}
