//! Export requests as shell commands.

pub mod curl;

pub use curl::{
    escape_shell_arg, generate_curl_command, generate_curl_command_compact,
    generate_curl_with_options, CurlOptions,
};

use crate::models::request::HttpRequest;

/// Renders every request as a cURL command preceded by a `# Folder / Name`
/// comment, separated by blank lines.
///
/// # Examples
///
/// ```
/// use collection_runner::export::{export_collection, CurlOptions};
/// use collection_runner::models::{HttpMethod, HttpRequest};
///
/// let mut request = HttpRequest::new("0", HttpMethod::GET, "http://localhost:8000/customers/");
/// request.name = "List customers".to_string();
/// request.folder = vec!["Customers".to_string()];
///
/// let script = export_collection(&[request], &CurlOptions::default());
/// assert_eq!(script, "# Customers / List customers\ncurl http://localhost:8000/customers/\n");
/// ```
pub fn export_collection(requests: &[HttpRequest], options: &CurlOptions) -> String {
    requests
        .iter()
        .map(|request| {
            format!(
                "# {}\n{}\n",
                request.display_path(),
                generate_curl_with_options(request, options)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
