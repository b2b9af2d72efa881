//! HTTP request execution error types.

/// Errors that can occur while executing a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Connection failures, DNS errors and other network-level issues.
    #[error("Network error: {0}")]
    Network(String),

    /// The request took longer than the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Only HTTP and HTTPS are supported.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Certificate validation or handshake failure.
    #[error("TLS/SSL error: {0}")]
    Tls(String),

    /// The request or client could not be constructed.
    #[error("Request build error: {0}")]
    Build(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_builder() {
            RequestError::Build(message)
        } else if is_tls_error(&err) {
            RequestError::Tls(message)
        } else {
            RequestError::Network(message)
        }
    }
}

impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::InvalidUrl(err.to_string())
    }
}

/// reqwest has no TLS predicate; walk the source chain instead.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&dyn std::error::Error> = Some(err);
    while let Some(e) = source {
        let text = e.to_string();
        if text.contains("certificate") || text.contains("TLS") || text.contains("SSL") {
            return true;
        }
        source = e.source();
    }
    false
}
