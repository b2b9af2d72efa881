//! HTTP request executor.
//!
//! [`HttpExecutor`] owns a single `reqwest::Client` for the duration of a
//! run, so keep-alive connections are reused from one request to the next.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod timing;

pub use cancellation::CancellationToken;
pub use config::ExecutionConfig;
pub use error::RequestError;
pub use timing::{format_timing_compact, TimingCheckpoints};

use crate::models::request::{HttpMethod, HttpRequest};
use crate::models::response::HttpResponse;
use log::{debug, trace};
use reqwest::redirect::Policy;
use std::collections::HashMap;

/// Executes requests with one shared client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    config: ExecutionConfig,
}

impl HttpExecutor {
    /// Builds the underlying client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Build`] if the TLS backend cannot be initialised.
    pub fn new(config: ExecutionConfig) -> Result<Self, RequestError> {
        let redirect = if config.follow_redirects {
            Policy::limited(config.max_redirects as usize)
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(redirect)
            .danger_accept_invalid_certs(!config.validate_ssl)
            .build()
            .map_err(|e| RequestError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Builds an executor from the global configuration.
    pub fn from_global_config() -> Result<Self, RequestError> {
        Self::new(ExecutionConfig::from_global_config())
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Sends a fully resolved request and reads the whole response.
    ///
    /// Any status code, including 4xx and 5xx, is a successful execution;
    /// judging the status is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed URLs, non-HTTP schemes, network
    /// failures, TLS failures, and timeouts.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        let url = validate_url(&request.url)?;
        let mut checkpoints = TimingCheckpoints::new();

        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in &self.config.default_headers {
            if !request.has_header(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!("{} {}", request.method, request.url);
        checkpoints.mark_request_sent();
        let response = builder.send().await?;
        checkpoints.mark_first_byte_received();

        let status = response.status();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => {
                    headers
                        .entry(name.as_str().to_string())
                        .and_modify(|existing: &mut String| {
                            existing.push_str(", ");
                            existing.push_str(value);
                        })
                        .or_insert_with(|| value.to_string());
                }
                Err(_) => trace!("dropping non-UTF-8 response header {}", name),
            }
        }

        let body = response.bytes().await?.to_vec();
        checkpoints.mark_response_complete();

        let timing = checkpoints.to_request_timing();
        let headers_size: usize = headers.iter().map(|(k, v)| k.len() + v.len() + 4).sum();

        let mut http_response = HttpResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
        );
        http_response.size = headers_size + body.len();
        http_response.headers = headers;
        http_response.body = body;
        http_response.duration = timing.total();
        http_response.timing = timing;

        debug!(
            "{} {} -> {} in {:?}",
            request.method, request.url, http_response.status_code, http_response.duration
        );
        Ok(http_response)
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
        HttpMethod::TRACE => reqwest::Method::TRACE,
        HttpMethod::CONNECT => reqwest::Method::CONNECT,
    }
}

/// Parses the URL and checks that it uses HTTP or HTTPS.
pub fn validate_url(raw: &str) -> Result<url::Url, RequestError> {
    let parsed = url::Url::parse(raw).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RequestError::UnsupportedProtocol(format!(
            "only HTTP and HTTPS are supported, got: {}",
            scheme
        ))),
    }
}
