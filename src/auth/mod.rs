//! HTTP authentication.
//!
//! Collections describe authentication with Postman auth blocks attached to
//! the collection, a folder, or a single request. This module turns those
//! blocks into an [`AuthSpec`] and applies it to a request once its
//! variables have been resolved.

pub mod basic;
pub mod bearer;

use crate::collection::schema::AuthBlock;
use crate::models::request::HttpRequest;
use log::{debug, warn};

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// Authentication attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthSpec {
    /// No authentication
    #[default]
    None,
    /// Bearer token authentication (RFC 6750)
    Bearer { token: String },
    /// HTTP Basic authentication (RFC 7617)
    Basic { username: String, password: String },
    /// API key sent as a header or query parameter
    ApiKey {
        key: String,
        value: String,
        location: ApiKeyLocation,
    },
}

/// Errors that can occur while applying authentication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Required credentials are empty
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// The request URL cannot carry a query parameter
    #[error("invalid URL for API key: {0}")]
    InvalidUrl(String),
}

impl AuthSpec {
    /// Builds an `AuthSpec` from a Postman auth block.
    ///
    /// Both the v2.1 list encoding (`"bearer": [{"key": "token", "value": ".."}]`)
    /// and the v2.0 object encoding (`"bearer": {"token": ".."}`) are accepted.
    /// `noauth` and unsupported types (oauth2, digest, ...) yield `AuthSpec::None`.
    pub fn from_block(block: &AuthBlock) -> Self {
        match block.auth_type.as_str() {
            "noauth" => AuthSpec::None,
            "bearer" => AuthSpec::Bearer {
                token: block.param("bearer", "token").unwrap_or_default(),
            },
            "basic" => AuthSpec::Basic {
                username: block.param("basic", "username").unwrap_or_default(),
                password: block.param("basic", "password").unwrap_or_default(),
            },
            "apikey" => {
                let location = match block.param("apikey", "in").as_deref() {
                    Some("query") => ApiKeyLocation::Query,
                    _ => ApiKeyLocation::Header,
                };
                AuthSpec::ApiKey {
                    key: block
                        .param("apikey", "key")
                        .unwrap_or_else(|| "X-API-Key".to_string()),
                    value: block.param("apikey", "value").unwrap_or_default(),
                    location,
                }
            }
            other => {
                warn!("unsupported auth type '{}', sending request without auth", other);
                AuthSpec::None
            }
        }
    }

    /// Returns true for [`AuthSpec::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, AuthSpec::None)
    }

    /// Short scheme name for listings and diagnostics.
    pub fn scheme_name(&self) -> &'static str {
        match self {
            AuthSpec::None => "none",
            AuthSpec::Bearer { .. } => "bearer",
            AuthSpec::Basic { .. } => "basic",
            AuthSpec::ApiKey { .. } => "apikey",
        }
    }

    /// Applies `f` to every credential string, e.g. to substitute variables.
    pub fn try_map_values<E, F>(&self, mut f: F) -> Result<AuthSpec, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        Ok(match self {
            AuthSpec::None => AuthSpec::None,
            AuthSpec::Bearer { token } => AuthSpec::Bearer { token: f(token)? },
            AuthSpec::Basic { username, password } => AuthSpec::Basic {
                username: f(username)?,
                password: f(password)?,
            },
            AuthSpec::ApiKey {
                key,
                value,
                location,
            } => AuthSpec::ApiKey {
                key: f(key)?,
                value: f(value)?,
                location: *location,
            },
        })
    }
}

/// Applies authentication to a request whose variables are already resolved.
///
/// An `Authorization` header written explicitly on the request wins over
/// Bearer and Basic auth.
///
/// # Errors
///
/// Returns [`AuthError::MissingCredentials`] for an empty bearer token,
/// basic username, or API key name.
pub fn apply_auth(request: &mut HttpRequest, auth: &AuthSpec) -> Result<(), AuthError> {
    match auth {
        AuthSpec::None => Ok(()),
        AuthSpec::Bearer { token } => {
            if request.has_header("Authorization") {
                debug!("{}: keeping explicit Authorization header", request.name);
                return Ok(());
            }
            if token.trim().is_empty() {
                return Err(AuthError::MissingCredentials(format!(
                    "bearer token for '{}' is empty",
                    request.name
                )));
            }
            request.add_header("Authorization", bearer::bearer_token(token.trim()));
            Ok(())
        }
        AuthSpec::Basic { username, password } => {
            if request.has_header("Authorization") {
                debug!("{}: keeping explicit Authorization header", request.name);
                return Ok(());
            }
            if username.is_empty() {
                return Err(AuthError::MissingCredentials(format!(
                    "basic auth username for '{}' is empty",
                    request.name
                )));
            }
            request.add_header("Authorization", basic::basic_auth(username, password));
            Ok(())
        }
        AuthSpec::ApiKey {
            key,
            value,
            location,
        } => {
            if key.trim().is_empty() {
                return Err(AuthError::MissingCredentials(format!(
                    "API key name for '{}' is empty",
                    request.name
                )));
            }
            match location {
                ApiKeyLocation::Header => {
                    if !request.has_header(key) {
                        request.add_header(key.clone(), value.clone());
                    }
                }
                ApiKeyLocation::Query => {
                    request.url = append_query_param(&request.url, key, value)?;
                }
            }
            Ok(())
        }
    }
}

fn append_query_param(raw_url: &str, key: &str, value: &str) -> Result<String, AuthError> {
    let mut url = url::Url::parse(raw_url).map_err(|e| AuthError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.to_string())
}
