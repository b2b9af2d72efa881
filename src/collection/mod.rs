//! Postman collection loading.
//!
//! A collection is a named tree of folders and request descriptions. This
//! module reads v2.0 and v2.1 exports and flattens them into the ordered
//! [`HttpRequest`] list a run replays.
//!
//! # Examples
//!
//! ```
//! use collection_runner::collection::parse_collection;
//!
//! let collection = parse_collection(
//!     r#"{
//!         "info": {"name": "SomPOS"},
//!         "item": [{
//!             "name": "Inventory",
//!             "item": [{"name": "List products", "request": {"method": "GET", "url": "{{base_url}}/inventory/products/"}}]
//!         }]
//!     }"#,
//!     "inline",
//! )
//! .unwrap();
//!
//! let requests = collection.requests();
//! assert_eq!(requests[0].display_path(), "Inventory / List products");
//! ```

mod flatten;
pub mod schema;

pub use schema::Collection;

use crate::models::request::HttpRequest;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while loading a collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("failed to read collection {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in collection {source_name}: {source}")]
    Json {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid collection {source_name}: {message}")]
    InvalidFormat {
        source_name: String,
        message: String,
    },
}

const SUPPORTED_SCHEMAS: &[&str] = &["v2.0.0", "v2.1.0"];

/// Reads and parses a collection file.
pub fn load_collection(path: &Path) -> Result<Collection, CollectionError> {
    let content = fs::read_to_string(path).map_err(|source| CollectionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("loading collection from {}", path.display());
    parse_collection(&content, &path.display().to_string())
}

/// Parses collection JSON; `source_name` only appears in error messages.
pub fn parse_collection(content: &str, source_name: &str) -> Result<Collection, CollectionError> {
    let invalid = |message: &str| CollectionError::InvalidFormat {
        source_name: source_name.to_string(),
        message: message.to_string(),
    };
    let json_error = |source| CollectionError::Json {
        source_name: source_name.to_string(),
        source,
    };

    let raw: Value = serde_json::from_str(content).map_err(json_error)?;
    let root = raw
        .as_object()
        .ok_or_else(|| invalid("root must be a JSON object"))?;

    let Some(info) = root.get("info") else {
        if root.contains_key("requests") {
            return Err(invalid(
                "Postman v1 collections are not supported, re-export as v2.1",
            ));
        }
        return Err(invalid("missing 'info' object"));
    };
    let has_name = info
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        return Err(invalid("missing 'info.name'"));
    }
    if let Some(schema) = info.get("schema").and_then(Value::as_str) {
        if !SUPPORTED_SCHEMAS.iter().any(|v| schema.contains(v)) {
            warn!("{}: unrecognised schema '{}', parsing as v2.1", source_name, schema);
        }
    }

    serde_json::from_value(raw).map_err(json_error)
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// All requests in document order, folders flattened.
    pub fn requests(&self) -> Vec<HttpRequest> {
        flatten::flatten(self)
    }

    /// Enabled collection variables; non-string values are stringified.
    pub fn variables(&self) -> HashMap<String, String> {
        self.variable
            .iter()
            .filter(|v| !v.disabled)
            .map(|v| {
                let value = v
                    .value
                    .as_ref()
                    .and_then(schema::value_to_string)
                    .unwrap_or_default();
                (v.key.clone(), value)
            })
            .collect()
    }

    /// Distinct folder paths in document order, including empty folders.
    pub fn folders(&self) -> Vec<Vec<String>> {
        fn collect(items: &[schema::Item], path: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
            for item in items {
                if let Some(children) = &item.item {
                    path.push(item.name.clone());
                    out.push(path.clone());
                    collect(children, path, out);
                    path.pop();
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.item, &mut Vec::new(), &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSpec;
    use crate::expect::StatusExpectation;
    use crate::models::request::HttpMethod;
    use crate::variables::PathType;

    const COLLECTION: &str = r#"{
        "info": {
            "name": "SomPOS API",
            "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json"
        },
        "auth": {"type": "bearer", "bearer": [{"key": "token", "value": "{{access_token}}"}]},
        "variable": [
            {"key": "base_url", "value": "http://localhost:8000"},
            {"key": "limit", "value": 10},
            {"key": "old", "value": "x", "disabled": true}
        ],
        "item": [
            {
                "name": "Auth",
                "auth": {"type": "noauth"},
                "item": [{
                    "name": "Login",
                    "description": "@capture access_token = $.access",
                    "request": {
                        "method": "POST",
                        "url": {"raw": "{{base_url}}/users/login/"},
                        "body": {"mode": "raw", "raw": "{\"username\": \"admin\", \"password\": \"admin\"}", "options": {"raw": {"language": "json"}}}
                    },
                    "response": [{"name": "ok", "code": 200, "body": "{\"access\": \"a\", \"refresh\": \"r\"}"}]
                }]
            },
            {
                "name": "Inventory",
                "item": [
                    {
                        "name": "Products",
                        "item": [{
                            "name": "List products",
                            "request": {
                                "method": "get",
                                "url": "{{base_url}}/inventory/products/",
                                "header": [
                                    {"key": "Accept", "value": "application/json"},
                                    {"key": "X-Debug", "value": "1", "disabled": true}
                                ]
                            }
                        }]
                    },
                    {
                        "name": "Sell more than available",
                        "request": {
                            "method": "POST",
                            "url": "{{base_url}}/sales/transactions/",
                            "description": "Stock is 5, request 500.\n@expect status 400",
                            "body": {"mode": "urlencoded", "urlencoded": [
                                {"key": "product_id", "value": "{{product_id}}"},
                                {"key": "quantity", "value": "500"},
                                {"key": "note", "value": "x", "disabled": true}
                            ]}
                        }
                    }
                ]
            },
            {"name": "Empty", "item": []}
        ]
    }"#;

    #[test]
    fn test_flatten_order_and_folders() {
        let collection = parse_collection(COLLECTION, "test").unwrap();
        assert_eq!(collection.name(), "SomPOS API");

        let requests = collection.requests();
        let paths: Vec<String> = requests.iter().map(|r| r.display_path()).collect();
        assert_eq!(
            paths,
            vec![
                "Auth / Login",
                "Inventory / Products / List products",
                "Inventory / Sell more than available"
            ]
        );
        let ids: Vec<&str> = requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(requests[1].method, HttpMethod::GET);

        assert_eq!(
            collection.folders(),
            vec![
                vec!["Auth".to_string()],
                vec!["Inventory".to_string()],
                vec!["Inventory".to_string(), "Products".to_string()],
                vec!["Empty".to_string()],
            ]
        );
    }

    #[test]
    fn test_auth_inheritance() {
        let requests = parse_collection(COLLECTION, "test").unwrap().requests();
        assert_eq!(requests[0].auth, AuthSpec::None);
        assert_eq!(
            requests[1].auth,
            AuthSpec::Bearer {
                token: "{{access_token}}".to_string()
            }
        );
    }

    #[test]
    fn test_headers_body_and_directives() {
        let requests = parse_collection(COLLECTION, "test").unwrap().requests();

        let login = &requests[0];
        assert_eq!(login.content_type(), Some("application/json"));
        assert_eq!(login.captures.len(), 1);
        assert_eq!(
            login.captures[0].path,
            PathType::JsonPath("$.access".to_string())
        );
        assert_eq!(login.expectation.status, Some(StatusExpectation::Exact(200)));
        assert!(login.expectation.shape.is_some());

        let list = &requests[1];
        assert_eq!(list.headers.len(), 1);
        assert!(list.expectation.is_implicit());

        let sell = &requests[2];
        assert_eq!(
            sell.body.as_deref(),
            Some("product_id={{product_id}}&quantity=500")
        );
        assert_eq!(
            sell.content_type(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(sell.expectation.status, Some(StatusExpectation::Exact(400)));
    }

    #[test]
    fn test_variables() {
        let vars = parse_collection(COLLECTION, "test").unwrap().variables();
        assert_eq!(vars.get("base_url").unwrap(), "http://localhost:8000");
        assert_eq!(vars.get("limit").unwrap(), "10");
        assert!(!vars.contains_key("old"));
    }

    #[test]
    fn test_rejects_invalid_roots() {
        assert!(matches!(
            parse_collection("[]", "x"),
            Err(CollectionError::InvalidFormat { .. })
        ));
        assert!(matches!(
            parse_collection("{", "x"),
            Err(CollectionError::Json { .. })
        ));
        let err = parse_collection(r#"{"info": {"name": " "}}"#, "bad.json").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid collection bad.json: missing 'info.name'"
        );
        let err = parse_collection(r#"{"name": "old", "requests": []}"#, "v1.json").unwrap_err();
        assert!(err.to_string().contains("v1"));
    }

    #[test]
    fn test_load_collection_missing_file() {
        let err = load_collection(Path::new("/no/such/collection.json")).unwrap_err();
        assert!(matches!(err, CollectionError::Io { .. }));
    }
}
