//! Sequential collection runner.
//!
//! Requests run strictly in document order. Each one is resolved against the
//! variables known at that point, sent, checked against its expectation, and
//! then feeds its `@capture` values to every request after it.

pub mod report;

pub use report::{RequestOutcome, RequestResult, RunReport};

use crate::auth::{apply_auth, AuthError};
use crate::collection::Collection;
use crate::environment::Environments;
use crate::executor::{CancellationToken, HttpExecutor};
use crate::models::request::HttpRequest;
use crate::variables::{extract_response_variable, substitute_variables, VarError, VariableContext};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Why a request could not be turned into something sendable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Variable(#[from] VarError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Which requests to run and how.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Folder path such as `Inventory` or `Inventory/Batches`; matches that
    /// folder and everything below it
    pub folder: Option<String>,
    /// Case-insensitive substring of `Folder / Name`
    pub name_filter: Option<String>,
    /// Stop after the first request that does not pass
    pub bail: bool,
    /// Pause between consecutive requests
    pub delay: Duration,
    /// `--var key=value` values
    pub overrides: HashMap<String, String>,
}

/// Resolves variables in the URL, headers, body and auth of `request`, then
/// applies its auth.
///
/// # Errors
///
/// Fails on undefined or circular variables and on empty credentials.
///
/// # Examples
///
/// ```
/// use collection_runner::auth::AuthSpec;
/// use collection_runner::models::{HttpMethod, HttpRequest};
/// use collection_runner::runner::prepare_request;
/// use collection_runner::variables::VariableContext;
///
/// let mut request = HttpRequest::new("0", HttpMethod::GET, "{{base_url}}/users/profile/");
/// request.auth = AuthSpec::Bearer { token: "{{access_token}}".to_string() };
///
/// let mut context = VariableContext::new();
/// context.collection.insert("base_url".to_string(), "http://localhost:8000".to_string());
/// context.capture("access_token", "eyJ0eXAi");
///
/// let prepared = prepare_request(&request, &context).unwrap();
/// assert_eq!(prepared.url, "http://localhost:8000/users/profile/");
/// assert_eq!(prepared.header("Authorization"), Some("Bearer eyJ0eXAi"));
/// ```
pub fn prepare_request(
    request: &HttpRequest,
    context: &VariableContext,
) -> Result<HttpRequest, PrepareError> {
    let substitute = |text: &str| substitute_variables(text, context);

    let mut prepared = request.clone();
    prepared.url = substitute(&request.url)?;
    prepared.headers = request
        .headers
        .iter()
        .map(|(name, value)| Ok((substitute(name)?, substitute(value)?)))
        .collect::<Result<_, VarError>>()?;
    prepared.body = request.body.as_deref().map(substitute).transpose()?;
    prepared.auth = request.auth.try_map_values(substitute)?;

    let auth = prepared.auth.clone();
    apply_auth(&mut prepared, &auth)?;
    Ok(prepared)
}

/// Runs the requests of one collection against one environment.
pub struct CollectionRunner {
    collection: Collection,
    environments: Environments,
    executor: HttpExecutor,
    options: RunOptions,
}

impl CollectionRunner {
    pub fn new(
        collection: Collection,
        environments: Environments,
        executor: HttpExecutor,
        options: RunOptions,
    ) -> Self {
        Self {
            collection,
            environments,
            executor,
            options,
        }
    }

    /// Requests left after the folder and name filters, in run order.
    pub fn selected_requests(&self) -> Vec<HttpRequest> {
        let folder: Option<Vec<String>> = self.options.folder.as_ref().map(|f| {
            f.split('/')
                .map(|part| part.trim().to_lowercase())
                .filter(|part| !part.is_empty())
                .collect()
        });
        let needle = self.options.name_filter.as_ref().map(|n| n.to_lowercase());

        self.collection
            .requests()
            .into_iter()
            .filter(|request| match &folder {
                Some(prefix) => {
                    request.folder.len() >= prefix.len()
                        && request
                            .folder
                            .iter()
                            .zip(prefix)
                            .all(|(have, want)| have.to_lowercase() == *want)
                }
                None => true,
            })
            .filter(|request| match &needle {
                Some(needle) => request.display_path().to_lowercase().contains(needle),
                None => true,
            })
            .collect()
    }

    /// Executes the selected requests one after another.
    ///
    /// The token is checked before every request; once it is set, or once
    /// `bail` trips, every remaining request is reported as skipped.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut context = VariableContext::from_sources(
            &self.environments,
            self.collection.variables(),
            self.options.overrides.clone(),
        );

        let requests = self.selected_requests();
        info!(
            "running {} request(s) from '{}'",
            requests.len(),
            self.collection.name()
        );

        let mut results = Vec::with_capacity(requests.len());
        let mut stopped = false;
        for (index, request) in requests.iter().enumerate() {
            if !stopped && cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining requests");
                stopped = true;
            }
            if stopped {
                results.push(RequestResult::skipped(request));
                continue;
            }

            if index > 0 && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }

            let result = self.run_request(request, &mut context).await;
            if self.options.bail && !result.outcome.is_passed() {
                info!("'{}' did not pass, stopping (--bail)", result.name);
                stopped = true;
            }
            results.push(result);
        }

        RunReport {
            collection: self.collection.name().to_string(),
            environment: self.environments.active.clone(),
            started_at,
            duration: start.elapsed(),
            results,
        }
    }

    async fn run_request(
        &self,
        request: &HttpRequest,
        context: &mut VariableContext,
    ) -> RequestResult {
        let prepared = match prepare_request(request, context) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("{}: {}", request.display_path(), e);
                return RequestResult::error(request, e.to_string());
            }
        };

        let response = match self.executor.execute(&prepared).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{}: {}", request.display_path(), e);
                return RequestResult::error(&prepared, e.to_string());
            }
        };

        let mut reasons: Vec<String> = request
            .expectation
            .evaluate(&response)
            .iter()
            .map(ToString::to_string)
            .collect();

        let mut captured = Vec::new();
        if reasons.is_empty() {
            for capture in &request.captures {
                match extract_response_variable(&response, &capture.path) {
                    Ok(value) => {
                        debug!("captured {} = {}", capture.variable_name, value);
                        context.capture(&capture.variable_name, value.clone());
                        captured.push((capture.variable_name.clone(), value));
                    }
                    Err(e) => reasons.push(format!("capture {}: {}", capture.variable_name, e)),
                }
            }
        }

        let outcome = if reasons.is_empty() {
            RequestOutcome::Passed
        } else {
            RequestOutcome::Failed(reasons)
        };
        let mut result = RequestResult::new(&prepared, outcome);
        result.status = Some(response.status_code);
        result.duration = response.duration;
        result.captured = captured;
        result.response = Some(response);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSpec;
    use crate::collection::parse_collection;
    use crate::environment::Environment;
    use crate::executor::ExecutionConfig;
    use crate::models::request::HttpMethod;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor() -> HttpExecutor {
        HttpExecutor::new(ExecutionConfig::new(Duration::from_secs(5))).unwrap()
    }

    fn collection(items: serde_json::Value) -> Collection {
        let raw = json!({
            "info": {"name": "SomPOS"},
            "variable": [{"key": "password", "value": "secret"}],
            "item": items
        });
        parse_collection(&raw.to_string(), "sompos.json").unwrap()
    }

    fn environments(base_url: &str) -> Environments {
        let mut environments = Environments::new();
        let mut local = Environment::new("local");
        local.set("base_url", base_url);
        environments.add_environment(local);
        environments.set_active("local");
        environments
    }

    #[test]
    fn test_prepare_request_substitutes_everything() {
        let mut request = HttpRequest::new("0", HttpMethod::POST, "{{base}}/stores/switch-store/");
        request.add_header("X-{{h}}", "{{v}}");
        request.set_body(r#"{"store_id": {{store}}}"#);
        request.auth = AuthSpec::Basic {
            username: "{{user}}".to_string(),
            password: "pw".to_string(),
        };

        let mut context = VariableContext::new();
        for (k, v) in [("base", "http://h"), ("h", "Store"), ("v", "1"), ("store", "2"), ("user", "admin")] {
            context.overrides.insert(k.to_string(), v.to_string());
        }

        let prepared = prepare_request(&request, &context).unwrap();
        assert_eq!(prepared.url, "http://h/stores/switch-store/");
        assert_eq!(prepared.header("X-Store"), Some("1"));
        assert_eq!(prepared.body.as_deref(), Some(r#"{"store_id": 2}"#));
        assert_eq!(prepared.header("Authorization"), Some("Basic YWRtaW46cHc="));
        // The original keeps its placeholders
        assert_eq!(request.url, "{{base}}/stores/switch-store/");
    }

    #[test]
    fn test_prepare_request_errors() {
        let request = HttpRequest::new("0", HttpMethod::GET, "{{nowhere}}/");
        assert_eq!(
            prepare_request(&request, &VariableContext::new()).unwrap_err(),
            PrepareError::Variable(VarError::Undefined("nowhere".to_string()))
        );

        let mut request = HttpRequest::new("0", HttpMethod::GET, "http://h/");
        request.auth = AuthSpec::Bearer {
            token: "{{token}}".to_string(),
        };
        let mut context = VariableContext::new();
        context.capture("token", "");
        assert!(matches!(
            prepare_request(&request, &context),
            Err(PrepareError::Auth(AuthError::MissingCredentials(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_capture_feeds_next_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login/"))
            .and(body_json(json!({"username": "admin", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access": "tok-1", "refresh": "r"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/profile/"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "username": "admin"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let collection = collection(json!([
            {"name": "Auth", "item": [
                {
                    "name": "Login",
                    "request": {
                        "method": "POST",
                        "url": "{{base_url}}/users/login/",
                        "header": [{"key": "Content-Type", "value": "application/json"}],
                        "body": {"mode": "raw", "raw": "{\"username\": \"admin\", \"password\": \"{{password}}\"}"},
                        "description": "@capture access_token = $.access"
                    }
                },
                {
                    "name": "Profile",
                    "request": {
                        "method": "GET",
                        "url": "{{base_url}}/users/profile/",
                        "auth": {"type": "bearer", "bearer": [{"key": "token", "value": "{{access_token}}"}]}
                    },
                    "response": [{"name": "ok", "code": 200, "body": "{\"id\": 7, \"username\": \"x\"}"}]
                }
            ]}
        ]));

        let runner = CollectionRunner::new(
            collection,
            environments(&server.uri()),
            executor(),
            RunOptions::default(),
        );
        let report = runner.run(&CancellationToken::new()).await;

        assert!(report.is_success(), "{}", report.render_text(true));
        assert_eq!(report.environment.as_deref(), Some("local"));
        assert_eq!(report.results[0].name, "Auth / Login");
        assert_eq!(
            report.results[0].captured,
            vec![("access_token".to_string(), "tok-1".to_string())]
        );
        assert_eq!(report.results[1].status, Some(200));
    }

    #[tokio::test]
    async fn test_failures_errors_and_bail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sales/transactions/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "not enough stock"})))
            .mount(&server)
            .await;

        let items = json!([
            {"name": "Missing var", "request": {"method": "GET", "url": "{{base_url}}/customers/{{customer_id}}/"}},
            {
                "name": "Oversell",
                "request": {"method": "POST", "url": "{{base_url}}/sales/transactions/", "description": "@expect status 201"}
            },
            {"name": "Never sent", "request": {"method": "GET", "url": "{{base_url}}/customers/"}}
        ]);

        let runner = CollectionRunner::new(
            collection(items.clone()),
            environments(&server.uri()),
            executor(),
            RunOptions::default(),
        );
        let report = runner.run(&CancellationToken::new()).await;
        assert_eq!(
            report.results[0].outcome,
            RequestOutcome::Error("undefined variable: customer_id".to_string())
        );
        assert_eq!(
            report.results[1].outcome,
            RequestOutcome::Failed(vec!["status: expected 201, got 400".to_string()])
        );
        // No mock for GET /customers/ so wiremock answers 404
        assert_eq!(report.results[2].status, Some(404));
        assert!(!report.is_success());

        let runner = CollectionRunner::new(
            collection(items),
            environments(&server.uri()),
            executor(),
            RunOptions {
                bail: true,
                ..RunOptions::default()
            },
        );
        let report = runner.run(&CancellationToken::new()).await;
        assert_eq!(report.errored(), 1);
        assert_eq!(report.skipped(), 2);
    }

    #[tokio::test]
    async fn test_expected_error_passes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sales/transactions/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "not enough stock"})))
            .mount(&server)
            .await;

        let runner = CollectionRunner::new(
            collection(json!([{
                "name": "Sell more than available",
                "request": {"method": "POST", "url": "{{base_url}}/sales/transactions/", "description": "@expect status 4xx"},
                "response": [{"name": "err", "code": 400, "body": "{\"error\": \"\"}"}]
            }])),
            environments(&server.uri()),
            executor(),
            RunOptions::default(),
        );
        let report = runner.run(&CancellationToken::new()).await;
        assert_eq!(report.passed(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_everything() {
        let runner = CollectionRunner::new(
            collection(json!([{"name": "A", "request": "http://127.0.0.1:9/"}])),
            Environments::new(),
            executor(),
            RunOptions::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = runner.run(&cancel).await;
        assert_eq!(report.skipped(), 1);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_filters_and_api_key_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/analytics/sales/"))
            .and(query_param("api_key", "k1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let collection = collection(json!([
            {"name": "Analytics", "auth": {"type": "apikey", "apikey": [
                {"key": "key", "value": "api_key"}, {"key": "value", "value": "k1"}, {"key": "in", "value": "query"}
            ]}, "item": [
                {"name": "Sales", "request": "{{base_url}}/analytics/sales/"},
                {"name": "Products", "request": "{{base_url}}/analytics/products/"}
            ]},
            {"name": "Customers", "item": [
                {"name": "Sales report", "request": "{{base_url}}/customers/"}
            ]}
        ]));

        let runner = CollectionRunner::new(
            collection,
            environments(&server.uri()),
            executor(),
            RunOptions {
                folder: Some("analytics".to_string()),
                name_filter: Some("SALES".to_string()),
                ..RunOptions::default()
            },
        );
        let selected: Vec<String> = runner
            .selected_requests()
            .iter()
            .map(HttpRequest::display_path)
            .collect();
        assert_eq!(selected, vec!["Analytics / Sales"]);

        let report = runner.run(&CancellationToken::new()).await;
        assert_eq!(report.results.len(), 1);
        assert!(report.is_success(), "{}", report.render_text(true));
    }
}
