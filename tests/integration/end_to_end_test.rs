//! Full runs of a bundled collection against a mock backend.

use super::{bundled, collections_dir};
use collection_runner::collection::load_collection;
use collection_runner::environment::load_environment_file;
use collection_runner::executor::{CancellationToken, ExecutionConfig, HttpExecutor};
use collection_runner::runner::{CollectionRunner, RequestOutcome, RunOptions};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(timeout: Duration) -> HttpExecutor {
    HttpExecutor::new(ExecutionConfig::new(timeout)).unwrap()
}

fn customer() -> serde_json::Value {
    json!({
        "id": 8,
        "full_name": "Aziz Karimov",
        "phone": "+998901234567",
        "debt": "0.00",
        "created_at": "2024-05-01T12:00:00Z"
    })
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/users/login/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"refresh": "r-1", "access": "a-1"})),
        )
        .mount(server)
        .await;
}

async fn mount_customers_backend(server: &MockServer) {
    mount_login(server).await;

    Mock::given(method("POST"))
        .and(path("/customers/"))
        .and(header("authorization", "Bearer a-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(customer()))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([customer()])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/8/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(customer()))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/search/"))
        .and(query_param("q", "Aziz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([customer()])))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/customers/8/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(customer()))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/customers/8/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/customers/8/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(server)
        .await;
}

fn overrides(server: &MockServer) -> HashMap<String, String> {
    HashMap::from([("base_url".to_string(), server.uri())])
}

#[tokio::test]
async fn test_customers_collection_passes_against_backend() {
    let server = MockServer::start().await;
    mount_customers_backend(&server).await;

    let environments =
        load_environment_file(&collections_dir().join("collection-runner.env.json")).unwrap();
    let runner = CollectionRunner::new(
        load_collection(&bundled("customers")).unwrap(),
        environments,
        executor(Duration::from_secs(5)),
        RunOptions {
            overrides: overrides(&server),
            ..RunOptions::default()
        },
    );

    let report = runner.run(&CancellationToken::new()).await;
    assert!(report.is_success(), "{}", report.render_text(true));
    assert_eq!(report.passed(), 8);
    assert_eq!(report.environment.as_deref(), Some("local"));

    let statuses: Vec<Option<u16>> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            Some(200),
            Some(201),
            Some(200),
            Some(200),
            Some(200),
            Some(200),
            Some(204),
            Some(404)
        ]
    );
    assert_eq!(report.results[3].url, format!("{}/customers/8/", server.uri()));

    let dir = TempDir::new().unwrap();
    let report_path = dir.path().join("report.json");
    std::fs::write(&report_path, report.to_json_pretty().unwrap()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["collection"], "SomPOS Customers");
    assert_eq!(json["results"].as_array().unwrap().len(), 8);
    assert_eq!(json["results"][1]["captured"][0], json!(["customer_id", "8"]));
}

#[tokio::test]
async fn test_shape_drift_is_reported() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/customers/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "8",
            "full_name": "Aziz Karimov",
            "phone": "+998901234567",
            "created_at": "2024-05-01T12:00:00Z"
        })))
        .mount(&server)
        .await;

    let runner = CollectionRunner::new(
        load_collection(&bundled("customers")).unwrap(),
        Default::default(),
        executor(Duration::from_secs(5)),
        RunOptions {
            name_filter: Some("create customer".to_string()),
            overrides: overrides(&server),
            ..RunOptions::default()
        },
    );
    let report = runner.run(&CancellationToken::new()).await;

    assert_eq!(report.results.len(), 1);
    let RequestOutcome::Failed(mut reasons) = report.results[0].outcome.clone() else {
        panic!("expected failure, got {:?}", report.results[0].outcome);
    };
    reasons.sort();
    assert_eq!(
        reasons,
        vec![
            "$.debt: expected string, got missing",
            "$.id: expected number, got string",
        ]
    );
}

#[tokio::test]
async fn test_timeout_and_bail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let runner = CollectionRunner::new(
        load_collection(&bundled("analytics")).unwrap(),
        Default::default(),
        executor(Duration::from_millis(200)),
        RunOptions {
            bail: true,
            overrides: overrides(&server),
            ..RunOptions::default()
        },
    );
    let report = runner.run(&CancellationToken::new()).await;

    assert_eq!(
        report.results[0].outcome,
        RequestOutcome::Error("Request timed out".to_string())
    );
    assert_eq!(report.skipped(), report.results.len() - 1);
    assert!(!report.is_success());
}
