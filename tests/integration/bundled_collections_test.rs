//! The collections shipped in `collections/` parse, lint cleanly and export.

use super::{bundled, collections_dir};
use collection_runner::collection::load_collection;
use collection_runner::environment::load_environment_file;
use collection_runner::expect::StatusExpectation;
use collection_runner::export::{export_collection, CurlOptions};
use collection_runner::lint::lint_collection;
use collection_runner::models::HttpMethod;
use std::collections::HashMap;

const BUNDLED: &[&str] = &["auth", "inventory", "sales", "analytics", "customers"];

#[test]
fn test_bundled_collections_lint_clean() {
    let environments =
        load_environment_file(&collections_dir().join("collection-runner.env.json")).unwrap();
    assert_eq!(environments.active.as_deref(), Some("local"));

    for name in BUNDLED {
        let collection = load_collection(&bundled(name)).unwrap();
        assert!(!collection.requests().is_empty(), "{} has no requests", name);

        let diagnostics = lint_collection(&collection, &environments, &HashMap::new());
        assert!(
            diagnostics.is_empty(),
            "{}: {:#?}",
            name,
            diagnostics
        );
    }
}

#[test]
fn test_every_request_has_an_expectation() {
    for name in BUNDLED {
        for request in load_collection(&bundled(name)).unwrap().requests() {
            assert!(
                !request.expectation.is_implicit(),
                "{}: {} has no expectation",
                name,
                request.display_path()
            );
        }
    }
}

#[test]
fn test_domain_collections_log_in_first() {
    for name in ["inventory", "sales", "analytics", "customers"] {
        let requests = load_collection(&bundled(name)).unwrap().requests();
        let login = &requests[0];
        assert_eq!(login.display_path(), "Auth / Login");
        assert!(login.auth.is_none());
        assert_eq!(login.captures[0].variable_name, "access_token");
        // Everything after the login inherits collection-level bearer auth
        assert_eq!(requests[1].auth.scheme_name(), "bearer");
    }
}

#[test]
fn test_expected_error_requests() {
    let sales = load_collection(&bundled("sales")).unwrap().requests();
    let oversell = sales
        .iter()
        .find(|r| r.name == "Sell more than available")
        .unwrap();
    assert_eq!(oversell.method, HttpMethod::POST);
    assert_eq!(
        oversell.expectation.status,
        Some(StatusExpectation::Exact(400))
    );
    assert!(oversell.expectation.shape.is_some());

    let analytics = load_collection(&bundled("analytics")).unwrap().requests();
    let anonymous = analytics
        .iter()
        .find(|r| r.name == "Anonymous access")
        .unwrap();
    assert!(anonymous.auth.is_none());
    assert_eq!(
        anonymous.expectation.status,
        Some(StatusExpectation::Exact(401))
    );
}

#[test]
fn test_inventory_export() {
    let requests = load_collection(&bundled("inventory")).unwrap().requests();
    let script = export_collection(&requests, &CurlOptions::default());

    assert!(script.starts_with("# Auth / Login\ncurl"));
    assert!(script.contains("# Categories / Create category\n"));
    assert!(script.contains("# Batches / Create batch\n"));
    assert!(script.contains("'{{base_url}}/inventory/products/?limit=20&offset=0'"));
    assert_eq!(
        script.matches("\ncurl").count() + usize::from(script.starts_with("curl")),
        requests.len()
    );
}
