//! Collection Runner
//!
//! Replays Postman v2.x request collections against a running HTTP service,
//! checks every response, and reports what passed.
//!
//! # Architecture
//!
//! - **collection**: Parses collection JSON and flattens its folder tree
//! - **models**: Request and response data structures
//! - **environment**: Named variable sets loaded from environment files
//! - **variables**: `{{variable}}` substitution, system variables and `@capture`
//! - **auth**: Bearer, Basic and API key authentication with inheritance
//! - **expect**: `@expect` directives and shape checks against saved examples
//! - **executor**: Sends requests with one shared reqwest client
//! - **runner**: Sequential run loop and run reports
//! - **formatter**: Response rendering for verbose output
//! - **lint**: Static checks that need no network
//! - **export**: cURL command generation
//! - **doctor**: Runs a framework's own health-check commands
//! - **config**: Global runner settings
//!
//! # Request chaining
//!
//! A request description may carry directives, one per line:
//!
//! ```text
//! @capture access_token = $.access
//! @expect status 200
//! ```
//!
//! Captured values are visible to every later request as `{{access_token}}`.
//!
//! # Example
//!
//! ```no_run
//! use collection_runner::collection::load_collection;
//! use collection_runner::environment::Environments;
//! use collection_runner::executor::{CancellationToken, HttpExecutor};
//! use collection_runner::runner::{CollectionRunner, RunOptions};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = load_collection(Path::new("collections/auth.postman_collection.json"))?;
//! let runner = CollectionRunner::new(
//!     collection,
//!     Environments::new(),
//!     HttpExecutor::from_global_config()?,
//!     RunOptions::default(),
//! );
//! let report = runner.run(&CancellationToken::new()).await;
//! println!("{}", report.render_text(false));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod collection;
pub mod config;
pub mod doctor;
pub mod environment;
pub mod executor;
pub mod expect;
pub mod export;
pub mod formatter;
pub mod lint;
pub mod models;
pub mod runner;
pub mod variables;
