//! Data models for HTTP requests and responses.
//!
//! Requests are flattened out of collections by the `collection` module;
//! responses are produced by the executor.

pub mod request;
pub mod response;

pub use request::{HttpMethod, HttpRequest};
pub use response::{HttpResponse, RequestTiming};
