//! Response expectations.
//!
//! Each request carries an [`Expectation`] built from `@expect` directives in
//! its description and from the first saved example response. Requests that
//! deliberately trigger an error in the service (selling more stock than is
//! available, for instance) declare the error status they expect and pass
//! when it comes back.
//!
//! ```text
//! @expect status 201
//! @expect status 4xx
//! @expect status 200,204
//! @expect shape none
//! ```

pub mod shape;

pub use shape::{check_shape, type_name, ShapeMismatch};

use crate::models::response::HttpResponse;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

static EXPECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:#\s*)?@expect\s+([a-zA-Z]+)\s+(.+?)\s*$").expect("Invalid regex pattern")
});

/// Accepted response status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusExpectation {
    /// A single status code, e.g. `201`
    Exact(u16),
    /// A status class, e.g. `4` for `4xx`
    Class(u8),
    /// Any of the listed codes
    OneOf(Vec<u16>),
}

impl StatusExpectation {
    /// Parses `201`, `4xx` or `200,204`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let lower = text.to_ascii_lowercase();
        if let Some(class) = lower.strip_suffix("xx") {
            return match class.parse::<u8>() {
                Ok(c @ 1..=5) if class.len() == 1 => Some(StatusExpectation::Class(c)),
                _ => None,
            };
        }
        if text.contains(',') {
            let codes = text
                .split(',')
                .map(|part| parse_status_code(part.trim()))
                .collect::<Option<Vec<u16>>>()?;
            return Some(StatusExpectation::OneOf(codes));
        }
        parse_status_code(text).map(StatusExpectation::Exact)
    }

    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusExpectation::Exact(code) => *code == status,
            StatusExpectation::Class(class) => status / 100 == u16::from(*class),
            StatusExpectation::OneOf(codes) => codes.contains(&status),
        }
    }
}

impl fmt::Display for StatusExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusExpectation::Exact(code) => write!(f, "{}", code),
            StatusExpectation::Class(class) => write!(f, "{}xx", class),
            StatusExpectation::OneOf(codes) => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                write!(f, "one of {}", codes.join(", "))
            }
        }
    }
}

fn parse_status_code(text: &str) -> Option<u16> {
    text.parse::<u16>().ok().filter(|c| (100..=599).contains(c))
}

/// What a response must look like for its request to pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expectation {
    /// Accepted status; `None` accepts anything below 400
    pub status: Option<StatusExpectation>,
    /// Example JSON the response body must structurally match
    pub shape: Option<Value>,
    /// Set by `@expect shape none`
    pub shape_disabled: bool,
}

/// Reason a response did not meet its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Status { expected: String, actual: u16 },
    NotJson,
    Shape(ShapeMismatch),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status { expected, actual } => {
                write!(f, "status: expected {}, got {}", expected, actual)
            }
            Failure::NotJson => write!(f, "body: expected JSON, got non-JSON content"),
            Failure::Shape(mismatch) => write!(f, "{}", mismatch),
        }
    }
}

impl Expectation {
    /// Builds an expectation from description directives and a saved example.
    ///
    /// Directives win over the example. The example body is used as the shape
    /// only when it parses as JSON and its status code is one the request
    /// accepts.
    pub fn from_sources(
        description: &str,
        example_code: Option<u16>,
        example_body: Option<&str>,
    ) -> Self {
        let mut expectation = Expectation::default();

        for line in description.lines() {
            let Some(caps) = EXPECT_REGEX.captures(line) else {
                continue;
            };
            let argument = &caps[2];
            match caps[1].to_ascii_lowercase().as_str() {
                "status" => match StatusExpectation::parse(argument) {
                    Some(status) => expectation.status = Some(status),
                    None => warn!("ignoring invalid status expectation '{}'", argument),
                },
                "shape" if argument.eq_ignore_ascii_case("none") => {
                    expectation.shape_disabled = true;
                }
                other => warn!("ignoring unknown directive '@expect {} {}'", other, argument),
            }
        }

        if expectation.status.is_none() {
            expectation.status = example_code.map(StatusExpectation::Exact);
        }

        let example_status_accepted = match (&expectation.status, example_code) {
            (Some(status), Some(code)) => status.matches(code),
            _ => true,
        };
        if !expectation.shape_disabled && example_status_accepted {
            expectation.shape = example_body
                .map(str::trim)
                .filter(|body| !body.is_empty())
                .and_then(|body| serde_json::from_str::<Value>(body).ok());
        }

        expectation
    }

    /// True when neither a directive nor an example defined anything.
    pub fn is_implicit(&self) -> bool {
        self.status.is_none() && self.shape.is_none() && !self.shape_disabled
    }

    /// Human readable summary of the accepted status.
    pub fn status_description(&self) -> String {
        match &self.status {
            Some(status) => status.to_string(),
            None => "< 400".to_string(),
        }
    }

    /// Checks a response, returning every failure found.
    ///
    /// The body shape is only checked once the status is accepted.
    pub fn evaluate(&self, response: &HttpResponse) -> Vec<Failure> {
        let status_ok = match &self.status {
            Some(status) => status.matches(response.status_code),
            None => response.status_code < 400,
        };
        if !status_ok {
            return vec![Failure::Status {
                expected: self.status_description(),
                actual: response.status_code,
            }];
        }

        let Some(expected) = self.shape.as_ref().filter(|_| !self.shape_disabled) else {
            return Vec::new();
        };
        match response.body_as_json() {
            Some(actual) => check_shape(expected, &actual)
                .into_iter()
                .map(Failure::Shape)
                .collect(),
            None => vec![Failure::NotJson],
        }
    }
}
