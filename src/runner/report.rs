//! Results of a collection run and their text/JSON renderings.

use crate::executor::format_timing_compact;
use crate::formatter::{format_duration, format_response};
use crate::models::request::{HttpMethod, HttpRequest};
use crate::models::response::HttpResponse;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// How a single request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "details", rename_all = "lowercase")]
pub enum RequestOutcome {
    /// Response met every expectation and all captures succeeded
    Passed,
    /// Response arrived but broke an expectation or capture
    Failed(Vec<String>),
    /// Request could not be prepared or sent
    Error(String),
    /// Not attempted (bail, cancellation)
    Skipped,
}

impl RequestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, RequestOutcome::Passed)
    }

    fn mark(&self) -> &'static str {
        match self {
            RequestOutcome::Passed => "PASS",
            RequestOutcome::Failed(_) => "FAIL",
            RequestOutcome::Error(_) => "ERR ",
            RequestOutcome::Skipped => "SKIP",
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResult {
    pub id: String,
    /// `Folder / Name`
    pub name: String,
    pub method: HttpMethod,
    /// URL as sent, or as written when the request never went out
    pub url: String,
    pub status: Option<u16>,
    #[serde(rename = "durationMs", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(flatten)]
    pub outcome: RequestOutcome,
    /// Variables captured from this response, in directive order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<(String, String)>,
    #[serde(skip)]
    pub response: Option<HttpResponse>,
}

impl RequestResult {
    pub(crate) fn new(request: &HttpRequest, outcome: RequestOutcome) -> Self {
        Self {
            id: request.id.clone(),
            name: request.display_path(),
            method: request.method,
            url: request.url.clone(),
            status: None,
            duration: Duration::ZERO,
            outcome,
            captured: Vec::new(),
            response: None,
        }
    }

    pub(crate) fn skipped(request: &HttpRequest) -> Self {
        Self::new(request, RequestOutcome::Skipped)
    }

    pub(crate) fn error(request: &HttpRequest, message: impl Into<String>) -> Self {
        Self::new(request, RequestOutcome::Error(message.into()))
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub collection: String,
    pub environment: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "durationMs", serialize_with = "as_millis")]
    pub duration: Duration,
    pub results: Vec<RequestResult>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, RequestOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RequestOutcome::Failed(_)))
    }

    pub fn errored(&self) -> usize {
        self.count(|o| matches!(o, RequestOutcome::Error(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RequestOutcome::Skipped))
    }

    /// No failures and no errors. Skipped requests do not count against
    /// the run unless something else stopped it.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.errored() == 0
    }

    fn count(&self, predicate: impl Fn(&RequestOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One line per request, failure reasons indented below it, and a
    /// summary line. `verbose` adds the response of every failed request.
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = match &self.environment {
            Some(env) => format!("{} (environment: {})\n", self.collection, env),
            None => format!("{}\n", self.collection),
        };

        for result in &self.results {
            let status = result
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string());
            out.push_str(&format!(
                "{} {:<7} {}  {}  {}\n",
                result.outcome.mark(),
                result.method.as_str(),
                result.name,
                status,
                format_duration(result.duration)
            ));

            match &result.outcome {
                RequestOutcome::Failed(reasons) => {
                    for reason in reasons {
                        out.push_str(&format!("       - {}\n", reason));
                    }
                    if verbose {
                        if let Some(response) = &result.response {
                            out.push_str(&format!(
                                "       | timing: {}\n",
                                format_timing_compact(&response.timing)
                            ));
                            for line in format_response(response).to_display_string().lines() {
                                out.push_str(&format!("       | {}\n", line));
                            }
                        }
                    }
                }
                RequestOutcome::Error(message) => {
                    out.push_str(&format!("       - {}\n", message));
                }
                _ => {}
            }
        }

        out.push_str(&format!(
            "{} requests: {} passed, {} failed, {} errors, {} skipped in {}\n",
            self.results.len(),
            self.passed(),
            self.failed(),
            self.errored(),
            self.skipped(),
            format_duration(self.duration)
        ));
        out
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
