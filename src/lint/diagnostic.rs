//! Diagnostic type reported by the linter.

use serde::Serialize;
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - the request will not work
    Error,
    /// Warning - the request may work but has issues
    Warning,
    /// Info - informational message
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found in one request of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic
    pub severity: Severity,
    /// Display path of the request, e.g. `Sales / Create transaction`
    pub request: String,
    /// The diagnostic message
    pub message: String,
    /// Stable check identifier such as `undefined-variable`
    pub code: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        request: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            request: request.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Creates a new error diagnostic
    pub fn error(request: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, request, code, message)
    }

    /// Creates a new warning diagnostic
    pub fn warning(request: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, request, code, message)
    }

    /// Creates a new info diagnostic
    pub fn info(request: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, request, code, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.code, self.request, self.message
        )
    }
}
