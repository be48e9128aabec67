//! Exception reports returned when a process fails.

use drill_common::DrillError;
use serde::{Deserialize, Serialize};

/// OGC-style exception report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionReport {
    /// OGC exception code, e.g. `InvalidParameterValue`.
    #[serde(rename = "exceptionCode")]
    pub code: String,

    /// Name of the offending input, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locator: Option<String>,

    /// Human-readable message.
    pub text: String,

    /// HTTP status the report is sent with.
    pub status: u16,
}

impl ExceptionReport {
    pub fn new(code: impl Into<String>, status: u16, text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            locator: None,
            text: text.into(),
            status,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Build the report for a process error. Service faults are reported
    /// without their internal detail.
    pub fn from_error(err: &DrillError) -> Self {
        let text = if err.is_user_error() {
            err.to_string()
        } else {
            format!("process failed: {}", err.kind().replace('_', " "))
        };
        let report = Self::new(err.exception_code(), err.http_status_code(), text);

        match err {
            DrillError::InvalidInput { input, .. } => report.with_locator(input.clone()),
            DrillError::InvalidGeometry(_) | DrillError::UnsupportedCrs(_) => {
                report.with_locator("geometry")
            }
            _ => report,
        }
    }
}

impl From<&DrillError> for ExceptionReport {
    fn from(err: &DrillError) -> Self {
        ExceptionReport::from_error(err)
    }
}
