//! Error taxonomy for drill processes.

use thiserror::Error;

/// Result type alias using DrillError.
pub type DrillResult<T> = Result<T, DrillError>;

/// Process-level error surfaced to WPS clients.
///
/// The first group are user-facing conditions the caller can fix by changing
/// the request. The second group are service faults.
#[derive(Debug, Error)]
pub enum DrillError {
    // === Request errors ===
    /// The estimated load volume is over one of the byte budgets.
    #[error("{0}")]
    BudgetExceeded(String),

    /// Nothing matched the query, or nothing survived masking.
    #[error("{0}")]
    NoDataFound(String),

    /// Zero or multiple features, unsupported geometry type or malformed GeoJSON.
    #[error("{0}")]
    InvalidGeometry(String),

    /// A process input other than the geometry is missing or malformed.
    #[error("Invalid input '{input}': {message}")]
    InvalidInput { input: String, message: String },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    // === Service errors ===
    /// Unexpected fault from the data-cube backend.
    #[error("Data load failed: {0}")]
    UpstreamLoadFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrillError {
    pub fn invalid_input(input: impl Into<String>, message: impl Into<String>) -> Self {
        DrillError::InvalidInput {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        DrillError::NoDataFound(message.into())
    }

    /// True for conditions the user caused and can correct.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DrillError::BudgetExceeded(_)
                | DrillError::NoDataFound(_)
                | DrillError::InvalidGeometry(_)
                | DrillError::InvalidInput { .. }
                | DrillError::UnsupportedCrs(_)
                | DrillError::ProcessNotFound(_)
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DrillError::BudgetExceeded(_) => "budget_exceeded",
            DrillError::NoDataFound(_) => "no_data",
            DrillError::InvalidGeometry(_) => "invalid_geometry",
            DrillError::InvalidInput { .. } => "invalid_input",
            DrillError::UnsupportedCrs(_) => "unsupported_crs",
            DrillError::ProcessNotFound(_) => "process_not_found",
            DrillError::UpstreamLoadFailure(_) => "upstream_load_failure",
            DrillError::Storage(_) => "storage",
            DrillError::Render(_) => "render",
            DrillError::Internal(_) => "internal",
        }
    }

    /// OGC exception code for this error.
    pub fn exception_code(&self) -> &'static str {
        match self {
            DrillError::InvalidGeometry(_)
            | DrillError::InvalidInput { .. }
            | DrillError::UnsupportedCrs(_) => "InvalidParameterValue",
            DrillError::ProcessNotFound(_) => "NoSuchProcess",
            DrillError::BudgetExceeded(_) | DrillError::NoDataFound(_) => "ProcessError",
            _ => "NoApplicableCode",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            DrillError::BudgetExceeded(_)
            | DrillError::InvalidGeometry(_)
            | DrillError::InvalidInput { .. }
            | DrillError::UnsupportedCrs(_) => 400,

            DrillError::NoDataFound(_) | DrillError::ProcessNotFound(_) => 404,

            DrillError::UpstreamLoadFailure(_) | DrillError::Storage(_) => 502,

            DrillError::Render(_) | DrillError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for DrillError {
    fn from(err: serde_json::Error) -> Self {
        DrillError::Internal(format!("JSON error: {}", err))
    }
}

impl From<crate::crs::CrsParseError> for DrillError {
    fn from(err: crate::crs::CrsParseError) -> Self {
        match err {
            crate::crs::CrsParseError::UnsupportedCrs(name) => DrillError::UnsupportedCrs(name),
        }
    }
}
