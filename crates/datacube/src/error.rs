//! Error types for data-cube access.

use drill_common::DrillError;
use thiserror::Error;

use crate::budget::BudgetError;

/// Result type alias using CubeError.
pub type CubeResult<T> = Result<T, CubeError>;

/// Errors that can occur while discovering or loading data.
#[derive(Error, Debug)]
pub enum CubeError {
    /// Product is not in the index.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// Requested measurement is neither a band name nor an alias.
    #[error("measurement '{measurement}' not found in product '{product}'")]
    MeasurementNotFound { product: String, measurement: String },

    /// The query matched no datasets.
    #[error("{0}")]
    NoData(String),

    /// The load would exceed a byte budget.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// The query cannot be turned into a load (no grid, bad resolution...).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Geometry type that cannot be used for a query or mask.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Arrays that should line up do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Band not present in a cube.
    #[error("band not found: {0}")]
    BandNotFound(String),

    /// Failed to read a dataset band.
    #[error("failed to read {dataset}/{band}: {message}")]
    ReadFailed {
        dataset: String,
        band: String,
        message: String,
    },

    /// Index documents that cannot be decoded.
    #[error("index error: {0}")]
    Index(String),

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CubeError {
    pub fn read_failed(
        dataset: impl ToString,
        band: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ReadFailed {
            dataset: dataset.to_string(),
            band: band.into(),
            message: message.into(),
        }
    }
}

impl From<object_store::Error> for CubeError {
    fn from(err: object_store::Error) -> Self {
        CubeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CubeError {
    fn from(err: serde_json::Error) -> Self {
        CubeError::Index(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CubeError {
    fn from(err: ndarray::ShapeError) -> Self {
        CubeError::ShapeMismatch(err.to_string())
    }
}

impl From<CubeError> for DrillError {
    fn from(err: CubeError) -> Self {
        match err {
            CubeError::Budget(e) => DrillError::BudgetExceeded(e.to_string()),
            CubeError::NoData(msg) => DrillError::NoDataFound(msg),
            CubeError::InvalidGeometry(msg) => DrillError::InvalidGeometry(msg),
            CubeError::InvalidQuery(msg) => DrillError::invalid_input("query", msg),
            other @ CubeError::MeasurementNotFound { .. } => DrillError::Internal(other.to_string()),
            other => DrillError::UpstreamLoadFailure(other.to_string()),
        }
    }
}
