//! Error types for the drill pipeline stages.

use datacube::CubeError;
use drill_common::DrillError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Cube access or shape error from a pipeline stage.
    #[error(transparent)]
    Cube(#[from] CubeError),

    /// Invalid catalogue entry, rule list or strategy parameter.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed statistics table.
    #[error("table error: {0}")]
    Table(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalogue parse error: {0}")]
    Catalog(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for DrillError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Cube(e) => e.into(),
            other => DrillError::Internal(other.to_string()),
        }
    }
}
