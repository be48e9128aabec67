//! Rendering errors.

use drill_common::DrillError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Chart data does not fit the chart definition.
    #[error("invalid chart: {0}")]
    InvalidChart(String),

    #[error("SVG parse failed: {0}")]
    Svg(#[from] usvg::Error),

    #[error("cannot allocate a {width}x{height} image")]
    ImageSize { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),

    #[error("chart spec serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RenderError> for DrillError {
    fn from(err: RenderError) -> Self {
        DrillError::Render(err.to_string())
    }
}
