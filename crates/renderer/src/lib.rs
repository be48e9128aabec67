//! Chart rendering for drill results.
//!
//! - Interactive chart: Vega-Lite spec in a standalone HTML page
//! - Static chart: SVG, optionally rasterised to PNG

pub mod chart;
pub mod error;
pub mod png;
pub mod raster;
pub mod svg;

use std::fmt;
use std::str::FromStr;

pub use chart::{
    render_html, vega_lite_spec, ChartData, ChartKind, ChartSpec, ChartValue, SeriesStyle,
    DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
pub use error::{RenderError, RenderResult};
pub use raster::svg_to_png;
pub use svg::render_svg;

/// Encoding of the static chart artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaticFormat {
    #[default]
    Png,
    Svg,
}

impl StaticFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            StaticFormat::Png => "chart.png",
            StaticFormat::Svg => "chart.svg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            StaticFormat::Png => "image/png",
            StaticFormat::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for StaticFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticFormat::Png => f.write_str("png"),
            StaticFormat::Svg => f.write_str("svg"),
        }
    }
}

impl FromStr for StaticFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(StaticFormat::Png),
            "svg" => Ok(StaticFormat::Svg),
            other => Err(RenderError::InvalidChart(format!(
                "unknown static chart format '{}'",
                other
            ))),
        }
    }
}

/// Render the static chart in the requested format.
pub fn render_static(spec: &ChartSpec, data: &ChartData, format: StaticFormat) -> RenderResult<Vec<u8>> {
    let svg = render_svg(spec, data)?;
    match format {
        StaticFormat::Svg => Ok(svg.into_bytes()),
        StaticFormat::Png => svg_to_png(&svg),
    }
}
