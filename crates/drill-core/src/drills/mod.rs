//! Per-drill strategies.
//!
//! Every drill shares the load/mask/upload pipeline and differs only in how
//! it reduces the loaded cube to a statistics table and how that table is
//! charted. [`DrillKind`] is the catalogue's tagged choice of strategy;
//! [`DrillKind::strategy`] turns it into a [`Drill`].

mod fc;
mod mangrove;
mod wit;
mod wofs;

use datacube::{QueryGeometry, RasterCube};
use drill_common::DrillResult;
use renderer::{ChartKind, ChartSpec, SeriesStyle};
use serde::{Deserialize, Serialize};
use wps_protocol::{ExecuteRequest, GeometryKind, InputDescription};

use crate::catalog::DrillStyle;
use crate::stats::{DEFAULT_VALID_FRACTION, DEFAULT_WET_THRESHOLD};
use crate::table::StatisticsTable;

pub use fc::FractionalCoverDrill;
pub use mangrove::MangroveDrill;
pub use wit::WitDrill;
pub use wofs::WofsPixelDrill;

fn default_wet_threshold() -> f64 {
    DEFAULT_WET_THRESHOLD
}

fn default_valid_fraction() -> f64 {
    DEFAULT_VALID_FRACTION
}

/// Strategy selector as written in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrillKind {
    WofsPixel,
    FractionalCover,
    Mangrove,
    Wit {
        #[serde(default = "default_wet_threshold")]
        wet_threshold: f64,
        #[serde(default = "default_valid_fraction")]
        valid_fraction: f64,
    },
}

impl DrillKind {
    pub fn geometry_kind(&self) -> GeometryKind {
        match self {
            DrillKind::WofsPixel => GeometryKind::Point,
            _ => GeometryKind::Polygon,
        }
    }

    /// Literal inputs accepted on top of geometry, start and end.
    pub fn parameters(&self) -> Vec<InputDescription> {
        self.strategy().parameters()
    }

    pub fn strategy(&self) -> Box<dyn Drill> {
        match self {
            DrillKind::WofsPixel => Box::new(WofsPixelDrill),
            DrillKind::FractionalCover => Box::new(FractionalCoverDrill),
            DrillKind::Mangrove => Box::new(MangroveDrill),
            DrillKind::Wit {
                wet_threshold,
                valid_fraction,
            } => Box::new(WitDrill {
                wet_threshold: *wet_threshold,
                valid_fraction: *valid_fraction,
            }),
        }
    }
}

/// What a strategy sees of the request besides the cube.
#[derive(Debug, Clone, Copy)]
pub struct DrillContext<'a> {
    pub request: &'a ExecuteRequest,
    pub geometry: &'a QueryGeometry,
    /// Pixels of the loaded grid inside the geometry.
    pub total_area: usize,
    pub style: &'a DrillStyle,
}

/// Reduction of a loaded cube to a statistics table, plus its chart.
pub trait Drill: Send + Sync {
    /// Name of the timeseries envelope.
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn parameters(&self) -> Vec<InputDescription> {
        Vec::new()
    }

    fn process(&self, cube: RasterCube, ctx: &DrillContext<'_>) -> DrillResult<StatisticsTable>;

    fn chart(&self, ctx: &DrillContext<'_>) -> DrillResult<ChartSpec>;
}

/// A stacked area chart column with its fallback colour.
pub(crate) struct Series<'a> {
    pub column: &'a str,
    pub label: &'a str,
    pub color: &'a str,
}

pub(crate) fn stacked_area(
    title: &str,
    series: &[Series<'_>],
    normalize: bool,
    style: &DrillStyle,
) -> ChartSpec {
    let series = series
        .iter()
        .map(|s| SeriesStyle::new(s.column, s.label, style.column_color(s.column, s.color)))
        .collect();
    ChartSpec::new(
        title,
        ChartKind::StackedArea {
            legend_title: "Cover Type".to_string(),
            value_title: "Area".to_string(),
            normalize,
            series,
        },
    )
    .with_size(style.chart.width, style.chart.height)
}
