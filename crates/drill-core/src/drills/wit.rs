//! Wetlands insight tool: open water, wetness and cover over a polygon.

use datacube::{Band, DType, RasterCube};
use drill_common::DrillResult;
use ndarray::{Array3, Zip};
use renderer::ChartSpec;
use tracing::debug;
use wps_protocol::{InputDescription, LiteralType};

use super::{stacked_area, Drill, DrillContext, Series};
use crate::aggregate::TemporalAggregator;
use crate::error::CoreError;
use crate::stats::AreaStatistics;
use crate::table::StatisticsTable;

const WATER_BAND: &str = "water";
const INDEX_BAND: &str = "TCW";
const FMASK_BAND: &str = "fmask";
const CONTIGUITY_BAND: &str = "nbart_contiguity";
const QUALITY_BANDS: [&str; 4] = ["bs", "pv", "npv", INDEX_BAND];
const AGGREGATE_INPUT: &str = "aggregate";

/// WOfS bits: nodata 0, noncontiguous 1, cloud shadow 5, cloud 6, wet 7.
const WET_BIT: u64 = 1 << 7;
const WATER_BLOCKERS: u64 = (1 << 6) | (1 << 5) | (1 << 1) | 1;
const CLEAR_BLOCKERS: u64 = WET_BIT | WATER_BLOCKERS;

/// Fmask classes that are not usable land: nodata, cloud, cloud shadow.
const FMASK_UNUSABLE: [f32; 3] = [0.0, 2.0, 3.0];

pub struct WitDrill {
    pub wet_threshold: f64,
    pub valid_fraction: f64,
}

fn packed(value: f32) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

/// Open water: wet with no nodata, contiguity, cloud or shadow bits.
pub fn is_open_water(wofs: f32) -> bool {
    packed(wofs).is_some_and(|v| v & WET_BIT != 0 && v & WATER_BLOCKERS == 0)
}

/// Clear land observation usable for cover and wetness.
pub fn is_clear_land(wofs: f32, fmask: f32, contiguity: f32) -> bool {
    !fmask.is_nan()
        && !FMASK_UNUSABLE.contains(&fmask)
        && contiguity == 1.0
        && packed(wofs).is_some_and(|v| v & CLEAR_BLOCKERS == 0)
}

impl WitDrill {
    /// Blank the cover and index bands off clear land and replace the
    /// quality bands with a 0/1 open water band.
    fn prepare(cube: RasterCube) -> DrillResult<RasterCube> {
        let mut cube = cube;
        let water = cube.remove_band(WATER_BAND);
        let fmask = cube.remove_band(FMASK_BAND);
        let contiguity = cube.remove_band(CONTIGUITY_BAND);
        let (water, fmask, contiguity) = match (water, fmask, contiguity) {
            (Some(w), Some(f), Some(c)) => (w, f, c),
            _ => {
                return Err(CoreError::Config(format!(
                    "wetlands drill needs '{}', '{}' and '{}' bands",
                    WATER_BAND, FMASK_BAND, CONTIGUITY_BAND
                ))
                .into())
            }
        };

        let mut clear = Array3::from_elem(water.data.raw_dim(), false);
        Zip::from(&mut clear)
            .and(&water.data)
            .and(&fmask.data)
            .and(&contiguity.data)
            .par_for_each(|c, &w, &f, &n| *c = is_clear_land(w, f, n));

        for name in QUALITY_BANDS {
            let band = cube.band_mut(name).map_err(CoreError::from)?;
            let fill = band.fill_value();
            Zip::from(&mut band.data).and(&clear).par_for_each(|v, &keep| {
                if !keep {
                    *v = fill;
                }
            });
        }

        let presence = water.data.mapv(|w| if is_open_water(w) { 1.0 } else { 0.0 });
        cube.insert_band(WATER_BAND, Band::new(presence, DType::UInt8, None))
            .map_err(CoreError::from)?;
        Ok(cube)
    }
}

impl Drill for WitDrill {
    fn name(&self) -> &'static str {
        "WIT"
    }

    fn parameters(&self) -> Vec<InputDescription> {
        vec![InputDescription::literal(
            AGGREGATE_INPUT,
            "Aggregation window in days",
            LiteralType::Integer,
        )]
    }

    fn process(&self, cube: RasterCube, ctx: &DrillContext<'_>) -> DrillResult<StatisticsTable> {
        let mut cube = Self::prepare(cube)?;

        let days = ctx.request.integer(AGGREGATE_INPUT)?.unwrap_or(0);
        if days > 0 {
            let before = cube.len_time();
            cube = TemporalAggregator::new(days)
                .with_presence(WATER_BAND, INDEX_BAND)
                .aggregate(cube)
                .map_err(CoreError::from)?;
            debug!(days, before, after = cube.len_time(), "Aggregated wetlands cube");
        }

        let table = AreaStatistics::default()
            .with_thresholds(self.wet_threshold, self.valid_fraction)
            .summarize(&cube, ctx.total_area)?;
        Ok(table)
    }

    fn chart(&self, ctx: &DrillContext<'_>) -> DrillResult<ChartSpec> {
        let series = [
            Series { column: "Open Water", label: "Open Water", color: "#4f81bd" },
            Series { column: "Wet", label: "Wet", color: "#30b7e6" },
            Series { column: "Bare Soil", label: "Bare Soil", color: "#d99694" },
            Series { column: "Green Vegetation", label: "Green Vegetation", color: "#9bbb59" },
            Series { column: "Dry Vegetation", label: "Dry Vegetation", color: "#dac586" },
        ];
        Ok(stacked_area("Wetlands Insight Tool", &series, false, ctx.style))
    }
}
