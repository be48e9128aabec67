//! Fractional cover over a polygon, with WOfS-based observability.

use datacube::{Band, FlagValue, RasterCube};
use drill_common::{DrillError, DrillResult};
use ndarray::{Array3, Zip};
use renderer::ChartSpec;

use super::{stacked_area, Drill, DrillContext, Series};
use crate::error::CoreError;
use crate::stats::dominant;
use crate::table::{Cell, StatisticsTable};

const COVER_BANDS: [&str; 3] = ["BS", "PV", "NPV"];
const WATER_BAND: &str = "water";

const COLUMNS: [&str; 4] = [
    "Bare Soil",
    "Photosynthetic Vegetation",
    "Non-Photosynthetic Vegetation",
    "Unobservable",
];

pub struct FractionalCoverDrill;

impl FractionalCoverDrill {
    /// Pixels with a clear dry observation.
    fn observable(water: &Band) -> DrillResult<Array3<bool>> {
        let flags = water.flags.as_ref().ok_or_else(|| {
            DrillError::Internal(format!("band '{}' has no flag definition", WATER_BAND))
        })?;
        let condition = flags
            .condition([
                ("dry", FlagValue::from(true)),
                ("terrain_or_low_angle", false.into()),
                ("high_slope", false.into()),
                ("cloud_shadow", false.into()),
                ("cloud", false.into()),
                ("sea", false.into()),
            ])
            .map_err(CoreError::from)?;
        Ok(water.flag_mask(&condition))
    }
}

impl Drill for FractionalCoverDrill {
    fn name(&self) -> &'static str {
        "FC"
    }

    /// Percentage of the valid area per dominant cover type, plus the
    /// unobservable remainder.
    fn process(&self, cube: RasterCube, _ctx: &DrillContext<'_>) -> DrillResult<StatisticsTable> {
        let covers = COVER_BANDS
            .iter()
            .map(|name| cube.band(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(CoreError::from)?;
        let observable = Self::observable(cube.band(WATER_BAND).map_err(CoreError::from)?)?;
        let (bs, pv, npv) = (covers[0], covers[1], covers[2]);

        let mut table = StatisticsTable::new(COLUMNS);
        for (t, time) in cube.times().iter().enumerate() {
            let mut total_valid = 0usize;
            let mut dominant_counts = [0usize; 3];

            Zip::from(bs.slice(t))
                .and(pv.slice(t))
                .and(npv.slice(t))
                .and(observable.index_axis(ndarray::Axis(0), t))
                .for_each(|&b, &p, &n, &clear| {
                    if !bs.is_valid(b) {
                        return;
                    }
                    total_valid += 1;
                    if clear && pv.is_valid(p) && npv.is_valid(n) {
                        if let Some(i) = dominant(&[b, p, n]) {
                            dominant_counts[i] += 1;
                        }
                    }
                });

            if total_valid == 0 {
                continue;
            }
            let observed: usize = dominant_counts.iter().sum();
            let percent = |count: usize| Cell::Number(count as f64 * 100.0 / total_valid as f64);
            let mut values: Vec<Cell> = dominant_counts.iter().map(|&c| percent(c)).collect();
            values.push(percent(total_valid - observed));
            table.push_row(*time, values)?;
        }
        Ok(table)
    }

    fn chart(&self, ctx: &DrillContext<'_>) -> DrillResult<ChartSpec> {
        let series = [
            Series { column: COLUMNS[0], label: "BS", color: "#8B0000" },
            Series { column: COLUMNS[1], label: "PV", color: "green" },
            Series { column: COLUMNS[2], label: "NPV", color: "#dac586" },
            Series { column: COLUMNS[3], label: "Unobservable", color: "grey" },
        ];
        Ok(stacked_area(
            "Percentage of Area - Fractional Cover",
            &series,
            true,
            ctx.style,
        ))
    }
}
