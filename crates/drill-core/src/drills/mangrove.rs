//! Mangrove canopy cover classes over a polygon.

use datacube::RasterCube;
use drill_common::DrillResult;
use renderer::ChartSpec;

use super::{stacked_area, Drill, DrillContext, Series};
use crate::error::CoreError;
use crate::stats::class_counts;
use crate::table::{Cell, StatisticsTable};

const CLASS_BAND: &str = "canopy_cover_class";
const CLASSES: [f32; 3] = [1.0, 2.0, 3.0];
const COLUMNS: [&str; 3] = ["Woodland", "Open Forest", "Closed Forest"];

pub struct MangroveDrill;

impl Drill for MangroveDrill {
    fn name(&self) -> &'static str {
        "Mangrove Cover"
    }

    /// Pixel count of each canopy class per timestep.
    fn process(&self, cube: RasterCube, _ctx: &DrillContext<'_>) -> DrillResult<StatisticsTable> {
        let band = cube.band(CLASS_BAND).map_err(CoreError::from)?;
        let mut table = StatisticsTable::new(COLUMNS);
        for (t, time) in cube.times().iter().enumerate() {
            let counts = class_counts(band, t, &CLASSES);
            table.push_row(*time, counts.into_iter().map(Cell::Number).collect())?;
        }
        Ok(table)
    }

    fn chart(&self, ctx: &DrillContext<'_>) -> DrillResult<ChartSpec> {
        let series = [
            Series { column: COLUMNS[0], label: COLUMNS[0], color: "#9FFF4C" },
            Series { column: COLUMNS[1], label: COLUMNS[1], color: "#5ECC00" },
            Series { column: COLUMNS[2], label: COLUMNS[2], color: "#3B7F00" },
        ];
        Ok(stacked_area(
            "Percentage of Area - Mangrove Canopy Cover",
            &series,
            true,
            ctx.style,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DrillStyle;
    use datacube::{Band, DType, QueryGeometry};
    use drill_common::CrsCode;
    use test_utils::{albers_grid, raster, stack, utc};
    use wps_protocol::ExecuteRequest;

    #[test]
    fn test_class_counts_per_timestep() {
        let first = raster(2, 3, |row, col| [[1.0, 1.0, 2.0], [3.0, 255.0, 0.0]][row][col]);
        let second = raster(2, 3, |_, _| 3.0);
        let band = Band::new(stack(&[first, second]), DType::UInt8, Some(255.0));
        let cube = RasterCube::new(vec![utc(2016, 1, 1), utc(2017, 1, 1)], albers_grid(0.0, 50.0, 3, 2))
            .with_band(CLASS_BAND, band)
            .unwrap();

        let request = ExecuteRequest::new();
        let style = DrillStyle::default();
        let geometry = QueryGeometry::point(10.0, 10.0, CrsCode::Epsg3577);
        let ctx = DrillContext {
            request: &request,
            geometry: &geometry,
            total_area: 6,
            style: &style,
        };

        let table = MangroveDrill.process(cube, &ctx).unwrap();
        let counts: Vec<Vec<f64>> = table
            .rows()
            .iter()
            .map(|r| r.values.iter().filter_map(Cell::as_number).collect())
            .collect();
        assert_eq!(counts, vec![vec![2.0, 1.0, 1.0], vec![0.0, 0.0, 6.0]]);

        let spec = MangroveDrill.chart(&ctx).unwrap();
        assert_eq!(spec.title, "Percentage of Area - Mangrove Canopy Cover");
        assert_eq!((spec.width, spec.height), (1000, 300));
    }
}
