//! Water observations at a single pixel.

use datacube::RasterCube;
use drill_common::{DrillError, DrillResult};
use geo::Geometry;
use renderer::{ChartKind, ChartSpec};

use super::{Drill, DrillContext};
use crate::error::CoreError;
use crate::flags::{FlagDecoder, NOT_OBSERVABLE};
use crate::table::{Cell, StatisticsTable};

const WATER_BAND: &str = "water";
const COLUMN: &str = "Observation";

pub struct WofsPixelDrill;

impl Drill for WofsPixelDrill {
    fn name(&self) -> &'static str {
        "WOfS"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    /// One categorical row per timestep at the pixel holding the point.
    fn process(&self, cube: RasterCube, ctx: &DrillContext<'_>) -> DrillResult<StatisticsTable> {
        let band = cube.band(WATER_BAND).map_err(CoreError::from)?;
        let flags = band.flags.clone().ok_or_else(|| {
            DrillError::Internal(format!("band '{}' has no flag definition", WATER_BAND))
        })?;
        let decoder = FlagDecoder::wofs(flags)?;

        let geobox = cube.geobox();
        let (col, row) = match ctx.geometry.to_crs(geobox.crs).geometry() {
            Geometry::Point(p) => geobox.pixel_at(p.x(), p.y()).unwrap_or((0, 0)),
            _ => (0, 0),
        };

        let categorized = decoder.decode(band);
        let mut table = StatisticsTable::new([COLUMN]);
        for (t, time) in cube.times().iter().enumerate() {
            let category = categorized.category_at(t, row, col);
            table.push_row(*time, vec![Cell::from(category)])?;
        }
        Ok(table)
    }

    fn chart(&self, ctx: &DrillContext<'_>) -> DrillResult<ChartSpec> {
        let (lon, lat) = ctx.geometry.label_lon_lat().map_err(CoreError::from)?;
        let spec = ChartSpec::new(
            format!("Water Observations for {:.6},{:.6}", lat, lon),
            ChartKind::Tick {
                field: COLUMN.to_string(),
                domain: vec!["wet".into(), "dry".into(), NOT_OBSERVABLE.into()],
                colors: vec!["blue".into(), "red".into(), "grey".into()],
            },
        );
        Ok(spec.with_size(ctx.style.chart.width, ctx.style.chart.height))
    }
}
