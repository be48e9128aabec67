//! Budgeted loading of query results into a [`RasterCube`].
//!
//! ```text
//! find_datasets ──► none? ──► NoData
//!      │
//!      ▼
//! output geobox ─► group by solar day ─► LoadBudgetGuard::check
//!                                               │
//!                                               ▼
//!                       per group (buffered): read ─► resample ─► fuse
//!                                               │
//!                                               ▼
//!                                    stack into (time, y, x) bands
//! ```
//!
//! Nothing is read before the budget check passes.

use std::sync::Arc;
use std::time::Instant;

use drill_common::GeoBox;
use futures::stream::{self, StreamExt, TryStreamExt};
use ndarray::{Array2, Array3, Axis};
use tracing::{debug, info, instrument, warn};

use crate::backend::DataCube;
use crate::budget::{BudgetConfig, LoadBudgetGuard};
use crate::cube::{Band, RasterCube};
use crate::error::{CubeError, CubeResult};
use crate::group::{group_datasets, DatasetGroup};
use crate::query::{ExtraQuery, SpatioTemporalQuery};
use crate::resample::reproject;
use crate::types::{Measurement, Product};

/// Default number of time groups read concurrently.
pub const DEFAULT_LOAD_CONCURRENCY: usize = 4;

/// Output grid for a query: the geometry's bounding box in the output CRS,
/// snapped outward to the output resolution.
pub fn output_geobox(product: &Product, query: &SpatioTemporalQuery) -> CubeResult<GeoBox> {
    let extra = &query.extra;

    let (crs, resolution, align) = match (extra.output_crs, extra.resolution, &product.grid_spec) {
        (Some(crs), Some(resolution), _) => (crs, resolution, extra.align),
        (None, None, Some(spec)) => (spec.crs, spec.resolution, None),
        (Some(crs), None, Some(spec)) if crs == spec.crs => (crs, spec.resolution, None),
        _ => {
            return Err(CubeError::InvalidQuery(format!(
                "product {} needs output_crs and resolution to be loaded",
                product.name
            )))
        }
    };

    let [res_y, res_x] = resolution;
    if res_x == 0.0 || res_y == 0.0 || !res_x.is_finite() || !res_y.is_finite() {
        return Err(CubeError::InvalidQuery(format!(
            "invalid resolution {:?}",
            resolution
        )));
    }

    let offset = match (align, &product.grid_spec) {
        (Some([ay, ax]), _) => (ax, ay),
        (None, Some(spec)) if spec.crs == crs => spec.alignment(),
        _ => (0.0, 0.0),
    };

    let bbox = query.geometry.bbox_in(crs)?;
    Ok(GeoBox::covering(&bbox, crs, res_x, res_y, offset))
}

/// Loads queries from a [`DataCube`] under a byte budget.
#[derive(Clone)]
pub struct DataLoader {
    cube: Arc<dyn DataCube>,
    budget: LoadBudgetGuard,
    concurrency: usize,
}

impl DataLoader {
    pub fn new(cube: Arc<dyn DataCube>) -> Self {
        Self {
            cube,
            budget: LoadBudgetGuard::default(),
            concurrency: DEFAULT_LOAD_CONCURRENCY,
        }
    }

    pub fn with_budget(mut self, config: BudgetConfig) -> Self {
        self.budget = LoadBudgetGuard::new(config);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cube(&self) -> &Arc<dyn DataCube> {
        &self.cube
    }

    /// Load every requested band of the query into a cube with one timestep
    /// per dataset group.
    #[instrument(skip(self, query), fields(product = %query.product))]
    pub async fn load(&self, query: &SpatioTemporalQuery) -> CubeResult<RasterCube> {
        let started = Instant::now();

        let datasets = self.cube.find_datasets(query).await?;
        if datasets.is_empty() {
            return Err(CubeError::NoData(format!(
                "no data found for {}",
                query.describe()
            )));
        }

        let product = self.cube.product(&query.product).await?;
        let measurements = product.resolve_measurements(query.measurements.as_deref())?;
        let geobox = output_geobox(&product, query)?;
        let groups = group_datasets(datasets, query.extra.group_by);

        let itemsizes: Vec<usize> = measurements.iter().map(|(_, m)| m.dtype.itemsize()).collect();
        let estimate = self
            .budget
            .check(geobox.pixel_count(), groups.len() as u64, &itemsizes)?;
        metrics::histogram!("drill_bytes_estimated").record(estimate.total_bytes as f64);
        info!(
            bytes = estimate.total_bytes as u64,
            time_slices = groups.len(),
            width = geobox.width,
            height = geobox.height,
            "byte count for query"
        );

        let group_loads: Vec<_> = groups
            .iter()
            .map(|group| self.load_group(group, &measurements, &geobox, &query.extra))
            .collect();
        let slices: Vec<Vec<Array2<f32>>> = stream::iter(group_loads)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let times = groups.iter().map(|g| g.time).collect();
        let mut cube = RasterCube::new(times, geobox);
        for (index, (name, measurement)) in measurements.iter().enumerate() {
            let views: Vec<_> = slices.iter().map(|bands| bands[index].view()).collect();
            let data: Array3<f32> = ndarray::stack(Axis(0), &views)?;
            cube.insert_band(name.clone(), Band::from_measurement(measurement, data))?;
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "time elapsed in load"
        );
        Ok(cube)
    }

    /// Read and fuse every band of one group onto the output grid.
    async fn load_group(
        &self,
        group: &DatasetGroup,
        measurements: &[(String, Measurement)],
        geobox: &GeoBox,
        extra: &ExtraQuery,
    ) -> CubeResult<Vec<Array2<f32>>> {
        let mut bands = Vec::with_capacity(measurements.len());

        for (_, measurement) in measurements {
            let fill = measurement.nodata.map_or(f32::NAN, |nd| nd as f32);
            let mut fused: Option<Array2<f32>> = None;

            for dataset in &group.datasets {
                let native = match self.cube.read_band(dataset, measurement).await {
                    Ok(raster) => raster,
                    Err(e) if extra.skip_broken_datasets => {
                        warn!(dataset = %dataset.id, band = %measurement.name, error = %e, "Skipping broken dataset");
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let raster = reproject(native.view(), &dataset.grid, geobox, fill, extra.resampling);
                match fused.as_mut() {
                    None => fused = Some(raster),
                    Some(dest) => extra
                        .fuse
                        .fuse(dest.view_mut(), raster.view(), measurement.nodata),
                }
            }

            debug!(
                time = %group.time,
                band = %measurement.name,
                datasets = group.datasets.len(),
                "Fused group"
            );
            bands.push(fused.unwrap_or_else(|| Array2::from_elem(geobox.shape(), fill)));
        }

        Ok(bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::QueryGeometry;
    use crate::types::{DType, GridSpec};
    use drill_common::CrsCode;

    fn product(grid_spec: Option<GridSpec>) -> Product {
        Product {
            name: "p".into(),
            description: String::new(),
            measurements: vec![Measurement::new("b", DType::UInt8, None)],
            grid_spec,
        }
    }

    #[test]
    fn test_output_geobox_from_grid_spec() {
        let product = product(Some(GridSpec {
            crs: CrsCode::Epsg3577,
            resolution: [-25.0, 25.0],
            origin: None,
        }));
        let query = SpatioTemporalQuery::new(
            "p",
            QueryGeometry::polygon(
                vec![(10.0, 10.0), (90.0, 10.0), (90.0, 60.0), (10.0, 60.0)],
                CrsCode::Epsg3577,
            ),
        );
        let geobox = output_geobox(&product, &query).unwrap();
        assert_eq!(geobox.crs, CrsCode::Epsg3577);
        assert_eq!(geobox.shape(), (3, 4));
        assert_eq!(geobox.transform.origin_y, 75.0);
    }

    #[test]
    fn test_output_geobox_overrides() {
        let query = SpatioTemporalQuery::new("p", QueryGeometry::point(146.0, -35.0, CrsCode::Epsg4326))
            .with_extra(ExtraQuery {
                output_crs: Some(CrsCode::Epsg4326),
                resolution: Some([-0.00025, 0.00025]),
                ..Default::default()
            });
        let geobox = output_geobox(&product(None), &query).unwrap();
        assert_eq!(geobox.crs, CrsCode::Epsg4326);
        assert_eq!(geobox.shape(), (1, 1));
    }

    #[test]
    fn test_output_geobox_requires_grid() {
        let query = SpatioTemporalQuery::new("p", QueryGeometry::point(0.0, 0.0, CrsCode::Epsg4326));
        assert!(matches!(
            output_geobox(&product(None), &query),
            Err(CubeError::InvalidQuery(_))
        ));
    }
}
