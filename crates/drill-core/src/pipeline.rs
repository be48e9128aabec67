//! The drill request pipeline.
//!
//! Every execute request runs the same stages:
//!
//! 1. parse the feature and time range
//! 2. load each catalogue product and join them on time
//! 3. rasterise a polygon onto the loaded grid and mask the cube with it
//! 4. reduce the cube with the process's strategy
//! 5. render and upload the charts, then assemble the outputs
//!
//! Nothing is uploaded unless the statistics and both charts succeed.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use datacube::{DataLoader, QueryGeometry, RasterCube, SpatioTemporalQuery};
use drill_common::{DrillError, DrillResult, TimeRange};
use futures::future::try_join_all;
use renderer::{render_html, render_static, StaticFormat};
use storage::{ArtifactStore, StoragePath};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use wps_protocol::{
    media_types, ExecuteRequest, ExecuteResponse, GeometryKind, ProcessOutput, TimeseriesEnvelope,
};

use crate::catalog::ProcessDefinition;
use crate::drills::DrillContext;
use crate::mask::{apply_mask, rasterize_mask};

const CHART_PAGE: &str = "chart.html";

/// Outputs of the CPU-bound stages, ready for upload.
struct Rendered {
    name: &'static str,
    enabled: bool,
    csv: String,
    page: String,
    image: Vec<u8>,
}

pub struct DrillPipeline {
    loader: DataLoader,
    store: Arc<dyn ArtifactStore>,
    static_format: StaticFormat,
}

impl DrillPipeline {
    pub fn new(loader: DataLoader, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            loader,
            store,
            static_format: StaticFormat::default(),
        }
    }

    pub fn with_static_format(mut self, format: StaticFormat) -> Self {
        self.static_format = format;
        self
    }

    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    /// Run `process` for one request, recording request, failure and
    /// duration metrics.
    #[instrument(skip(self, process, request), fields(process = %process.identifier))]
    pub async fn execute(
        &self,
        process: &ProcessDefinition,
        request: &ExecuteRequest,
    ) -> DrillResult<ExecuteResponse> {
        let started = Instant::now();
        let name = process.identifier.clone();
        metrics::counter!("drill_requests_total", "process" => name.clone()).increment(1);

        let result = self.run(process, request).await;

        metrics::histogram!("drill_duration_seconds", "process" => name.clone())
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::counter!("drill_failures_total", "process" => name, "kind" => e.kind())
                .increment(1);
            if e.is_user_error() {
                info!(error = %e, "Drill rejected");
            } else {
                warn!(error = %e, "Drill failed");
            }
        }
        result
    }

    async fn run(&self, process: &ProcessDefinition, request: &ExecuteRequest) -> DrillResult<ExecuteResponse> {
        let feature = request.feature()?.expect_kind(process.geometry_type)?;
        let time = request.time_range()?;
        let geometry = QueryGeometry::new(feature.geometry, feature.crs)?;

        let cube = self.load(process, &geometry, time).await?;

        let strategy = process.drill.strategy();
        let request = request.clone();
        let style = process.style.clone();
        let (geometry_type, apply) = (process.geometry_type, process.mask);
        let static_format = self.static_format;

        let rendered = blocking(move || {
            let (cube, total_area) = mask(geometry_type, apply, &geometry, cube)?;
            let ctx = DrillContext {
                request: &request,
                geometry: &geometry,
                total_area,
                style: &style,
            };

            let started = Instant::now();
            let chart = strategy.chart(&ctx)?;
            let table = strategy.process(cube, &ctx)?;
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                rows = table.len(),
                "time elapsed in process"
            );

            let data = table.to_chart_data();
            Ok(Rendered {
                name: strategy.name(),
                enabled: strategy.is_enabled(),
                csv: table.to_csv()?,
                page: render_html(&chart, &data)?,
                image: render_static(&chart, &data, static_format)?,
            })
        })
        .await?;

        let process_id = Uuid::new_v4().to_string();
        let page_url = self
            .store
            .upload(
                &StoragePath::artifact(&process_id, CHART_PAGE),
                Bytes::from(rendered.page),
                media_types::HTML,
            )
            .await?;
        let image_url = self
            .store
            .upload(
                &StoragePath::artifact(&process_id, self.static_format.file_name()),
                Bytes::from(rendered.image),
                self.static_format.content_type(),
            )
            .await?;

        let envelope = TimeseriesEnvelope::csv(rendered.name, rendered.csv)
            .enabled(rendered.enabled)
            .with_table_style(process.style.table.clone());
        let outputs = vec![
            ProcessOutput::timeseries(envelope),
            ProcessOutput::url(page_url),
            ProcessOutput::image(image_url, self.static_format.content_type()),
        ];
        Ok(ExecuteResponse::succeeded(&process.identifier, process_id, outputs))
    }

    /// Load every product of `process` concurrently and join them on time.
    #[instrument(skip(self, process, geometry), fields(products = process.products.len()))]
    async fn load(
        &self,
        process: &ProcessDefinition,
        geometry: &QueryGeometry,
        time: Option<TimeRange>,
    ) -> DrillResult<RasterCube> {
        let queries: Vec<SpatioTemporalQuery> = process
            .products
            .iter()
            .map(|product| {
                let mut query = SpatioTemporalQuery::new(&product.name, geometry.clone())
                    .with_extra(product.extra_query.clone());
                if let Some(measurements) = &product.measurements {
                    query = query.with_measurements(measurements.iter().cloned());
                }
                if let Some(time) = time {
                    query = query.with_time(time);
                }
                query
            })
            .collect();

        let cubes = try_join_all(queries.iter().map(|q| self.loader.load(q))).await?;
        let mut cubes = cubes.into_iter();
        let first = cubes
            .next()
            .ok_or_else(|| DrillError::Internal(format!("process '{}' loads no products", process.identifier)))?;
        let joined = cubes.try_fold(first, |joined, cube| joined.join_on_time(cube))?;
        Ok(joined)
    }
}

/// Run CPU-bound work on the blocking pool so request futures keep
/// the runtime workers free.
pub(crate) async fn blocking<F, T>(f: F) -> DrillResult<T>
where
    F: FnOnce() -> DrillResult<T> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| DrillError::Internal(format!("drill task failed: {}", e)))?
}

/// Restrict a polygon drill to its polygon. Returns the cube and the
/// number of grid pixels inside the geometry.
fn mask(
    geometry_type: GeometryKind,
    apply: bool,
    geometry: &QueryGeometry,
    cube: RasterCube,
) -> DrillResult<(RasterCube, usize)> {
    if geometry_type == GeometryKind::Point {
        return Ok((cube, 1));
    }

    let mask = rasterize_mask(geometry, cube.geobox(), false, true);
    let total_area = mask.inside_count();
    if total_area == 0 {
        return Err(DrillError::no_data(
            "the polygon does not cover any pixel of the loaded data",
        ));
    }
    let cube = if apply { apply_mask(cube, &mask)? } else { cube };
    Ok((cube, total_area))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_runs_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let worker = blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, runtime_thread);
    }

    #[tokio::test]
    async fn test_blocking_propagates_errors() {
        let err = blocking(|| -> DrillResult<()> { Err(DrillError::no_data("empty")) })
            .await
            .unwrap_err();
        assert!(matches!(err, DrillError::NoDataFound(_)));
    }

    #[tokio::test]
    async fn test_blocking_reports_panics_as_internal() {
        let err = blocking(|| -> DrillResult<()> { panic!("boom") }).await.unwrap_err();
        assert!(matches!(err, DrillError::Internal(_)));
    }
}
