//! Shared application state.

use std::sync::Arc;

use anyhow::{Context, Result};
use datacube::{DataCube, DataLoader, ObjectStoreDataCube};
use drill_core::{DrillPipeline, ProcessCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{ArtifactStore, ObjectArtifactStore};
use tracing::{info, warn};

use crate::config::ServiceConfig;

/// State shared by every handler. The catalogue is loaded once at start-up
/// and never changes afterwards.
pub struct AppState {
    pub catalog: Arc<ProcessCatalog>,
    pub pipeline: DrillPipeline,
    /// Prometheus recorder handle, absent when no recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(catalog: ProcessCatalog, pipeline: DrillPipeline) -> Self {
        Self {
            catalog: Arc::new(catalog),
            pipeline,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the state from configuration: load the catalogue, open the
    /// data-cube index and the artifact bucket.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let catalog = ProcessCatalog::from_path(&config.catalog_path).with_context(|| {
            format!("failed to load process catalogue {}", config.catalog_path.display())
        })?;

        if config.is_in_memory_index() {
            warn!("DATACUBE_INDEX_URL is unset or memory://, every drill will find no data");
        }
        let cube: Arc<dyn DataCube> = Arc::new(
            ObjectStoreDataCube::from_url(&config.index_url)
                .with_context(|| format!("failed to open data-cube index {}", config.index_url))?,
        );
        let loader = DataLoader::new(cube)
            .with_budget(config.budget)
            .with_concurrency(config.load_concurrency);

        let store: Arc<dyn ArtifactStore> = Arc::new(
            ObjectArtifactStore::new(&config.artifacts).context("failed to open artifact store")?,
        );

        info!(
            processes = catalog.len(),
            index = %config.index_url,
            bucket = %config.artifacts.bucket,
            format = %config.static_format,
            "Application state initialised"
        );

        let pipeline = DrillPipeline::new(loader, store).with_static_format(config.static_format);
        Ok(Self::new(catalog, pipeline))
    }
}
