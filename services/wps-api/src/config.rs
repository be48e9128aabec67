//! Service configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use datacube::{BudgetConfig, DEFAULT_LOAD_CONCURRENCY};
use renderer::StaticFormat;
use storage::ArtifactStoreConfig;

const DEFAULT_INDEX_URL: &str = "memory://";
const DEFAULT_MAX_TOTAL_GB: f64 = 20.0;
const DEFAULT_MAX_SLICE_GB: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Process catalogue YAML.
    pub catalog_path: PathBuf,

    /// Object-store root of the data-cube index. `memory://` gives an
    /// empty in-memory cube.
    pub index_url: String,

    pub budget: BudgetConfig,
    pub load_concurrency: usize,
    pub static_format: StaticFormat,
    pub artifacts: ArtifactStoreConfig,
}

impl ServiceConfig {
    /// Read `DATACUBE_INDEX_URL`, `DRILL_MAX_TOTAL_GB`, `DRILL_MAX_SLICE_GB`,
    /// `DRILL_LOAD_CONCURRENCY`, `STATIC_CHART_FORMAT` and the `S3_*`
    /// artifact settings.
    pub fn from_env(catalog_path: impl Into<PathBuf>) -> Result<Self> {
        let max_total_gb = parse_var("DRILL_MAX_TOTAL_GB", DEFAULT_MAX_TOTAL_GB)?;
        let max_slice_gb = parse_var("DRILL_MAX_SLICE_GB", DEFAULT_MAX_SLICE_GB)?;
        let static_format = match var("STATIC_CHART_FORMAT") {
            Some(value) => StaticFormat::from_str(&value).context("STATIC_CHART_FORMAT")?,
            None => StaticFormat::default(),
        };

        Ok(Self {
            catalog_path: catalog_path.into(),
            index_url: var("DATACUBE_INDEX_URL").unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            budget: BudgetConfig::from_gb(max_total_gb, max_slice_gb),
            load_concurrency: parse_var("DRILL_LOAD_CONCURRENCY", DEFAULT_LOAD_CONCURRENCY)?,
            static_format,
            artifacts: ArtifactStoreConfig::from_env(),
        })
    }

    pub fn is_in_memory_index(&self) -> bool {
        self.index_url.starts_with("memory://")
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", name, value)),
        None => Ok(default),
    }
}
