//! Data-cube backends.
//!
//! A backend answers three questions: what a product looks like, which of
//! its datasets match a query, and what a dataset's band holds on its native
//! grid. Grouping, budgeting, resampling and fusing are done by the
//! [`DataLoader`](crate::DataLoader) on top of any backend.

mod codec;
mod indexed;
mod memory;

pub use codec::{decode_raster, encode_raster};
pub use indexed::ObjectStoreDataCube;
pub use memory::InMemoryDataCube;

use async_trait::async_trait;
use ndarray::Array2;

use crate::error::CubeResult;
use crate::query::SpatioTemporalQuery;
use crate::types::{Dataset, Measurement, Product};

/// Source of products, datasets and band rasters.
#[async_trait]
pub trait DataCube: Send + Sync {
    /// Product definition by name.
    async fn product(&self, name: &str) -> CubeResult<Product>;

    /// Datasets of the query's product whose footprint intersects the query
    /// geometry and whose time lies in the query range, in time order.
    async fn find_datasets(&self, query: &SpatioTemporalQuery) -> CubeResult<Vec<Dataset>>;

    /// Read one band of a dataset on the dataset's own grid.
    async fn read_band(&self, dataset: &Dataset, measurement: &Measurement)
        -> CubeResult<Array2<f32>>;
}

/// Spatial and temporal match of a dataset against a query.
pub fn dataset_matches(dataset: &Dataset, query: &SpatioTemporalQuery) -> CubeResult<bool> {
    if dataset.product != query.product {
        return Ok(false);
    }
    if let Some(range) = &query.time {
        if !range.contains(&dataset.time) {
            return Ok(false);
        }
    }
    let bbox = query.geometry.bbox_in(dataset.grid.crs)?;
    Ok(dataset.extent().intersects(&bbox))
}
