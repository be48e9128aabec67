//! Data-cube access for drill processes.
//!
//! This crate stands between the drill pipeline and wherever the raster
//! archive lives. It models products, measurements and datasets, finds the
//! datasets that match a [`SpatioTemporalQuery`], and materialises them into
//! an in-memory [`RasterCube`] on a single output grid:
//!
//! - **Discovery**: footprint/time filtering through a [`DataCube`] backend
//! - **Grouping**: one time slice per solar day (or acquisition time)
//! - **Budget**: [`LoadBudgetGuard`] refuses oversized loads before any read
//! - **Fusing**: overlapping datasets of a slice merged by a [`FuseRule`]
//!
//! # Example
//!
//! ```ignore
//! use datacube::{DataLoader, ObjectStoreDataCube, QueryGeometry, SpatioTemporalQuery};
//!
//! let cube = ObjectStoreDataCube::from_url("s3://datacube-index/prod")?;
//! let loader = DataLoader::new(Arc::new(cube));
//!
//! let query = SpatioTemporalQuery::new("wofs_albers", QueryGeometry::point(146.5, -35.5, CrsCode::Epsg4326))
//!     .with_measurements(["water"]);
//! let cube = loader.load(&query).await?;
//! ```

pub mod backend;
pub mod budget;
pub mod cube;
pub mod error;
pub mod fuse;
pub mod geometry;
pub mod group;
pub mod loader;
pub mod query;
pub mod resample;
pub mod types;

// Re-export commonly used types at crate root
pub use backend::{DataCube, InMemoryDataCube, ObjectStoreDataCube};
pub use budget::{BudgetConfig, BudgetError, LoadBudgetGuard, LoadEstimate};
pub use cube::{is_valid, Band, RasterCube, NODATA_EPSILON};
pub use error::{CubeError, CubeResult};
pub use fuse::FuseRule;
pub use geometry::QueryGeometry;
pub use group::{group_datasets, solar_day, DatasetGroup, GroupBy};
pub use loader::{output_geobox, DataLoader, DEFAULT_LOAD_CONCURRENCY};
pub use query::{ExtraQuery, SpatioTemporalQuery};
pub use resample::Resampling;
pub use types::{
    DType, Dataset, FlagBits, FlagCondition, FlagDefinition, FlagValue, FlagsDefinition, GridSpec,
    Measurement, Product,
};
