//! Drill pipeline for data-cube WPS processes.
//!
//! A drill reduces a stack of rasters under a point or polygon to one row
//! of statistics per timestep. This crate holds the shared pieces:
//!
//! - **Masks**: [`rasterize_mask`] burns a geometry onto a grid and
//!   [`apply_mask`] blanks everything outside it
//! - **Flags**: [`FlagDecoder`] turns packed quality bits into categories
//! - **Aggregation**: [`TemporalAggregator`] collapses the time axis into
//!   day windows
//! - **Statistics**: [`AreaStatistics`] and the per-drill strategies in
//!   [`drills`] produce a [`StatisticsTable`]
//! - **Orchestration**: [`DrillPipeline`] runs a [`ProcessDefinition`] from
//!   the [`ProcessCatalog`] end to end
//!
//! # Example
//!
//! ```ignore
//! use drill_core::{DrillPipeline, ProcessCatalog};
//!
//! let catalog = ProcessCatalog::from_path("datacube-wps-config.yaml")?;
//! let pipeline = DrillPipeline::new(loader, store);
//! let response = pipeline.execute(catalog.get("WIT").unwrap(), &request).await?;
//! ```

pub mod aggregate;
pub mod catalog;
pub mod drills;
pub mod error;
pub mod flags;
pub mod mask;
pub mod pipeline;
pub mod stats;
pub mod table;

pub use aggregate::{windows, AggregationRules, TemporalAggregator};
pub use catalog::{ChartStyle, DrillStyle, ProcessCatalog, ProcessDefinition, ProductInput};
pub use drills::{Drill, DrillContext, DrillKind};
pub use error::{CoreError, CoreResult};
pub use flags::{wofs_rules, Categorized, Combine, FlagDecoder, FlagRule, NOT_OBSERVABLE};
pub use mask::{apply_mask, rasterize_mask, MaskSense, PixelMask};
pub use pipeline::DrillPipeline;
pub use stats::{class_counts, dominant, AreaCounts, AreaStatistics, CoverBand};
pub use table::{Cell, StatisticsRow, StatisticsTable};
