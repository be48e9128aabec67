//! Coordinate reference system transformations.
//!
//! Implements the handful of map projections the drill services need from
//! scratch, without PROJ.

pub mod albers;
pub mod mercator;
pub mod transform;

pub use albers::AlbersEqualArea;
pub use mercator::WebMercator;
pub use transform::Reprojector;
