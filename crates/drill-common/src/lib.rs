//! Common types shared by the data-cube drill crates and the WPS service.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geobox;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{CrsCode, CrsParseError, CRS84_URN};
pub use error::{DrillError, DrillResult};
pub use geobox::{Affine, GeoBox};
pub use time::{parse_datetime, TimeParseError, TimeRange};
