//! Request and response contracts for the data-cube WPS drill processes.
//!
//! The WPS layer hands each drill a GeoJSON feature, an optional time range
//! and free-form parameters, and gets back a list of named outputs:
//!
//! - `timeseries`: a JSON envelope wrapping the statistics CSV
//! - `url`: link to the interactive chart page
//! - `image`: link to the static chart image
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use wps_protocol::{ExecuteRequest, GeometryKind};
//!
//! let request = ExecuteRequest::new().with_input(
//!     "geometry",
//!     json!({
//!         "type": "FeatureCollection",
//!         "features": [{
//!             "type": "Feature",
//!             "geometry": { "type": "Point", "coordinates": [146.65, -35.9] }
//!         }]
//!     }),
//! );
//! let feature = request.feature().unwrap();
//! assert_eq!(feature.kind(), GeometryKind::Point);
//! ```

pub mod errors;
pub mod inputs;
pub mod outputs;
pub mod process;

pub use errors::ExceptionReport;
pub use inputs::{
    parse_feature, parse_time_range, timestamp_text, ExecuteRequest, Feature, GeoJsonError,
    GeometryKind,
};
pub use outputs::{ExecuteResponse, ExecutionStatus, ProcessOutput, TimeseriesEnvelope};
pub use process::{
    InputDescription, LiteralType, OutputDescription, ProcessDescription, ProcessList,
    ProcessSummary,
};

/// Media types used in drill inputs and outputs.
pub mod media_types {
    /// Timeseries envelope consumed by TerriaJS.
    pub const TERRIA_CATALOG_MEMBER: &str = "application/vnd.terriajs.catalog-member+json";
    /// GeoJSON geometry and date-time inputs.
    pub const GEO_JSON: &str = "application/vnd.geo+json";
    pub const JSON: &str = "application/json";
    pub const HTML: &str = "text/html";
    pub const PNG: &str = "image/png";
    pub const SVG: &str = "image/svg+xml";
}
