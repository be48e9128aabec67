//! Spatio-temporal load queries.
//!
//! A query names a product, a geometry of interest and optionally a time
//! range and band subset. Product-specific load options (fuser, output grid,
//! resampling) travel in [`ExtraQuery`], which is usually read from the
//! process catalogue.
//!
//! # Examples
//!
//! ```rust
//! use datacube::{QueryGeometry, SpatioTemporalQuery};
//! use drill_common::{CrsCode, TimeRange};
//!
//! let query = SpatioTemporalQuery::new(
//!     "wofs_albers",
//!     QueryGeometry::point(146.5, -35.5, CrsCode::Epsg4326),
//! )
//! .with_time(TimeRange::parse("1987-01-01", "2019").unwrap())
//! .with_measurements(["water"]);
//! assert_eq!(query.product, "wofs_albers");
//! ```

use drill_common::{CrsCode, TimeRange};
use serde::{Deserialize, Serialize};

use crate::fuse::FuseRule;
use crate::geometry::QueryGeometry;
use crate::group::GroupBy;
use crate::resample::Resampling;

/// Load options that vary per product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraQuery {
    /// How overlapping datasets of one time group are merged.
    #[serde(alias = "fuse_func")]
    pub fuse: FuseRule,
    pub resampling: Resampling,
    pub group_by: GroupBy,
    /// Output CRS; defaults to the product's storage CRS.
    pub output_crs: Option<CrsCode>,
    /// Output resolution `[y, x]`; defaults to the product's resolution.
    pub resolution: Option<[f64; 2]>,
    /// Grid alignment `[y, x]`.
    pub align: Option<[f64; 2]>,
    /// Skip datasets that fail to read instead of failing the load.
    pub skip_broken_datasets: bool,
}

/// A request for data from one product.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatioTemporalQuery {
    pub product: String,
    pub geometry: QueryGeometry,
    pub time: Option<TimeRange>,
    /// Bands to load by name or alias; `None` loads every band.
    pub measurements: Option<Vec<String>>,
    pub extra: ExtraQuery,
}

impl SpatioTemporalQuery {
    pub fn new(product: impl Into<String>, geometry: QueryGeometry) -> Self {
        Self {
            product: product.into(),
            geometry,
            time: None,
            measurements: None,
            extra: ExtraQuery::default(),
        }
    }

    pub fn with_time(mut self, time: TimeRange) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_measurements<I, S>(mut self, measurements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measurements = Some(measurements.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra(mut self, extra: ExtraQuery) -> Self {
        self.extra = extra;
        self
    }

    /// Human-readable summary used in log lines and errors.
    pub fn describe(&self) -> String {
        match &self.time {
            Some(range) => format!(
                "{} between {} and {}",
                self.product,
                range.start.format("%Y-%m-%d"),
                range.end.format("%Y-%m-%d")
            ),
            None => self.product.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_query_from_catalog_yaml() {
        let yaml = r#"
fuse_func: wofls_fuser
output_crs: "EPSG:3577"
resolution: [-25, 25]
group_by: solar_day
"#;
        let extra: ExtraQuery = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(extra.fuse, FuseRule::NodataBit(0));
        assert_eq!(extra.output_crs, Some(CrsCode::Epsg3577));
        assert_eq!(extra.resolution, Some([-25.0, 25.0]));
        assert_eq!(extra.resampling, Resampling::Nearest);
        assert!(!extra.skip_broken_datasets);
    }

    #[test]
    fn test_builder() {
        let query = SpatioTemporalQuery::new(
            "fc_percentile",
            QueryGeometry::point(0.0, 0.0, CrsCode::Epsg4326),
        )
        .with_time(TimeRange::parse("2010", "2011").unwrap())
        .with_measurements(vec!["PV", "NPV"]);

        assert_eq!(
            query.measurements,
            Some(vec!["PV".to_string(), "NPV".to_string()])
        );
        assert_eq!(query.describe(), "fc_percentile between 2010-01-01 and 2011-12-31");
    }
}
