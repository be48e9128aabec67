//! In-memory raster cubes.
//!
//! A [`RasterCube`] holds every band of a load on one grid and one ascending
//! time axis. Band arrays are laid out `(time, row, col)` and stored as
//! `f32` whatever their storage dtype; the dtype, nodata sentinel and flag
//! table travel with the band so later stages can interpret the values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drill_common::GeoBox;
use ndarray::{Array3, ArrayView2, Axis, Zip};

use crate::error::{CubeError, CubeResult};
use crate::types::{DType, FlagCondition, FlagsDefinition, Measurement};

/// Tolerance when comparing values against a nodata sentinel.
pub const NODATA_EPSILON: f64 = 1e-5;

/// One band of a cube with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub data: Array3<f32>,
    pub dtype: DType,
    pub nodata: Option<f64>,
    pub units: String,
    pub flags: Option<FlagsDefinition>,
}

impl Band {
    pub fn new(data: Array3<f32>, dtype: DType, nodata: Option<f64>) -> Self {
        Self {
            data,
            dtype,
            nodata,
            units: "1".to_string(),
            flags: None,
        }
    }

    /// Band carrying a measurement's attributes.
    pub fn from_measurement(measurement: &Measurement, data: Array3<f32>) -> Self {
        Self {
            data,
            dtype: measurement.dtype,
            nodata: measurement.nodata,
            units: measurement.units.clone(),
            flags: measurement.flags_definition.clone(),
        }
    }

    pub fn with_flags(mut self, flags: FlagsDefinition) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Value written where a pixel has no data: the sentinel, else NaN.
    pub fn fill_value(&self) -> f32 {
        self.nodata.map_or(f32::NAN, |nd| nd as f32)
    }

    /// A value is valid when it is a number and not within
    /// [`NODATA_EPSILON`] of the sentinel.
    pub fn is_valid(&self, value: f32) -> bool {
        is_valid(value, self.nodata)
    }

    /// Per-pixel validity over the whole band.
    pub fn valid_mask(&self) -> Array3<bool> {
        let nodata = self.nodata;
        self.data.mapv(|v| is_valid(v, nodata))
    }

    pub fn slice(&self, t: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), t)
    }

    /// Pixels whose packed flag value satisfies `condition`. Nodata and
    /// non-integral values never match.
    pub fn flag_mask(&self, condition: &FlagCondition) -> Array3<bool> {
        let nodata = self.nodata;
        let mut mask = Array3::from_elem(self.data.raw_dim(), false);
        Zip::from(&mut mask).and(&self.data).for_each(|m, &v| {
            *m = is_valid(v, nodata) && v >= 0.0 && condition.matches(v as u64);
        });
        mask
    }

    fn select_times(&self, indices: &[usize]) -> Band {
        Band {
            data: self.data.select(Axis(0), indices),
            dtype: self.dtype,
            nodata: self.nodata,
            units: self.units.clone(),
            flags: self.flags.clone(),
        }
    }
}

/// Validity test shared by bands and aggregators.
pub fn is_valid(value: f32, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return false;
    }
    match nodata {
        Some(nd) if nd.is_nan() => true,
        Some(nd) => (value as f64 - nd).abs() >= NODATA_EPSILON,
        None => true,
    }
}

/// Multi-band, multi-timestep raster on a single grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCube {
    times: Vec<DateTime<Utc>>,
    geobox: GeoBox,
    bands: BTreeMap<String, Band>,
}

impl RasterCube {
    /// Empty cube over the given (ascending) time axis and grid.
    pub fn new(times: Vec<DateTime<Utc>>, geobox: GeoBox) -> Self {
        debug_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        Self {
            times,
            geobox,
            bands: BTreeMap::new(),
        }
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn geobox(&self) -> &GeoBox {
        &self.geobox
    }

    /// (time, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.geobox.height, self.geobox.width)
    }

    pub fn len_time(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Add or replace a band; its array must match the cube's shape.
    pub fn insert_band(&mut self, name: impl Into<String>, band: Band) -> CubeResult<()> {
        let name = name.into();
        if band.data.dim() != self.shape() {
            return Err(CubeError::ShapeMismatch(format!(
                "band '{}' has shape {:?}, cube is {:?}",
                name,
                band.data.dim(),
                self.shape()
            )));
        }
        self.bands.insert(name, band);
        Ok(())
    }

    pub fn with_band(mut self, name: impl Into<String>, band: Band) -> CubeResult<Self> {
        self.insert_band(name, band)?;
        Ok(self)
    }

    pub fn band(&self, name: &str) -> CubeResult<&Band> {
        self.bands
            .get(name)
            .ok_or_else(|| CubeError::BandNotFound(name.to_string()))
    }

    pub fn band_mut(&mut self, name: &str) -> CubeResult<&mut Band> {
        self.bands
            .get_mut(name)
            .ok_or_else(|| CubeError::BandNotFound(name.to_string()))
    }

    pub fn remove_band(&mut self, name: &str) -> Option<Band> {
        self.bands.remove(name)
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, &Band)> {
        self.bands.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn bands_mut(&mut self) -> impl Iterator<Item = (&str, &mut Band)> {
        self.bands.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Sub-cube holding the given time indices, in the order given.
    pub fn select_times(&self, indices: &[usize]) -> RasterCube {
        RasterCube {
            times: indices.iter().map(|&i| self.times[i]).collect(),
            geobox: self.geobox,
            bands: self
                .bands
                .iter()
                .map(|(name, band)| (name.clone(), band.select_times(indices)))
                .collect(),
        }
    }

    /// Inner join on the time axis: keep timesteps present in both cubes
    /// and merge their bands. Both cubes must share a grid and band names
    /// must not collide.
    pub fn join_on_time(self, other: RasterCube) -> CubeResult<RasterCube> {
        if self.geobox != other.geobox {
            return Err(CubeError::ShapeMismatch(
                "cannot join cubes on different grids".to_string(),
            ));
        }
        if let Some(dup) = other.band_names().find(|n| self.has_band(n)) {
            return Err(CubeError::ShapeMismatch(format!(
                "band '{}' present in both cubes",
                dup
            )));
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.times.len() && j < other.times.len() {
            match self.times[i].cmp(&other.times[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    left.push(i);
                    right.push(j);
                    i += 1;
                    j += 1;
                }
            }
        }

        let mut joined = self.select_times(&left);
        let other = other.select_times(&right);
        joined.bands.extend(other.bands);
        Ok(joined)
    }
}
