//! Spatial reductions of masked cubes into per-timestep statistics.

use chrono::{DateTime, Utc};
use datacube::{Band, CubeResult, RasterCube};
use ndarray::{ArrayView2, Zip};
use rayon::prelude::*;
use tracing::debug;

use crate::error::CoreResult;
use crate::table::{Cell, StatisticsTable};

pub const DEFAULT_WET_THRESHOLD: f64 = -350.0;
pub const DEFAULT_VALID_FRACTION: f64 = 0.9;

/// A compositional band summed as a fraction (value / scale) per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverBand {
    pub band: String,
    pub column: String,
}

impl CoverBand {
    pub fn new(band: &str, column: &str) -> Self {
        Self {
            band: band.to_string(),
            column: column.to_string(),
        }
    }
}

/// Raw sums for one timestep before filtering and normalising.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaCounts {
    pub time: DateTime<Utc>,
    /// Pixels with observed water.
    pub water: f64,
    /// Pixels with a valid index value.
    pub observed: f64,
    /// Pixels whose index exceeds the wet threshold.
    pub wet: f64,
    /// Per cover band: sum of value / scale over dry observed pixels.
    pub cover: Vec<f64>,
}

impl AreaCounts {
    /// Water plus observed index pixels.
    pub fn valid(&self) -> f64 {
        self.water + self.observed
    }
}

/// Wetland area statistics: open water, wet and the fractional cover of
/// the remaining dry area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStatistics {
    pub presence_band: String,
    pub index_band: String,
    pub cover_bands: Vec<CoverBand>,
    pub water_column: String,
    pub wet_column: String,
    pub wet_threshold: f64,
    /// Rows need `valid / total_area` above this to be kept.
    pub valid_fraction: f64,
    pub cover_scale: f64,
}

impl Default for AreaStatistics {
    fn default() -> Self {
        Self {
            presence_band: "water".into(),
            index_band: "TCW".into(),
            cover_bands: vec![
                CoverBand::new("bs", "Bare Soil"),
                CoverBand::new("pv", "Green Vegetation"),
                CoverBand::new("npv", "Dry Vegetation"),
            ],
            water_column: "Open Water".into(),
            wet_column: "Wet".into(),
            wet_threshold: DEFAULT_WET_THRESHOLD,
            valid_fraction: DEFAULT_VALID_FRACTION,
            cover_scale: 100.0,
        }
    }
}

impl AreaStatistics {
    pub fn with_thresholds(mut self, wet_threshold: f64, valid_fraction: f64) -> Self {
        self.wet_threshold = wet_threshold;
        self.valid_fraction = valid_fraction;
        self
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![self.water_column.clone(), self.wet_column.clone()];
        columns.extend(self.cover_bands.iter().map(|c| c.column.clone()));
        columns
    }

    /// Raw per-timestep sums, computed in parallel over timesteps.
    pub fn counts(&self, cube: &RasterCube) -> CubeResult<Vec<AreaCounts>> {
        let presence = cube.band(&self.presence_band)?;
        let index = cube.band(&self.index_band)?;
        let covers = self
            .cover_bands
            .iter()
            .map(|c| cube.band(&c.band))
            .collect::<CubeResult<Vec<_>>>()?;

        Ok((0..cube.len_time())
            .into_par_iter()
            .map(|t| {
                let index_slice = index.slice(t);
                let observed = count_where(index_slice, |v| index.is_valid(v));
                let wet = count_where(index_slice, |v| {
                    index.is_valid(v) && v as f64 > self.wet_threshold
                });
                let water = count_where(presence.slice(t), |v| presence.is_valid(v) && v > 0.0);
                let cover = covers
                    .iter()
                    .map(|band| self.dry_cover_sum(index, index_slice, band, t))
                    .collect();
                AreaCounts {
                    time: cube.times()[t],
                    water,
                    observed,
                    wet,
                    cover,
                }
            })
            .collect())
    }

    fn dry_cover_sum(&self, index: &Band, index_slice: ArrayView2<f32>, band: &Band, t: usize) -> f64 {
        let mut sum = 0.0;
        Zip::from(index_slice).and(band.slice(t)).for_each(|&i, &v| {
            if index.is_valid(i) && (i as f64) < self.wet_threshold && band.is_valid(v) {
                sum += v as f64 / self.cover_scale;
            }
        });
        sum
    }

    /// One row per timestep whose valid area exceeds `valid_fraction` of
    /// `total_area`, each value divided by the row's valid pixel count.
    /// An empty cube or a zero area gives an empty table.
    pub fn summarize(&self, cube: &RasterCube, total_area: usize) -> CoreResult<StatisticsTable> {
        let counts = self.counts(cube)?;
        let mut table = StatisticsTable::new(self.columns());
        if total_area == 0 {
            return Ok(table);
        }

        for row in counts {
            let valid = row.valid();
            if valid / total_area as f64 <= self.valid_fraction {
                debug!(time = %row.time, valid, total_area, "Dropping under-observed timestep");
                continue;
            }
            let mut values = vec![Cell::Number(row.water / valid), Cell::Number(row.wet / valid)];
            values.extend(row.cover.iter().map(|c| Cell::Number(c / valid)));
            table.push_row(row.time, values)?;
        }
        Ok(table)
    }
}

/// Number of pixels satisfying `predicate`.
pub fn count_where<F>(slice: ArrayView2<f32>, predicate: F) -> f64
where
    F: Fn(f32) -> bool,
{
    slice.iter().filter(|&&v| predicate(v)).count() as f64
}

/// Pixel counts of each class value in timestep `t`.
pub fn class_counts(band: &Band, t: usize, classes: &[f32]) -> Vec<f64> {
    let slice = band.slice(t);
    classes
        .iter()
        .map(|&class| count_where(slice, |v| band.is_valid(v) && v == class))
        .collect()
}

/// Index of the largest of `values` (first on ties), compared as whole
/// numbers.
pub fn dominant(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .map(|v| v.trunc() as i32)
        .enumerate()
        .fold(None, |best: Option<(usize, i32)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
