//! Byte budget enforced before any raster data is read.
//!
//! The estimate is `pixels x time slices x sum(itemsize)` over the requested
//! bands. Both the total and the per-slice volume must stay within their
//! limits, otherwise the load is refused with a message the caller can act
//! on (shrink the polygon or the time range).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One gigabyte as used in budget messages.
pub const GB: f64 = 1e9;

/// Reasons a load is refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("requested area requires {requested_gb}GB data to load - maximum is {max_gb:.1}GB")]
    TotalExceeded { requested_gb: u64, max_gb: f64 },

    #[error(
        "requested time slices each requires {requested_gb}GB data to load - maximum is {max_gb:.1}GB"
    )]
    SliceExceeded { requested_gb: u64, max_gb: f64 },

    #[error("query returned no time slices")]
    NoTimeSlices,
}

/// Limits applied by [`LoadBudgetGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum total load, in bytes.
    pub max_total_bytes: f64,
    /// Maximum load per time slice, in bytes.
    pub max_slice_bytes: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: 20.0 * GB,
            max_slice_bytes: 2.0 * GB,
        }
    }
}

impl BudgetConfig {
    pub fn from_gb(max_total_gb: f64, max_slice_gb: f64) -> Self {
        Self {
            max_total_bytes: max_total_gb * GB,
            max_slice_bytes: max_slice_gb * GB,
        }
    }
}

/// Accepted load volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadEstimate {
    pub total_bytes: u128,
    pub slice_bytes: u128,
    pub time_slices: u64,
}

/// Refuses loads whose estimated volume exceeds the configured budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBudgetGuard {
    config: BudgetConfig,
}

impl LoadBudgetGuard {
    pub fn new(config: BudgetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Check a prospective load of `pixels` per slice over `time_slices`
    /// slices for bands with the given item sizes.
    pub fn check(
        &self,
        pixels: u64,
        time_slices: u64,
        itemsizes: &[usize],
    ) -> Result<LoadEstimate, BudgetError> {
        if time_slices == 0 {
            return Err(BudgetError::NoTimeSlices);
        }

        let bytes_per_pixel: u128 = itemsizes.iter().map(|&s| s as u128).sum();
        let slice_bytes = pixels as u128 * bytes_per_pixel;
        let total_bytes = slice_bytes * time_slices as u128;

        if total_bytes as f64 > self.config.max_total_bytes {
            return Err(BudgetError::TotalExceeded {
                requested_gb: (total_bytes as f64 / GB) as u64,
                max_gb: self.config.max_total_bytes / GB,
            });
        }

        if slice_bytes as f64 > self.config.max_slice_bytes {
            return Err(BudgetError::SliceExceeded {
                requested_gb: (slice_bytes as f64 / GB) as u64,
                max_gb: self.config.max_slice_bytes / GB,
            });
        }

        Ok(LoadEstimate {
            total_bytes,
            slice_bytes,
            time_slices,
        })
    }
}
