//! Synthetic rasters, time axes and populated data cubes.
//!
//! These generators create small, predictable inputs whose statistics can
//! be worked out by hand in the tests that use them.

use chrono::{DateTime, Duration, TimeZone, Utc};
use datacube::{Band, DType, Dataset, InMemoryDataCube, Product, RasterCube};
use drill_common::GeoBox;
use ndarray::{Array2, Array3};

/// Midnight UTC on the given date.
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// Timestamps at the given day offsets from `start`.
///
/// # Example
///
/// ```
/// use test_utils::{days_from, utc};
///
/// let times = days_from(utc(2020, 1, 1), &[0, 1, 5]);
/// assert_eq!(times[2], utc(2020, 1, 6));
/// ```
pub fn days_from(start: DateTime<Utc>, offsets: &[i64]) -> Vec<DateTime<Utc>> {
    offsets.iter().map(|&d| start + Duration::days(d)).collect()
}

/// A raster whose value at (row, col) is `f(row, col)`.
pub fn raster<F>(height: usize, width: usize, f: F) -> Array2<f32>
where
    F: Fn(usize, usize) -> f32,
{
    Array2::from_shape_fn((height, width), |(r, c)| f(r, c))
}

/// A (time, row, col) array from one raster per timestep.
pub fn stack(slices: &[Array2<f32>]) -> Array3<f32> {
    let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
    ndarray::stack(ndarray::Axis(0), &views).expect("slices share a shape")
}

/// Single-band cube.
pub fn single_band_cube(
    times: Vec<DateTime<Utc>>,
    geobox: GeoBox,
    name: &str,
    band: Band,
) -> RasterCube {
    RasterCube::new(times, geobox)
        .with_band(name, band)
        .expect("band matches cube shape")
}

/// Float band with a nodata sentinel.
pub fn float_band(data: Array3<f32>, nodata: f64) -> Band {
    Band::new(data, DType::Float32, Some(nodata))
}

/// Add a product and one dataset per timestep, each band filled by
/// `fill(time_index, band_name)`.
pub fn seed_product<F>(
    cube: &mut InMemoryDataCube,
    product: Product,
    grid: GeoBox,
    times: &[DateTime<Utc>],
    fill: F,
) where
    F: Fn(usize, &str) -> Array2<f32>,
{
    let names: Vec<String> = product.measurements.iter().map(|m| m.name.clone()).collect();
    let product_name = product.name.clone();
    cube.add_product(product);

    for (index, time) in times.iter().enumerate() {
        let dataset = Dataset::new(product_name.clone(), *time, grid);
        let rasters = names
            .iter()
            .map(|name| (name.clone(), fill(index, name)))
            .collect::<Vec<_>>();
        cube.add_dataset(dataset, rasters)
            .expect("fixture rasters match grid");
    }
}
