//! Resampling dataset rasters onto the output grid.

use drill_common::GeoBox;
use ndarray::{Array2, ArrayView2, Zip};
use projection::Reprojector;
use serde::{Deserialize, Serialize};

/// Resampling kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    #[default]
    Nearest,
}

/// Resample `src` (on `src_box`) onto `dst_box`. Output pixels whose centre
/// falls outside the source grid get `fill`.
pub fn reproject(
    src: ArrayView2<f32>,
    src_box: &GeoBox,
    dst_box: &GeoBox,
    fill: f32,
    resampling: Resampling,
) -> Array2<f32> {
    let mut out = Array2::from_elem(dst_box.shape(), fill);
    let to_src = Reprojector::new(dst_box.crs, src_box.crs);

    match resampling {
        Resampling::Nearest => {
            Zip::indexed(&mut out).par_for_each(|(row, col), value| {
                let (x, y) = dst_box.transform.pixel_center(col, row);
                let (sx, sy) = to_src.transform(x, y);
                if let Some((scol, srow)) = src_box.pixel_at(sx, sy) {
                    *value = src[[srow, scol]];
                }
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_common::{Affine, CrsCode};
    use ndarray::array;

    #[test]
    fn test_identity_grid_copies() {
        let gb = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 50.0, 25.0, -25.0), 2, 2);
        let src = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let out = reproject(src.view(), &gb, &gb, -1.0, Resampling::Nearest);
        assert_eq!(out, src);
    }

    #[test]
    fn test_offset_and_fill() {
        let src_box = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 50.0, 25.0, -25.0), 2, 2);
        // Shifted one pixel right: left column overlaps the source's right column.
        let dst_box = GeoBox::new(CrsCode::Epsg3577, Affine::new(25.0, 50.0, 25.0, -25.0), 2, 2);
        let src = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let out = reproject(src.view(), &src_box, &dst_box, -1.0, Resampling::Nearest);
        assert_eq!(out, array![[2.0, -1.0], [4.0, -1.0]]);
    }

    #[test]
    fn test_upsample_nearest() {
        let src_box = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 50.0, 25.0, -25.0), 2, 2);
        let dst_box = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 50.0, 12.5, -12.5), 4, 4);
        let src = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let out = reproject(src.view(), &src_box, &dst_box, -1.0, Resampling::Nearest);
        assert_eq!(out.row(0).to_vec(), vec![1.0, 1.0, 2.0, 2.0]);
        assert_eq!(out.row(3).to_vec(), vec![3.0, 3.0, 4.0, 4.0]);
    }
}
