//! Raster grid definitions: affine transform plus shape plus CRS.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, CrsCode};

/// Relative tolerance when snapping coordinates onto the pixel grid, so that
/// values a rounding error away from a grid line are treated as on it.
const SNAP_EPSILON: f64 = 1e-8;

/// North-up affine transform from pixel (col, row) to CRS coordinates.
///
/// ```text
/// x = origin_x + col * res_x
/// y = origin_y + row * res_y      (res_y < 0 for north-up)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width
    pub res_x: f64,
    /// Pixel height, negative for north-up grids
    pub res_y: f64,
}

impl Affine {
    pub fn new(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            res_x,
            res_y,
        }
    }

    /// Coordinates of the centre of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.res_x,
            self.origin_y + (row as f64 + 0.5) * self.res_y,
        )
    }

    /// Bounds of pixel (col, row).
    pub fn pixel_bounds(&self, col: usize, row: usize) -> BoundingBox {
        let x0 = self.origin_x + col as f64 * self.res_x;
        let x1 = x0 + self.res_x;
        let y0 = self.origin_y + row as f64 * self.res_y;
        let y1 = y0 + self.res_y;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Fractional (col, row) of a coordinate. Pixel (c, r) spans
    /// `[c, c + 1) x [r, r + 1)` in this space.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.res_x,
            (y - self.origin_y) / self.res_y,
        )
    }
}

/// A raster grid: CRS, affine transform and shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub crs: CrsCode,
    pub transform: Affine,
    pub width: usize,
    pub height: usize,
}

impl GeoBox {
    pub fn new(crs: CrsCode, transform: Affine, width: usize, height: usize) -> Self {
        Self {
            crs,
            transform,
            width,
            height,
        }
    }

    /// Build the smallest grid of the given resolution that covers `bbox`.
    ///
    /// Edges are snapped outward onto multiples of the resolution, offset by
    /// `align` (x, y). `res_y` may be given negative (datacube convention)
    /// or positive; the result is always north-up. A degenerate box (a
    /// point) yields a single pixel.
    pub fn covering(
        bbox: &BoundingBox,
        crs: CrsCode,
        res_x: f64,
        res_y: f64,
        align: (f64, f64),
    ) -> Self {
        let rx = res_x.abs();
        let ry = res_y.abs();

        let x0 = snap_down(bbox.min_x, rx, align.0);
        let x1 = snap_up(bbox.max_x, rx, align.0).max(x0 + rx);
        let y_bottom = snap_down(bbox.min_y, ry, align.1);
        let y_top = snap_up(bbox.max_y, ry, align.1).max(y_bottom + ry);

        let width = ((x1 - x0) / rx).round().max(1.0) as usize;
        let height = ((y_top - y_bottom) / ry).round().max(1.0) as usize;

        Self {
            crs,
            transform: Affine::new(x0, y_top, rx, -ry),
            width,
            height,
        }
    }

    /// (rows, cols), the order arrays are laid out in.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Full extent of the grid.
    pub fn extent(&self) -> BoundingBox {
        let t = &self.transform;
        let x1 = t.origin_x + self.width as f64 * t.res_x;
        let y1 = t.origin_y + self.height as f64 * t.res_y;
        BoundingBox::new(
            t.origin_x.min(x1),
            t.origin_y.min(y1),
            t.origin_x.max(x1),
            t.origin_y.max(y1),
        )
    }

    /// Integer pixel containing the coordinate, if it falls inside the grid.
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.world_to_pixel(x, y);
        if col < 0.0 || row < 0.0 || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        (col < self.width && row < self.height).then_some((col, row))
    }
}

fn snap_down(value: f64, res: f64, offset: f64) -> f64 {
    ((value - offset) / res + SNAP_EPSILON).floor() * res + offset
}

fn snap_up(value: f64, res: f64, offset: f64) -> f64 {
    ((value - offset) / res - SNAP_EPSILON).ceil() * res + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covering_snaps_outward() {
        let bbox = BoundingBox::new(1010.0, 2040.0, 1090.0, 2110.0);
        let geobox = GeoBox::covering(&bbox, CrsCode::Epsg3577, 25.0, -25.0, (0.0, 0.0));

        assert_eq!(geobox.transform.origin_x, 1000.0);
        assert_eq!(geobox.transform.origin_y, 2125.0);
        assert_eq!(geobox.transform.res_y, -25.0);
        assert_eq!(geobox.width, 4); // 1000..1100
        assert_eq!(geobox.height, 4); // 2025..2125
    }

    #[test]
    fn test_covering_on_grid_lines_does_not_grow() {
        let bbox = BoundingBox::new(1000.0, 2000.0, 1100.0, 2100.0);
        let geobox = GeoBox::covering(&bbox, CrsCode::Epsg3577, 25.0, -25.0, (0.0, 0.0));
        assert_eq!(geobox.shape(), (4, 4));
    }

    #[test]
    fn test_covering_point_is_single_pixel() {
        let bbox = BoundingBox::new(1012.0, 2013.0, 1012.0, 2013.0);
        let geobox = GeoBox::covering(&bbox, CrsCode::Epsg3577, 25.0, -25.0, (0.0, 0.0));
        assert_eq!(geobox.shape(), (1, 1));
        assert_eq!(geobox.pixel_at(1012.0, 2013.0), Some((0, 0)));
    }

    #[test]
    fn test_pixel_center_and_lookup() {
        let geobox = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 100.0, 10.0, -10.0), 10, 10);
        assert_eq!(geobox.transform.pixel_center(0, 0), (5.0, 95.0));
        assert_eq!(geobox.pixel_at(15.0, 85.0), Some((1, 1)));
        assert_eq!(geobox.pixel_at(-1.0, 85.0), None);
        assert_eq!(geobox.pixel_at(15.0, 100.5), None);
        assert_eq!(geobox.extent(), BoundingBox::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_alignment_offset() {
        let bbox = BoundingBox::new(12.0, 12.0, 18.0, 18.0);
        let geobox = GeoBox::covering(&bbox, CrsCode::Epsg3577, 10.0, -10.0, (5.0, 5.0));
        assert_eq!(geobox.transform.origin_x, 5.0);
        assert_eq!(geobox.transform.origin_y, 25.0);
        assert_eq!(geobox.shape(), (2, 2));
    }
}
