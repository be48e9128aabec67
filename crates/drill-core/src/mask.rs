//! Geometry masks aligned to a cube's grid.
//!
//! A [`PixelMask`] always says which sense its `true` values have, so
//! callers never have to remember whether a mask marks the region of
//! interest or everything around it.

use datacube::{CubeError, CubeResult, QueryGeometry, RasterCube};
use drill_common::{BoundingBox, GeoBox};
use geo::{Area, BoundingRect, Contains, Coord, Geometry, Intersects, MultiPolygon, Point, Rect};
use ndarray::{Array2, Axis, Zip};

/// What a `true` pixel in a [`PixelMask`] means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskSense {
    /// `true` marks pixels inside the geometry.
    Inside,
    /// `true` marks pixels outside the geometry.
    Outside,
}

/// Boolean raster in (row, col) order with an explicit sense.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMask {
    data: Array2<bool>,
    sense: MaskSense,
}

impl PixelMask {
    pub fn new(data: Array2<bool>, sense: MaskSense) -> Self {
        Self { data, sense }
    }

    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn sense(&self) -> MaskSense {
        self.sense
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_inside(&self, row: usize, col: usize) -> bool {
        self.data[[row, col]] == (self.sense == MaskSense::Inside)
    }

    /// `true` wherever the pixel is inside, whatever the stored sense.
    pub fn inside(&self) -> Array2<bool> {
        match self.sense {
            MaskSense::Inside => self.data.clone(),
            MaskSense::Outside => self.data.mapv(|b| !b),
        }
    }

    pub fn inside_count(&self) -> usize {
        let wanted = self.sense == MaskSense::Inside;
        self.data.iter().filter(|&&b| b == wanted).count()
    }
}

/// Rasterise `geometry` onto `geobox`.
///
/// The geometry is first reprojected into the grid's CRS. Areas burn the
/// pixels whose centre they contain, or with `all_touched` every pixel they
/// touch. Points burn the pixel they fall in; lines and zero-area polygons
/// burn every pixel they cross.
///
/// With `invert == false` the result marks pixels *outside* the geometry;
/// with `invert == true` it marks pixels inside.
pub fn rasterize_mask(
    geometry: &QueryGeometry,
    geobox: &GeoBox,
    all_touched: bool,
    invert: bool,
) -> PixelMask {
    let projected = geometry.to_crs(geobox.crs);
    let mut burned = Array2::from_elem(geobox.shape(), false);

    match projected.geometry() {
        Geometry::Point(point) => {
            if let Some((col, row)) = geobox.pixel_at(point.x(), point.y()) {
                burned[[row, col]] = true;
            }
        }
        Geometry::LineString(line) => {
            if let Some(bounds) = line.bounding_rect() {
                burn_where(&mut burned, geobox, rect_bounds(&bounds), |pixel, _| {
                    line.intersects(pixel)
                });
            }
        }
        Geometry::Polygon(polygon) => {
            burn_area(&mut burned, geobox, &MultiPolygon::new(vec![polygon.clone()]), all_touched);
        }
        Geometry::MultiPolygon(polygons) => burn_area(&mut burned, geobox, polygons, all_touched),
        // QueryGeometry only admits the kinds above.
        _ => {}
    }

    if invert {
        PixelMask::new(burned, MaskSense::Inside)
    } else {
        PixelMask::new(burned.mapv(|b| !b), MaskSense::Outside)
    }
}

fn burn_area(burned: &mut Array2<bool>, geobox: &GeoBox, area: &MultiPolygon<f64>, all_touched: bool) {
    let Some(rect) = area.bounding_rect() else {
        return;
    };
    if rect.width() == 0.0 && rect.height() == 0.0 {
        if let Some((col, row)) = geobox.pixel_at(rect.min().x, rect.min().y) {
            burned[[row, col]] = true;
        }
        return;
    }
    let bounds = rect_bounds(&rect);

    if all_touched || area.unsigned_area() == 0.0 {
        burn_where(burned, geobox, bounds, |pixel, _| area.intersects(pixel));
    } else {
        burn_where(burned, geobox, bounds, |_, centre| area.contains(centre));
    }
}

/// Evaluate `burn(pixel_rect, pixel_centre)` for every pixel whose bounds
/// meet `bounds`, in parallel over the grid.
fn burn_where<F>(burned: &mut Array2<bool>, geobox: &GeoBox, bounds: BoundingBox, burn: F)
where
    F: Fn(&Rect<f64>, &Point<f64>) -> bool + Sync,
{
    let transform = geobox.transform;
    Zip::indexed(burned).par_for_each(|(row, col), cell| {
        let px = transform.pixel_bounds(col, row);
        if !px.intersects(&bounds) {
            return;
        }
        let rect = Rect::new(
            Coord { x: px.min_x, y: px.min_y },
            Coord { x: px.max_x, y: px.max_y },
        );
        let (cx, cy) = transform.pixel_center(col, row);
        *cell = burn(&rect, &Point::new(cx, cy));
    });
}

fn rect_bounds(rect: &Rect<f64>) -> BoundingBox {
    BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

/// Replace every pixel outside `mask` with its band's fill value (the
/// nodata sentinel, or NaN when the band declares none). Band attributes
/// are left untouched.
pub fn apply_mask(mut cube: RasterCube, mask: &PixelMask) -> CubeResult<RasterCube> {
    let (_, rows, cols) = cube.shape();
    if mask.shape() != (rows, cols) {
        return Err(CubeError::ShapeMismatch(format!(
            "mask is {:?}, cube grid is {:?}",
            mask.shape(),
            (rows, cols)
        )));
    }

    let inside = mask.inside();
    for (_, band) in cube.bands_mut() {
        let fill = band.fill_value();
        for mut slice in band.data.axis_iter_mut(Axis(0)) {
            Zip::from(&mut slice).and(&inside).for_each(|value, &keep| {
                if !keep {
                    *value = fill;
                }
            });
        }
    }
    Ok(cube)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacube::{Band, DType};
    use drill_common::{Affine, CrsCode};
    use ndarray::Array3;

    /// 10 x 10 grid of unit pixels, origin at (0, 10).
    fn grid() -> GeoBox {
        GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 10.0, 1.0, -1.0), 10, 10)
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> QueryGeometry {
        QueryGeometry::polygon(
            vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)],
            CrsCode::Epsg3577,
        )
    }

    #[test]
    fn test_centre_rule() {
        // Covers centres of columns 2..=4 and rows 5..=7.
        let mask = rasterize_mask(&square(1.6, 2.2, 4.9, 5.4), &grid(), false, true);
        assert_eq!(mask.sense(), MaskSense::Inside);
        assert_eq!(mask.inside_count(), 9);
        assert!(mask.is_inside(5, 2));
        assert!(mask.is_inside(7, 4));
        assert!(!mask.is_inside(4, 2));
        assert!(!mask.is_inside(7, 1));
    }

    #[test]
    fn test_all_touched_burns_more() {
        let geometry = square(1.6, 2.2, 4.9, 5.4);
        let centre = rasterize_mask(&geometry, &grid(), false, true);
        let touched = rasterize_mask(&geometry, &grid(), true, true);
        // Columns 1..=4, rows 4..=7
        assert_eq!(touched.inside_count(), 16);
        assert!(touched.inside_count() > centre.inside_count());
    }

    #[test]
    fn test_invert_is_complement() {
        let geometry = QueryGeometry::polygon(
            vec![(0.5, 0.5), (8.7, 1.2), (6.1, 9.3), (0.5, 0.5)],
            CrsCode::Epsg3577,
        );
        for all_touched in [false, true] {
            let inside = rasterize_mask(&geometry, &grid(), all_touched, true);
            let outside = rasterize_mask(&geometry, &grid(), all_touched, false);
            assert_eq!(outside.sense(), MaskSense::Outside);
            Zip::from(inside.data()).and(outside.data()).for_each(|&a, &b| assert_ne!(a, b));
            assert_eq!(inside.inside(), outside.inside());
        }
    }

    #[test]
    fn test_point_and_degenerate_polygon() {
        let point = QueryGeometry::point(3.5, 6.5, CrsCode::Epsg3577);
        let mask = rasterize_mask(&point, &grid(), false, true);
        assert_eq!(mask.inside_count(), 1);
        assert!(mask.is_inside(3, 3));

        let outside_grid = QueryGeometry::point(30.0, 6.5, CrsCode::Epsg3577);
        assert_eq!(rasterize_mask(&outside_grid, &grid(), false, true).inside_count(), 0);

        // Polygons collapsed to a point or a line still burn what they touch.
        let collapsed = square(2.5, 4.5, 2.5, 4.5);
        let mask = rasterize_mask(&collapsed, &grid(), false, true);
        assert_eq!(mask.inside_count(), 1);
        assert!(mask.is_inside(5, 2));

        let sliver = square(2.5, 4.5, 6.5, 4.5);
        let mask = rasterize_mask(&sliver, &grid(), false, true);
        assert_eq!(mask.inside_count(), 5);
        assert!((2..=6).all(|col| mask.is_inside(5, col)));
    }

    #[test]
    fn test_geographic_geometry_reprojected() {
        let geobox = GeoBox::new(
            CrsCode::Epsg3577,
            Affine::new(1_500_000.0, -3_900_000.0, 1000.0, -1000.0),
            40,
            40,
        );
        let centre = geobox.transform.pixel_center(20, 20);
        let (lon, lat) = projection::Reprojector::new(CrsCode::Epsg3577, CrsCode::Epsg4326)
            .transform(centre.0, centre.1);
        let point = QueryGeometry::point(lon, lat, CrsCode::Epsg4326);
        let mask = rasterize_mask(&point, &geobox, false, true);
        assert!(mask.is_inside(20, 20));
    }

    #[test]
    fn test_apply_mask_fills_outside() {
        let geobox = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 2.0, 1.0, -1.0), 2, 2);
        let times = vec![chrono::Utc::now()];
        let data = Array3::from_elem((1, 2, 2), 7.0);
        let cube = RasterCube::new(times, geobox)
            .with_band("sentinel", Band::new(data.clone(), DType::Int16, Some(-1.0)))
            .unwrap()
            .with_band("float", Band::new(data, DType::Float32, None))
            .unwrap();

        let mut inside = Array2::from_elem((2, 2), false);
        inside[[0, 1]] = true;
        let masked = apply_mask(cube, &PixelMask::new(inside, MaskSense::Inside)).unwrap();

        let sentinel = masked.band("sentinel").unwrap();
        assert_eq!(sentinel.data[[0, 0, 1]], 7.0);
        assert_eq!(sentinel.data[[0, 0, 0]], -1.0);
        assert_eq!(sentinel.nodata, Some(-1.0));
        assert_eq!(sentinel.dtype, DType::Int16);
        assert!(masked.band("float").unwrap().data[[0, 1, 1]].is_nan());
    }

    #[test]
    fn test_apply_mask_shape_mismatch() {
        let geobox = GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 2.0, 1.0, -1.0), 2, 2);
        let cube = RasterCube::new(vec![], geobox);
        let mask = PixelMask::new(Array2::from_elem((3, 3), true), MaskSense::Inside);
        assert!(matches!(apply_mask(cube, &mask), Err(CubeError::ShapeMismatch(_))));
    }
}
