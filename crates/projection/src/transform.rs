//! Transformations between the supported CRSs.

use drill_common::{BoundingBox, CrsCode};

use crate::{AlbersEqualArea, WebMercator};

/// Points sampled along each bbox edge when transforming boxes, so that
/// curved edges in the target CRS are enclosed.
const EDGE_SAMPLES: usize = 20;

/// Converts coordinates from one CRS to another via geographic lon/lat.
#[derive(Debug, Clone)]
pub struct Reprojector {
    src: CrsCode,
    dst: CrsCode,
    albers: AlbersEqualArea,
}

impl Reprojector {
    pub fn new(src: CrsCode, dst: CrsCode) -> Self {
        Self {
            src,
            dst,
            albers: AlbersEqualArea::australian_albers(),
        }
    }

    pub fn source(&self) -> CrsCode {
        self.src
    }

    pub fn target(&self) -> CrsCode {
        self.dst
    }

    /// True when source and target are the same CRS.
    pub fn is_identity(&self) -> bool {
        self.src == self.dst
    }

    /// Transform a single coordinate.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.to_geographic(self.src, x, y);
        self.from_geographic(self.dst, lon, lat)
    }

    /// Transform a bounding box, returning the box enclosing the densified
    /// transformed outline.
    pub fn transform_bbox(&self, bbox: &BoundingBox) -> BoundingBox {
        if self.is_identity() {
            return *bbox;
        }

        let mut points = Vec::with_capacity(4 * (EDGE_SAMPLES + 1));
        for i in 0..=EDGE_SAMPLES {
            let t = i as f64 / EDGE_SAMPLES as f64;
            let x = bbox.min_x + t * bbox.width();
            let y = bbox.min_y + t * bbox.height();
            points.push(self.transform(x, bbox.min_y));
            points.push(self.transform(x, bbox.max_y));
            points.push(self.transform(bbox.min_x, y));
            points.push(self.transform(bbox.max_x, y));
        }

        BoundingBox::from_points(points).unwrap_or(*bbox)
    }

    fn to_geographic(&self, crs: CrsCode, x: f64, y: f64) -> (f64, f64) {
        match crs {
            CrsCode::Epsg4326 => (x, y),
            CrsCode::Epsg3577 => self.albers.inverse(x, y),
            CrsCode::Epsg3857 => WebMercator.inverse(x, y),
        }
    }

    fn from_geographic(&self, crs: CrsCode, lon: f64, lat: f64) -> (f64, f64) {
        match crs {
            CrsCode::Epsg4326 => (lon, lat),
            CrsCode::Epsg3577 => self.albers.forward(lon, lat),
            CrsCode::Epsg3857 => WebMercator.forward(lon, lat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let r = Reprojector::new(CrsCode::Epsg3577, CrsCode::Epsg3577);
        assert!(r.is_identity());
        assert_eq!(r.transform(1.5, -2.5), (1.5, -2.5));
    }

    #[test]
    fn test_geographic_to_albers_and_back() {
        let fwd = Reprojector::new(CrsCode::Epsg4326, CrsCode::Epsg3577);
        let back = Reprojector::new(CrsCode::Epsg3577, CrsCode::Epsg4326);
        let (x, y) = fwd.transform(147.0, -36.0);
        let (lon, lat) = back.transform(x, y);
        assert!((lon - 147.0).abs() < 1e-8);
        assert!((lat + 36.0).abs() < 1e-8);
    }

    #[test]
    fn test_albers_to_mercator_goes_through_geographic() {
        let r = Reprojector::new(CrsCode::Epsg3577, CrsCode::Epsg3857);
        let (x, y) = r.transform(0.0, 0.0);
        let (ex, ey) = WebMercator.forward(132.0, 0.0);
        assert!((x - ex).abs() < 1e-3);
        assert!((y - ey).abs() < 1e-3);
    }

    #[test]
    fn test_transform_bbox_encloses_corners() {
        let r = Reprojector::new(CrsCode::Epsg4326, CrsCode::Epsg3577);
        let bbox = BoundingBox::new(146.6, -36.2, 147.3, -35.6);
        let out = r.transform_bbox(&bbox);
        for (lon, lat) in bbox.corners() {
            let (x, y) = r.transform(lon, lat);
            assert!(out.contains_point(x, y));
        }
    }
}
