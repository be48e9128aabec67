//! Query geometries tagged with their CRS.

use drill_common::{BoundingBox, CrsCode};
use geo::{BoundingRect, Coord, Geometry, MapCoords, Point, Polygon};
use projection::Reprojector;

use crate::error::{CubeError, CubeResult};

/// A point or area of interest in a known CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryGeometry {
    geometry: Geometry<f64>,
    crs: CrsCode,
}

impl QueryGeometry {
    /// Wrap a geometry. Only points, line strings, polygons and
    /// multipolygons can be queried or rasterized.
    pub fn new(geometry: Geometry<f64>, crs: CrsCode) -> CubeResult<Self> {
        match &geometry {
            Geometry::Point(_)
            | Geometry::LineString(_)
            | Geometry::Polygon(_)
            | Geometry::MultiPolygon(_) => Ok(Self { geometry, crs }),
            other => Err(CubeError::InvalidGeometry(format!(
                "unsupported geometry type: {}",
                geometry_type_name(other)
            ))),
        }
    }

    pub fn point(x: f64, y: f64, crs: CrsCode) -> Self {
        Self {
            geometry: Geometry::Point(Point::new(x, y)),
            crs,
        }
    }

    /// Polygon from an exterior ring; the ring is closed if needed.
    pub fn polygon(exterior: Vec<(f64, f64)>, crs: CrsCode) -> Self {
        Self {
            geometry: Geometry::Polygon(Polygon::new(exterior.into(), vec![])),
            crs,
        }
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn is_point(&self) -> bool {
        matches!(self.geometry, Geometry::Point(_))
    }

    /// The same geometry with every vertex reprojected to `crs`.
    pub fn to_crs(&self, crs: CrsCode) -> QueryGeometry {
        let reprojector = Reprojector::new(self.crs, crs);
        if reprojector.is_identity() {
            return self.clone();
        }
        let reprojector = &reprojector;
        let geometry = self.geometry.map_coords(|c| {
            let (x, y) = reprojector.transform(c.x, c.y);
            Coord { x, y }
        });
        QueryGeometry { geometry, crs }
    }

    /// Bounding box in the geometry's own CRS.
    pub fn bbox(&self) -> CubeResult<BoundingBox> {
        let rect = self
            .geometry
            .bounding_rect()
            .ok_or_else(|| CubeError::InvalidGeometry("geometry has no coordinates".into()))?;
        Ok(BoundingBox::new(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
        ))
    }

    /// Bounding box after reprojecting the vertices to `crs`.
    pub fn bbox_in(&self, crs: CrsCode) -> CubeResult<BoundingBox> {
        self.to_crs(crs).bbox()
    }

    /// Point used to label single-location results, as (lon, lat).
    pub fn label_lon_lat(&self) -> CubeResult<(f64, f64)> {
        let geographic = self.to_crs(CrsCode::Epsg4326);
        match geographic.geometry() {
            Geometry::Point(p) => Ok((p.x(), p.y())),
            _ => Ok(geographic.bbox()?.center()),
        }
    }
}

pub(crate) fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
