//! Parsing of drill process inputs.
//!
//! Clients send the geometry as a GeoJSON `FeatureCollection` holding exactly
//! one feature, and the time bounds either as a small GeoJSON-ish object
//! (`{"properties": {"timestamp": {"date-time": "..."}}}`), the JSON string
//! encoding of that object, or a bare ISO-8601 string.

use std::collections::BTreeMap;

use drill_common::{CrsCode, DrillError, DrillResult, TimeRange, CRS84_URN};
use geo::{Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Geometry kind a process accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Polygon,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::Polygon => "polygon",
        }
    }
}

/// A single parsed input feature with the CRS its coordinates are in.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: geo::Geometry<f64>,
    pub crs: CrsCode,
}

impl Feature {
    pub fn kind(&self) -> GeometryKind {
        match self.geometry {
            geo::Geometry::Point(_) => GeometryKind::Point,
            _ => GeometryKind::Polygon,
        }
    }

    /// Reject a feature of the wrong kind for the process.
    pub fn expect_kind(self, expected: GeometryKind) -> DrillResult<Self> {
        if self.kind() == expected {
            Ok(self)
        } else {
            Err(DrillError::InvalidGeometry(format!(
                "expected a {} geometry, got a {}",
                expected.as_str(),
                self.kind().as_str()
            )))
        }
    }
}

/// GeoJSON decoding failures. All surface as `InvalidGeometry`.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("no features specified")]
    NoFeatures,

    #[error("multiple features specified")]
    MultipleFeatures,

    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),

    #[error("invalid coordinates for {kind}: {message}")]
    Coordinates { kind: &'static str, message: String },

    #[error("malformed GeoJSON: {0}")]
    Malformed(String),
}

impl From<GeoJsonError> for DrillError {
    fn from(err: GeoJsonError) -> Self {
        DrillError::InvalidGeometry(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct NamedCrs {
    properties: NamedCrsProperties,
}

#[derive(Debug, Deserialize)]
struct NamedCrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(default)]
    features: Vec<FeatureDoc>,
    #[serde(default)]
    crs: Option<NamedCrs>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    geometry: GeometryDoc,
    #[serde(default)]
    crs: Option<NamedCrs>,
}

#[derive(Debug, Deserialize)]
struct GeometryDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Parse the `geometry` input. Accepts the collection as a JSON object or
/// as a string holding its JSON text.
pub fn parse_feature(input: &Value) -> DrillResult<Feature> {
    let doc: FeatureCollectionDoc = match input {
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| GeoJsonError::Malformed(e.to_string()))?;

    let collection_crs = doc.crs.map(|c| c.properties.name);
    let mut features = doc.features.into_iter();
    let feature = features.next().ok_or(GeoJsonError::NoFeatures)?;
    if features.next().is_some() {
        return Err(GeoJsonError::MultipleFeatures.into());
    }

    let crs_name = collection_crs
        .or_else(|| feature.crs.map(|c| c.properties.name))
        .unwrap_or_else(|| CRS84_URN.to_string());
    let crs = CrsCode::parse(&crs_name)?;

    let geometry = decode_geometry(&feature.geometry)?;
    Ok(Feature { geometry, crs })
}

fn decode_geometry(doc: &GeometryDoc) -> Result<geo::Geometry<f64>, GeoJsonError> {
    match doc.kind.as_str() {
        "Point" => {
            let position: Vec<f64> = coordinates(&doc.coordinates, "Point")?;
            Ok(Point::from(position_to_coord(&position, "Point")?).into())
        }
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = coordinates(&doc.coordinates, "Polygon")?;
            let mut rings = rings
                .iter()
                .map(|ring| ring_to_linestring(ring))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            let exterior = rings.next().ok_or(GeoJsonError::Coordinates {
                kind: "Polygon",
                message: "polygon has no rings".to_string(),
            })?;
            Ok(Polygon::new(exterior, rings.collect()).into())
        }
        other => Err(GeoJsonError::UnsupportedType(other.to_string())),
    }
}

fn coordinates<T: serde::de::DeserializeOwned>(
    value: &Value,
    kind: &'static str,
) -> Result<T, GeoJsonError> {
    serde_json::from_value(value.clone()).map_err(|e| GeoJsonError::Coordinates {
        kind,
        message: e.to_string(),
    })
}

/// Positions may carry a third (elevation) ordinate, which is ignored.
fn position_to_coord(position: &[f64], kind: &'static str) -> Result<Coord<f64>, GeoJsonError> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        _ => Err(GeoJsonError::Coordinates {
            kind,
            message: format!("position needs two finite ordinates, got {:?}", position),
        }),
    }
}

fn ring_to_linestring(ring: &[Vec<f64>]) -> Result<LineString<f64>, GeoJsonError> {
    if ring.len() < 3 {
        return Err(GeoJsonError::Coordinates {
            kind: "Polygon",
            message: format!("ring has {} positions, need at least 3", ring.len()),
        });
    }
    ring.iter()
        .map(|p| position_to_coord(p, "Polygon"))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::from)
}

/// Pull the timestamp text out of a `start`/`end` input.
pub fn timestamp_text(input: &Value) -> DrillResult<String> {
    match input {
        Value::Object(_) => timestamp_from_object(input),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Object(_)) => timestamp_from_object(&inner),
            _ => Ok(text.trim().to_string()),
        },
        other => Err(DrillError::invalid_input(
            "time",
            format!("expected a date-time, got {}", other),
        )),
    }
}

fn timestamp_from_object(value: &Value) -> DrillResult<String> {
    value
        .pointer("/properties/timestamp/date-time")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            DrillError::invalid_input("time", "missing properties.timestamp.date-time")
        })
}

/// Build the query time range from the optional `start`/`end` inputs.
/// Both or neither must be present.
pub fn parse_time_range(start: Option<&Value>, end: Option<&Value>) -> DrillResult<Option<TimeRange>> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = timestamp_text(start)?;
            let end = timestamp_text(end)?;
            TimeRange::parse(&start, &end)
                .map(Some)
                .map_err(|e| DrillError::invalid_input("time", e.to_string()))
        }
        (Some(_), None) => Err(DrillError::invalid_input("end", "start given without end")),
        (None, Some(_)) => Err(DrillError::invalid_input("start", "end given without start")),
    }
}

/// Body of an execute request: named inputs, values as free-form JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
}

impl ExecuteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn feature(&self) -> DrillResult<Feature> {
        let geometry = self
            .input("geometry")
            .ok_or_else(|| DrillError::InvalidGeometry("no features specified".to_string()))?;
        parse_feature(geometry)
    }

    pub fn time_range(&self) -> DrillResult<Option<TimeRange>> {
        parse_time_range(self.input("start"), self.input("end"))
    }

    /// Integer parameter; numeric strings are accepted.
    pub fn integer(&self, name: &str) -> DrillResult<Option<i64>> {
        let Some(value) = self.input(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Null => return Ok(None),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| DrillError::invalid_input(name, format!("expected an integer, got {}", value)))
    }

    /// Floating-point parameter; numeric strings are accepted.
    pub fn number(&self, name: &str) -> DrillResult<Option<f64>> {
        let Some(value) = self.input(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Null => return Ok(None),
            _ => None,
        };
        parsed
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| DrillError::invalid_input(name, format!("expected a number, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn collection(features: Value) -> Value {
        json!({ "type": "FeatureCollection", "features": features })
    }

    #[test]
    fn test_point_feature_defaults_to_crs84() {
        let input = collection(json!([{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [146.65, -35.9] }
        }]));
        let feature = parse_feature(&input).unwrap();
        assert_eq!(feature.crs, CrsCode::Epsg4326);
        assert_eq!(feature.kind(), GeometryKind::Point);
        assert_eq!(feature.geometry, geo::Geometry::Point(Point::new(146.65, -35.9)));
    }

    #[test]
    fn test_polygon_with_elevation_from_string() {
        let text = collection(json!([{
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0, 12.0], [1.0, 0.0, 12.0], [1.0, 1.0, 9.0], [0.0, 0.0, 12.0]]]
            }
        }]))
        .to_string();

        let feature = parse_feature(&Value::String(text)).unwrap();
        match feature.geometry {
            geo::Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 4);
                assert_eq!(p.exterior().0[2], Coord { x: 1.0, y: 1.0 });
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_feature_count_errors() {
        let err = parse_feature(&collection(json!([]))).unwrap_err();
        assert_eq!(err.to_string(), "no features specified");
        assert!(matches!(err, DrillError::InvalidGeometry(_)));

        let point = json!({ "type": "Feature", "geometry": { "type": "Point", "coordinates": [0, 0] } });
        let err = parse_feature(&collection(json!([point.clone(), point]))).unwrap_err();
        assert_eq!(err.to_string(), "multiple features specified");
    }

    #[test]
    fn test_crs_precedence() {
        let input = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:3577" } },
            "features": [{
                "type": "Feature",
                "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
                "geometry": { "type": "Point", "coordinates": [1500000.0, -3900000.0] }
            }]
        });
        assert_eq!(parse_feature(&input).unwrap().crs, CrsCode::Epsg3577);

        let input = collection(json!([{
            "type": "Feature",
            "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        }]));
        assert_eq!(parse_feature(&input).unwrap().crs, CrsCode::Epsg3857);
    }

    #[test]
    fn test_unsupported_geometry() {
        let input = collection(json!([{
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }
        }]));
        let err = parse_feature(&input).unwrap_err();
        assert!(err.to_string().contains("LineString"));
        assert!(parse_feature(&json!("not json")).is_err());
    }

    #[test]
    fn test_expect_kind() {
        let input = collection(json!([{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [0, 0] }
        }]));
        let feature = parse_feature(&input).unwrap();
        assert!(feature.clone().expect_kind(GeometryKind::Point).is_ok());
        assert!(matches!(
            feature.expect_kind(GeometryKind::Polygon),
            Err(DrillError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_timestamp_forms() {
        let object = json!({ "properties": { "timestamp": { "date-time": "2019-03-05" } } });
        assert_eq!(timestamp_text(&object).unwrap(), "2019-03-05");
        assert_eq!(timestamp_text(&Value::String(object.to_string())).unwrap(), "2019-03-05");
        assert_eq!(timestamp_text(&json!("2019-03-05T10:00:00Z")).unwrap(), "2019-03-05T10:00:00Z");
        assert!(timestamp_text(&json!({ "properties": {} })).is_err());
        assert!(timestamp_text(&json!(12)).is_err());
    }

    #[test]
    fn test_time_range_requires_both_bounds() {
        let start = json!("2019-03-05");
        let end = json!({ "properties": { "timestamp": { "date-time": "2019-07-10" } } });

        let range = parse_time_range(Some(&start), Some(&end)).unwrap().unwrap();
        assert_eq!(range.start.day(), 5);
        assert_eq!((range.end.month(), range.end.day(), range.end.hour()), (7, 10, 23));

        assert!(parse_time_range(None, None).unwrap().is_none());
        assert!(parse_time_range(Some(&start), None).is_err());
        assert!(parse_time_range(None, Some(&end)).is_err());
    }

    #[test]
    fn test_request_parameters() {
        let request = ExecuteRequest::new()
            .with_input("aggregate", json!(3))
            .with_input("threshold", json!("-350.5"))
            .with_input("bad", json!([1]));

        assert_eq!(request.integer("aggregate").unwrap(), Some(3));
        assert_eq!(request.integer("missing").unwrap(), None);
        assert_eq!(request.number("threshold").unwrap(), Some(-350.5));
        assert!(request.integer("bad").is_err());
        assert!(matches!(request.feature(), Err(DrillError::InvalidGeometry(_))));
    }
}
