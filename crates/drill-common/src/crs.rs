//! Coordinate Reference System identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Default CRS for GeoJSON input (lon/lat on WGS84).
pub const CRS84_URN: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// CRS codes understood by the drill services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrsCode {
    /// WGS84 geographic, x = longitude, y = latitude (CRS84 and EPSG:4326).
    Epsg4326,
    /// GDA94 / Australian Albers (metres).
    Epsg3577,
    /// Web Mercator (metres).
    Epsg3857,
}

impl CrsCode {
    /// Parse a CRS name as found in GeoJSON `crs.properties.name`,
    /// product grid specs or query overrides.
    ///
    /// Accepts formats like:
    /// - "EPSG:3577", "epsg:4326"
    /// - "urn:ogc:def:crs:OGC:1.3:CRS84", "CRS:84", "OGC:CRS84"
    /// - "urn:ogc:def:crs:EPSG::3577"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        let code = match normalized.as_str() {
            "URN:OGC:DEF:CRS:OGC:1.3:CRS84" | "URN:OGC:DEF:CRS:OGC::CRS84" | "CRS:84"
            | "CRS84" | "OGC:CRS84" | "WGS84" => return Ok(CrsCode::Epsg4326),
            other => other
                .strip_prefix("URN:OGC:DEF:CRS:EPSG::")
                .or_else(|| other.strip_prefix("URN:OGC:DEF:CRS:EPSG:"))
                .or_else(|| other.strip_prefix("EPSG:"))
                .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))?,
        };

        match code {
            "4326" => Ok(CrsCode::Epsg4326),
            "3577" => Ok(CrsCode::Epsg3577),
            "3857" | "900913" => Ok(CrsCode::Epsg3857),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// EPSG numeric code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3577 => 3577,
            CrsCode::Epsg3857 => 3857,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl Default for CrsCode {
    fn default() -> Self {
        CrsCode::Epsg4326
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CrsCode::parse(s)
    }
}

impl Serialize for CrsCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CrsCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CrsCode::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
