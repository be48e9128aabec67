//! Product, measurement and dataset metadata.
//!
//! These mirror the documents held in the data-cube index: a product names
//! its measurements (bands) and optional storage grid, and each dataset is
//! one acquisition of a product at a single time on its own grid.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use drill_common::{BoundingBox, CrsCode, GeoBox};
use projection::Reprojector;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{CubeError, CubeResult};

/// Storage data type of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DType {
    /// Bytes per element.
    pub fn itemsize(&self) -> usize {
        match self {
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Float64 => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, DType::Float32 | DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int8 => "int8",
            DType::UInt8 => "uint8",
            DType::Int16 => "int16",
            DType::UInt16 => "uint16",
            DType::Int32 => "int32",
            DType::UInt32 => "uint32",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Meaning attached to one value of a flag field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// Python-style truthiness: a flag is "set" when its decoded value is.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Text(s) => !s.is_empty(),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Text(value.to_string())
    }
}

/// Bit positions occupied by a flag: one bit or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagBits {
    Single(u32),
    Multi(Vec<u32>),
}

impl FlagBits {
    pub fn bits(&self) -> &[u32] {
        match self {
            FlagBits::Single(bit) => std::slice::from_ref(bit),
            FlagBits::Multi(bits) => bits,
        }
    }
}

/// One named field of a bit-flag measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub bits: FlagBits,
    #[serde(deserialize_with = "deserialize_flag_values")]
    pub values: BTreeMap<u64, FlagValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FlagDefinition {
    /// Bitmask covering every bit of the field.
    pub fn mask(&self) -> u64 {
        self.bits
            .bits()
            .iter()
            .filter(|&&b| b < 64)
            .fold(0u64, |mask, &b| mask | (1u64 << b))
    }

    /// Position of the lowest bit of the field.
    pub fn shift(&self) -> u32 {
        self.bits.bits().iter().copied().min().unwrap_or(0)
    }

    /// Raw field value extracted from a pixel value.
    pub fn field_value(&self, value: u64) -> u64 {
        (value & self.mask()) >> self.shift()
    }

    /// Decoded meaning of the field for a pixel value, if the value is listed.
    pub fn decode(&self, value: u64) -> Option<&FlagValue> {
        self.values.get(&self.field_value(value))
    }

    /// Whether the field's decoded value is truthy for this pixel value.
    pub fn is_set(&self, value: u64) -> bool {
        self.decode(value).is_some_and(FlagValue::is_truthy)
    }

    /// Raw field value whose meaning is `wanted`.
    pub fn key_for(&self, wanted: &FlagValue) -> Option<u64> {
        self.values
            .iter()
            .find(|(_, v)| *v == wanted)
            .map(|(k, _)| *k)
    }
}

/// Flag definitions of a bit-flag measurement, by flag name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagsDefinition(pub BTreeMap<String, FlagDefinition>);

impl FlagsDefinition {
    pub fn get(&self, flag: &str) -> Option<&FlagDefinition> {
        self.0.get(flag)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Decode every flag whose field value is listed in its definition.
    pub fn decode(&self, value: u64) -> BTreeMap<&str, &FlagValue> {
        self.0
            .iter()
            .filter_map(|(name, def)| def.decode(value).map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Names of the flags that are set in `value`.
    pub fn active_flags(&self, value: u64) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, def)| def.is_set(value))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Build a mask/expected-value pair that selects pixels where every named
    /// flag has the given meaning.
    pub fn condition<'a, I>(&self, wanted: I) -> CubeResult<FlagCondition>
    where
        I: IntoIterator<Item = (&'a str, FlagValue)>,
    {
        let mut condition = FlagCondition::default();

        for (flag, value) in wanted {
            let def = self
                .get(flag)
                .ok_or_else(|| CubeError::InvalidQuery(format!("unknown flag '{}'", flag)))?;
            let key = def.key_for(&value).ok_or_else(|| {
                CubeError::InvalidQuery(format!("flag '{}' has no value {:?}", flag, value))
            })?;

            let mask = def.mask();
            let expected = (key << def.shift()) & mask;
            let overlap = condition.mask & mask;
            if condition.expected & overlap != expected & overlap {
                return Err(CubeError::InvalidQuery(format!(
                    "flag '{}' conflicts with an earlier condition",
                    flag
                )));
            }
            condition.mask |= mask;
            condition.expected |= expected;
        }

        Ok(condition)
    }
}

/// `(value & mask) == expected` test over raw flag values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagCondition {
    pub mask: u64,
    pub expected: u64,
}

impl FlagCondition {
    pub fn matches(&self, value: u64) -> bool {
        value & self.mask == self.expected
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagKey {
    Int(u64),
    Text(String),
}

/// Flag value tables are keyed by integers in YAML but by strings in JSON.
fn deserialize_flag_values<'de, D>(deserializer: D) -> Result<BTreeMap<u64, FlagValue>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ValuesVisitor;

    impl<'de> Visitor<'de> for ValuesVisitor {
        type Value = BTreeMap<u64, FlagValue>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of integer field values to meanings")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut values = BTreeMap::new();
            while let Some((key, value)) = map.next_entry::<FlagKey, FlagValue>()? {
                let key = match key {
                    FlagKey::Int(k) => k,
                    FlagKey::Text(s) => s.trim().parse().map_err(|_| {
                        de::Error::custom(format!("flag value key '{}' is not an integer", s))
                    })?,
                };
                values.insert(key, value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_map(ValuesVisitor)
}

/// A band of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub dtype: DType,
    #[serde(default)]
    pub nodata: Option<f64>,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags_definition: Option<FlagsDefinition>,
}

fn default_units() -> String {
    "1".to_string()
}

impl Measurement {
    pub fn new(name: impl Into<String>, dtype: DType, nodata: Option<f64>) -> Self {
        Self {
            name: name.into(),
            dtype,
            nodata,
            units: default_units(),
            aliases: Vec::new(),
            flags_definition: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_flags(mut self, flags: FlagsDefinition) -> Self {
        self.flags_definition = Some(flags);
        self
    }

    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Native storage grid of a product: CRS, resolution `[y, x]` and origin `[y, x]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: CrsCode,
    pub resolution: [f64; 2],
    #[serde(default)]
    pub origin: Option<[f64; 2]>,
}

impl GridSpec {
    /// Grid alignment offset (x, y) implied by the origin.
    pub fn alignment(&self) -> (f64, f64) {
        match self.origin {
            Some([oy, ox]) => (
                ox.rem_euclid(self.resolution[1].abs()),
                oy.rem_euclid(self.resolution[0].abs()),
            ),
            None => (0.0, 0.0),
        }
    }
}

/// An indexed product definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub grid_spec: Option<GridSpec>,
}

impl Product {
    /// Find a measurement by name or alias.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.measurements.iter().find(|m| m.answers_to(name)))
    }

    /// Resolve requested band names (or every band when `None`) to
    /// `(output name, measurement)` pairs. Bands requested by alias keep
    /// the alias as their output name.
    pub fn resolve_measurements(
        &self,
        requested: Option<&[String]>,
    ) -> CubeResult<Vec<(String, Measurement)>> {
        match requested {
            None => Ok(self
                .measurements
                .iter()
                .map(|m| (m.name.clone(), m.clone()))
                .collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.measurement(name)
                        .map(|m| (name.clone(), m.clone()))
                        .ok_or_else(|| CubeError::MeasurementNotFound {
                            product: self.name.clone(),
                            measurement: name.clone(),
                        })
                })
                .collect(),
        }
    }
}

/// One indexed acquisition of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub product: String,
    pub time: DateTime<Utc>,
    /// Native grid of the stored rasters.
    pub grid: GeoBox,
    /// Object key of each band, by measurement name.
    pub bands: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new(product: impl Into<String>, time: DateTime<Utc>, grid: GeoBox) -> Self {
        Self {
            id: Uuid::new_v4(),
            product: product.into(),
            time,
            grid,
            bands: BTreeMap::new(),
        }
    }

    pub fn with_band(mut self, measurement: impl Into<String>, key: impl Into<String>) -> Self {
        self.bands.insert(measurement.into(), key.into());
        self
    }

    /// Footprint in the dataset's own CRS.
    pub fn extent(&self) -> BoundingBox {
        self.grid.extent()
    }

    /// Footprint reprojected to `crs`.
    pub fn extent_in(&self, crs: CrsCode) -> BoundingBox {
        Reprojector::new(self.grid.crs, crs).transform_bbox(&self.extent())
    }

    /// Longitude of the footprint centre, used for solar-day grouping.
    pub fn center_longitude(&self) -> f64 {
        let (x, y) = self.extent().center();
        Reprojector::new(self.grid.crs, CrsCode::Epsg4326).transform(x, y).0
    }
}
