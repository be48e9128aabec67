//! Common test fixtures for drill tests.
//!
//! Product definitions mirror the shape of the real archive products closely
//! enough that flag decoding, aliases and nodata handling are exercised the
//! same way.

use datacube::{DType, FlagsDefinition, GridSpec, Measurement, Product};
use drill_common::{Affine, CrsCode, GeoBox};

/// WOfS water observation flags.
pub const WOFS_FLAGS_YAML: &str = r#"
dry:
  bits: [7, 6, 5, 4, 3, 1, 0]
  values: {0: true}
  description: No water detected
nodata:
  bits: 0
  values: {0: false, 1: true}
  description: No data
noncontiguous:
  bits: 1
  values: {0: false, 1: true}
  description: At least one EO band is missing or saturated
sea:
  bits: 2
  values: {0: false, 1: true}
  description: Sea
terrain_or_low_angle:
  bits: 3
  values: {0: false, 1: true}
  description: Terrain shadow or low solar angle
high_slope:
  bits: 4
  values: {0: false, 1: true}
  description: High slope
cloud_shadow:
  bits: 5
  values: {0: false, 1: true}
  description: Cloud shadow
cloud:
  bits: 6
  values: {0: false, 1: true}
  description: Cloudy
wet:
  bits: [7, 6, 5, 4, 3, 1, 0]
  values: {128: true}
  description: Clear and Wet
"#;

/// Packed WOfS values used throughout the tests.
pub mod wofs {
    pub const DRY: f32 = 0.0;
    pub const NODATA: f32 = 1.0;
    pub const SEA: f32 = 4.0;
    pub const WET: f32 = 128.0;
    pub const WET_SEA: f32 = 132.0;
    pub const CLOUD: f32 = 64.0;
    pub const CLOUD_SHADOW: f32 = 32.0;
    pub const TERRAIN: f32 = 8.0;
}

/// Parsed WOfS flags definition.
pub fn wofs_flags() -> FlagsDefinition {
    serde_yaml::from_str(WOFS_FLAGS_YAML).expect("WOfS flags fixture is valid YAML")
}

/// Australian Albers 25 m grid spec used by the Landsat products.
pub fn albers_grid_spec() -> GridSpec {
    GridSpec {
        crs: CrsCode::Epsg3577,
        resolution: [-25.0, 25.0],
        origin: None,
    }
}

/// A `width` x `height` 25 m Albers grid with its upper-left corner at
/// (`x0`, `y0`).
pub fn albers_grid(x0: f64, y0: f64, width: usize, height: usize) -> GeoBox {
    GeoBox::new(CrsCode::Epsg3577, Affine::new(x0, y0, 25.0, -25.0), width, height)
}

/// Water observation feature layers.
pub fn wofs_product() -> Product {
    Product {
        name: "wofs_albers".into(),
        description: "Historic Flood Mapping Water Observation Feature Layers".into(),
        measurements: vec![Measurement::new("water", DType::Int16, Some(1.0)).with_flags(wofs_flags())],
        grid_spec: Some(albers_grid_spec()),
    }
}

/// Landsat fractional cover; lowercase aliases as used by WIT.
pub fn fc_product() -> Product {
    let band = |name: &str, alias: &str| {
        let mut m = Measurement::new(name, DType::Int8, Some(-1.0)).with_aliases(&[alias]);
        m.units = "percent".into();
        m
    };
    Product {
        name: "ls8_fc_albers".into(),
        description: "Landsat 8 Fractional Cover 25 metre, 100km tile, Australian Albers".into(),
        measurements: vec![
            band("BS", "bs"),
            band("PV", "pv"),
            band("NPV", "npv"),
            Measurement::new("UE", DType::Int8, Some(-1.0)),
        ],
        grid_spec: Some(albers_grid_spec()),
    }
}

/// Mangrove canopy cover classes (1 woodland, 2 open forest, 3 closed forest).
pub fn mangrove_product() -> Product {
    Product {
        name: "mangrove_cover".into(),
        description: "Mangrove canopy cover".into(),
        measurements: vec![
            Measurement::new("extent", DType::UInt8, Some(255.0)),
            Measurement::new("canopy_cover_class", DType::UInt8, Some(255.0)),
        ],
        grid_spec: Some(albers_grid_spec()),
    }
}

/// Tasseled cap wetness.
pub fn tcw_product() -> Product {
    Product {
        name: "ls8_nbart_tasseled_cap".into(),
        description: "Landsat 8 tasseled cap indices".into(),
        measurements: vec![Measurement::new("wetness", DType::Float32, Some(-999.0)).with_aliases(&["TCW"])],
        grid_spec: Some(albers_grid_spec()),
    }
}

/// Surface reflectance pixel quality bands.
pub fn nbart_quality_product() -> Product {
    Product {
        name: "ls8_nbart_albers".into(),
        description: "Landsat 8 NBART pixel quality".into(),
        measurements: vec![
            Measurement::new("fmask", DType::UInt8, Some(0.0)),
            Measurement::new("nbart_contiguity", DType::UInt8, Some(255.0)),
        ],
        grid_spec: Some(albers_grid_spec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wofs_flags_parse() {
        let flags = wofs_flags();
        assert_eq!(flags.active_flags(wofs::WET as u64), vec!["wet"]);
        assert_eq!(flags.active_flags(wofs::SEA as u64), vec!["dry", "sea"]);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(fc_product().measurement("pv").unwrap().name, "PV");
        assert_eq!(tcw_product().measurement("TCW").unwrap().name, "wetness");
    }
}
