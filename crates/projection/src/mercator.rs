//! Spherical (Web) Mercator projection, EPSG:3857.

use std::f64::consts::PI;

/// Web Mercator sphere radius (WGS84 semi-major axis).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude limit at which the projected square closes (about 85.05°).
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spherical Mercator as used by web map tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Project lon/lat degrees to metres. Latitudes are clamped to the
    /// projection's valid band.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = EARTH_RADIUS * lon_deg.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
        (x, y)
    }

    /// Unproject metres to lon/lat degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}
