//! Albers Equal-Area Conic projection on an ellipsoid.
//!
//! Used for the Australian continental grid (EPSG:3577, GDA94 / Australian
//! Albers) on which the Landsat-derived products are stored.
//!
//! The projection parameters include:
//! - Standard parallels: lat1 and lat2
//! - Latitude of origin (lat0) and central meridian (lon0)
//! - False easting / northing
//! - Ellipsoid semi-major axis and flattening
//!
//! Formulas follow Snyder, "Map Projections: A Working Manual", pp. 101-102.

use std::f64::consts::PI;

/// Iterations allowed for the inverse latitude solve.
const MAX_ITERATIONS: usize = 15;
const CONVERGENCE: f64 = 1e-12;

/// Albers Equal-Area Conic projection parameters.
#[derive(Debug, Clone)]
pub struct AlbersEqualArea {
    /// Central meridian in radians
    pub lon0: f64,
    /// False easting (metres)
    pub false_easting: f64,
    /// False northing (metres)
    pub false_northing: f64,
    /// Semi-major axis (metres)
    pub a: f64,
    /// First eccentricity
    e: f64,
    /// Eccentricity squared
    e2: f64,
    /// Cone constant
    n: f64,
    /// Snyder's C
    c: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl AlbersEqualArea {
    /// Create a projection from parameters in degrees.
    ///
    /// # Arguments
    /// * `lat1_deg`, `lat2_deg` - Standard parallels
    /// * `lat0_deg` - Latitude of origin
    /// * `lon0_deg` - Central meridian
    /// * `false_easting`, `false_northing` - Offsets in metres
    /// * `a` - Ellipsoid semi-major axis (metres)
    /// * `inv_f` - Inverse flattening
    pub fn new(
        lat1_deg: f64,
        lat2_deg: f64,
        lat0_deg: f64,
        lon0_deg: f64,
        false_easting: f64,
        false_northing: f64,
        a: f64,
        inv_f: f64,
    ) -> Self {
        let to_rad = PI / 180.0;
        let f = 1.0 / inv_f;
        let e2 = 2.0 * f - f * f;
        let e = e2.sqrt();

        let lat1 = lat1_deg * to_rad;
        let lat2 = lat2_deg * to_rad;
        let lat0 = lat0_deg * to_rad;

        let m1 = m(lat1, e2);
        let m2 = m(lat2, e2);
        let q1 = q(lat1, e, e2);
        let q2 = q(lat2, e, e2);
        let q0 = q(lat0, e, e2);

        let n = if (lat1 - lat2).abs() < 1e-10 {
            // Single standard parallel
            lat1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).sqrt() / n;

        Self {
            lon0: lon0_deg * to_rad,
            false_easting,
            false_northing,
            a,
            e,
            e2,
            n,
            c,
            rho0,
        }
    }

    /// GDA94 / Australian Albers (EPSG:3577).
    ///
    /// - Standard parallels: 18°S and 36°S
    /// - Origin: 0°, 132°E
    /// - Ellipsoid: GRS80
    pub fn australian_albers() -> Self {
        Self::new(-18.0, -36.0, 0.0, 132.0, 0.0, 0.0, 6378137.0, 298.257222101)
    }

    /// Project geographic coordinates (degrees) to easting/northing (metres).
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;

        let dlon = normalize_angle(lon_deg * to_rad - self.lon0);

        let q = q(lat, self.e, self.e2);
        let rho = self.a * (self.c - self.n * q).max(0.0).sqrt() / self.n;
        let theta = self.n * dlon;

        let x = self.false_easting + rho * theta.sin();
        let y = self.false_northing + self.rho0 - rho * theta.cos();
        (x, y)
    }

    /// Unproject easting/northing (metres) to geographic degrees (lon, lat).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let x = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);

        // With a negative cone constant rho and theta flip sign.
        let sign = self.n.signum();
        let rho = sign * (x * x + dy * dy).sqrt();
        let theta = (sign * x).atan2(sign * dy);

        let q = (self.c - rho * rho * self.n * self.n / (self.a * self.a)) / self.n;
        let lat = self.latitude_from_q(q);
        let lon = self.lon0 + theta / self.n;

        (normalize_angle(lon) * to_deg, lat * to_deg)
    }

    /// Iteratively solve q(lat) = q for lat.
    fn latitude_from_q(&self, q: f64) -> f64 {
        let mut lat = (q / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..MAX_ITERATIONS {
            let sin_lat = lat.sin();
            let es = 1.0 - self.e2 * sin_lat * sin_lat;
            let delta = es * es / (2.0 * lat.cos())
                * (q / (1.0 - self.e2) - sin_lat / es
                    + (1.0 / (2.0 * self.e)) * ((1.0 - self.e * sin_lat) / (1.0 + self.e * sin_lat)).ln());
            lat += delta;
            if delta.abs() < CONVERGENCE {
                break;
            }
        }
        lat
    }
}

fn m(lat: f64, e2: f64) -> f64 {
    let s = lat.sin();
    lat.cos() / (1.0 - e2 * s * s).sqrt()
}

fn q(lat: f64, e: f64, e2: f64) -> f64 {
    let s = lat.sin();
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}

/// Normalize an angle to [-π, π].
fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(132.0, 0.0);
        assert!(x.abs() < 1e-6, "x should be 0, got {}", x);
        assert!(y.abs() < 1e-6, "y should be 0, got {}", y);
    }

    #[test]
    fn test_canberra_reference_point() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(149.13, -35.28);
        assert!((x - 1_550_570.62).abs() < 1.0, "easting off: {}", x);
        assert!((y + 3_957_368.59).abs() < 1.0, "northing off: {}", y);
    }

    #[test]
    fn test_roundtrip() {
        let proj = AlbersEqualArea::australian_albers();
        for &(lon, lat) in &[(146.65, -35.9), (113.5, -22.0), (153.6, -10.7), (132.0, -43.5)] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y);
            assert!((lon - lon2).abs() < 1e-8, "lon roundtrip failed: {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-8, "lat roundtrip failed: {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_northing_decreases_southward() {
        let proj = AlbersEqualArea::australian_albers();
        let (_, north) = proj.forward(140.0, -20.0);
        let (_, south) = proj.forward(140.0, -30.0);
        assert!(south < north);
    }
}
