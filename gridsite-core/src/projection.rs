//! Lambert Conformal Conic projection on a sphere.
//!
//! Matches PROJ's `+proj=lcc +ellps=sphere +x_0=0 +y_0=0` forward and inverse
//! transforms. The wind toolkit grid is laid out in this projection with a
//! fixed 2 km spacing, which is what makes closed-form index lookup possible.

use crate::{LatLon, ProjectedPoint};
use std::f64::consts::FRAC_PI_4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sphere radius used by PROJ for `ellps=sphere` (meters).
pub const SPHERE_RADIUS_M: f64 = 6_370_997.0;

/// Origin latitude of the wind toolkit CONUS grid (degrees).
pub const WIND_TOOLKIT_LAT_0: f64 = 38.472_404_224_904_22;

/// Spherical Lambert Conformal Conic projection.
///
/// Serializes as its five defining parameters; the derived constants are
/// recomputed on deserialization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(from = "LccParams", into = "LccParams")
)]
pub struct LambertConformal {
    /// First standard parallel (degrees).
    pub lat_1: f64,
    /// Second standard parallel (degrees).
    pub lat_2: f64,
    /// Latitude of origin (degrees).
    pub lat_0: f64,
    /// Central meridian (degrees).
    pub lon_0: f64,
    /// Sphere radius (meters).
    pub radius: f64,
    /// Cone constant.
    n: f64,
    /// Scaled F constant (radius * F).
    rf: f64,
    /// Radius of the parallel of origin.
    rho0: f64,
}

impl LambertConformal {
    /// Builds a projection from standard parallels, origin and sphere radius.
    #[must_use]
    pub fn new(lat_1: f64, lat_2: f64, lat_0: f64, lon_0: f64, radius: f64) -> Self {
        let phi1 = lat_1.to_radians();
        let phi2 = lat_2.to_radians();
        let phi0 = lat_0.to_radians();

        let n = if (phi1 - phi2).abs() < 1e-10 {
            // Tangent cone
            phi1.sin()
        } else {
            (phi1.cos() / phi2.cos()).ln() / (half_colat_tan(phi2) / half_colat_tan(phi1)).ln()
        };
        let rf = radius * phi1.cos() * half_colat_tan(phi1).powf(n) / n;
        let rho0 = rf / half_colat_tan(phi0).powf(n);

        Self {
            lat_1,
            lat_2,
            lat_0,
            lon_0,
            radius,
            n,
            rf,
            rho0,
        }
    }

    /// Projection of the wind toolkit CONUS grid.
    ///
    /// `+proj=lcc +lat_1=30 +lat_2=60 +lat_0=38.47240422490422 +lon_0=-96.0
    /// +x_0=0 +y_0=0 +ellps=sphere +units=m`
    #[must_use]
    pub fn wind_toolkit() -> Self {
        Self::new(30.0, 60.0, WIND_TOOLKIT_LAT_0, -96.0, SPHERE_RADIUS_M)
    }

    /// Cone constant `n`.
    #[must_use]
    pub fn cone_constant(&self) -> f64 {
        self.n
    }

    /// Geographic to projected coordinates (meters).
    #[must_use]
    pub fn project(&self, point: LatLon) -> ProjectedPoint {
        let phi = point.lat.to_radians();
        let theta = self.n * normalize_lon(point.lon - self.lon_0).to_radians();
        let rho = self.rf / half_colat_tan(phi).powf(self.n);

        ProjectedPoint {
            x: rho * theta.sin(),
            y: self.rho0 - rho * theta.cos(),
        }
    }

    /// Projected to geographic coordinates.
    #[must_use]
    pub fn unproject(&self, point: ProjectedPoint) -> LatLon {
        let dy = self.rho0 - point.y;
        let sign = self.n.signum();
        let rho = sign * point.x.hypot(dy);
        let theta = (sign * point.x).atan2(sign * dy);

        let lat = if rho == 0.0 {
            90.0 * sign
        } else {
            (2.0 * (self.rf / rho).powf(1.0 / self.n).atan() - std::f64::consts::FRAC_PI_2)
                .to_degrees()
        };
        let lon = normalize_lon((theta / self.n).to_degrees() + self.lon_0);

        LatLon { lat, lon }
    }
}

impl Default for LambertConformal {
    fn default() -> Self {
        Self::wind_toolkit()
    }
}

#[cfg(feature = "serde")]
#[derive(Clone, Copy, Serialize, Deserialize)]
struct LccParams {
    lat_1: f64,
    lat_2: f64,
    lat_0: f64,
    lon_0: f64,
    radius: f64,
}

#[cfg(feature = "serde")]
impl From<LccParams> for LambertConformal {
    fn from(p: LccParams) -> Self {
        Self::new(p.lat_1, p.lat_2, p.lat_0, p.lon_0, p.radius)
    }
}

#[cfg(feature = "serde")]
impl From<LambertConformal> for LccParams {
    fn from(p: LambertConformal) -> Self {
        Self {
            lat_1: p.lat_1,
            lat_2: p.lat_2,
            lat_0: p.lat_0,
            lon_0: p.lon_0,
            radius: p.radius,
        }
    }
}

fn half_colat_tan(phi: f64) -> f64 {
    (FRAC_PI_4 + phi / 2.0).tan()
}

/// Wraps a longitude difference into [-180, 180). Non-finite input stays
/// non-finite.
fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_origin_projects_to_zero() {
        let proj = LambertConformal::wind_toolkit();
        let p = proj.project(LatLon::new(WIND_TOOLKIT_LAT_0, -96.0));
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        let proj = LambertConformal::wind_toolkit();
        for &(lat, lon) in &[(39.74, -105.17), (25.0, -80.0), (48.5, -122.3), (30.0, -96.0)] {
            let back = proj.unproject(proj.project(LatLon::new(lat, lon)));
            assert_abs_diff_eq!(back.lat, lat, epsilon = 1e-9);
            assert_abs_diff_eq!(back.lon, lon, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_east_is_positive_x_north_is_positive_y() {
        let proj = LambertConformal::wind_toolkit();
        let center = proj.project(LatLon::new(38.0, -96.0));
        let east = proj.project(LatLon::new(38.0, -95.0));
        let north = proj.project(LatLon::new(39.0, -96.0));
        assert!(east.x > center.x);
        assert!(north.y > center.y);
    }

    #[test]
    fn test_cone_constant_secant() {
        // Snyder: n for 30/60 secant cone is ~0.7155
        let proj = LambertConformal::wind_toolkit();
        assert_abs_diff_eq!(proj.cone_constant(), 0.715_566_9, epsilon = 1e-6);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_carries_only_parameters() {
        let json = serde_json::to_value(LambertConformal::wind_toolkit()).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 5);
        assert!(!keys.contains(&"n") && !keys.contains(&"rho0"));

        let raw = r#"{"lat_1": 33.0, "lat_2": 45.0, "lat_0": 23.0, "lon_0": -96.0,
            "radius": 6370997.0, "n": 0.1, "rf": 1.0, "rho0": 2.0}"#;
        let proj: LambertConformal = serde_json::from_str(raw).unwrap();
        assert_eq!(
            proj,
            LambertConformal::new(33.0, 45.0, 23.0, -96.0, SPHERE_RADIUS_M)
        );
    }

    #[test]
    fn test_normalize_lon() {
        assert_abs_diff_eq!(normalize_lon(270.0), -90.0);
        assert_abs_diff_eq!(normalize_lon(-200.0), 160.0);
        assert_abs_diff_eq!(normalize_lon(-96.0), -96.0);
        assert_abs_diff_eq!(normalize_lon(360.0 * 1e9 + 90.0), 90.0, epsilon = 1e-3);
        assert!(normalize_lon(f64::INFINITY).is_nan());
    }
}
