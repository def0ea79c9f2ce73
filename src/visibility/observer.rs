//! Observer location, frame rotation and look angles

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::propagation::EARTH_RADIUS_KM;

/// Below this range (km) the target has no usable direction
const MIN_RANGE_KM: f64 = 1e-9;

/// Ground observer on a spherical Earth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverLocation {
    /// Geodetic latitude (degrees, north positive)
    pub latitude_deg: f64,
    /// Longitude (degrees, east positive)
    pub longitude_deg: f64,
    /// Altitude above the sphere (meters)
    #[serde(default)]
    pub altitude_m: f64,
}

impl ObserverLocation {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Earth-fixed position (km)
    pub fn ecef(&self) -> Vector3<f64> {
        let lat = self.latitude_deg.to_radians();
        let lon = self.longitude_deg.to_radians();
        let r = EARTH_RADIUS_KM + self.altitude_m / 1000.0;
        Vector3::new(
            r * lat.cos() * lon.cos(),
            r * lat.cos() * lon.sin(),
            r * lat.sin(),
        )
    }

    /// Inertial position at sidereal angle `gmst` (km)
    pub fn eci(&self, gmst: f64) -> Vector3<f64> {
        ecef_to_eci(&self.ecef(), gmst)
    }
}

/// Rotate an inertial vector into the earth-fixed frame
pub fn eci_to_ecef(v: &Vector3<f64>, gmst: f64) -> Vector3<f64> {
    let (s, c) = gmst.sin_cos();
    Vector3::new(v.x * c + v.y * s, -v.x * s + v.y * c, v.z)
}

/// Rotate an earth-fixed vector into the inertial frame
pub fn ecef_to_eci(v: &Vector3<f64>, gmst: f64) -> Vector3<f64> {
    let (s, c) = gmst.sin_cos();
    Vector3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

/// Observer-relative direction to a target
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookAngles {
    /// Degrees from north, clockwise, in `[0, 360)`
    pub azimuth: f64,
    /// Degrees above the horizon
    pub elevation: f64,
    pub range_km: f64,
}

/// Project an earth-fixed range vector onto the observer's East-North-Up axes
pub fn enu(range_ecef: &Vector3<f64>, observer: &ObserverLocation) -> Vector3<f64> {
    let (slat, clat) = observer.latitude_deg.to_radians().sin_cos();
    let (slon, clon) = observer.longitude_deg.to_radians().sin_cos();
    let r = range_ecef;

    Vector3::new(
        -slon * r.x + clon * r.y,
        -slat * clon * r.x - slat * slon * r.y + clat * r.z,
        clat * clon * r.x + clat * slon * r.y + slat * r.z,
    )
}

/// Azimuth, elevation and range of an inertial position.
///
/// A target exactly at the observer has no direction and reports an
/// elevation of -90°.
pub fn look_angles(position_eci: &Vector3<f64>, gmst: f64, observer: &ObserverLocation) -> LookAngles {
    let target = eci_to_ecef(position_eci, gmst);
    let range = target - observer.ecef();
    let range_km = range.norm();

    if range_km < MIN_RANGE_KM {
        return LookAngles {
            azimuth: 0.0,
            elevation: -90.0,
            range_km: 0.0,
        };
    }

    let local = enu(&range, observer);
    let azimuth = local.x.atan2(local.y).to_degrees().rem_euclid(360.0);
    let elevation = (local.z / range_km).clamp(-1.0, 1.0).asin().to_degrees();

    LookAngles {
        azimuth,
        elevation,
        range_km,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zenith_target() {
        let observer = ObserverLocation::new(0.0, 0.0, 0.0);
        let sat = Vector3::new(EARTH_RADIUS_KM + 500.0, 0.0, 0.0);
        let look = look_angles(&sat, 0.0, &observer);
        assert!((look.elevation - 90.0).abs() < 1e-4);
        assert!((look.range_km - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_cardinal_azimuths() {
        let observer = ObserverLocation::new(0.0, 0.0, 0.0);
        let base = EARTH_RADIUS_KM + 10.0;

        let north = look_angles(&Vector3::new(base, 0.0, 1000.0), 0.0, &observer);
        assert!(north.azimuth.abs() < 1e-9 || (north.azimuth - 360.0).abs() < 1e-9);

        let east = look_angles(&Vector3::new(base, 1000.0, 0.0), 0.0, &observer);
        assert!((east.azimuth - 90.0).abs() < 1e-9);

        let south = look_angles(&Vector3::new(base, 0.0, -1000.0), 0.0, &observer);
        assert!((south.azimuth - 180.0).abs() < 1e-9);

        let west = look_angles(&Vector3::new(base, -1000.0, 0.0), 0.0, &observer);
        assert!((west.azimuth - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_earth_rotation_moves_target() {
        let observer = ObserverLocation::new(0.0, 90.0, 0.0);
        let sat = Vector3::new(EARTH_RADIUS_KM + 500.0, 0.0, 0.0);
        // Observer at 90E sees the target overhead once the Earth has turned -90 deg
        let overhead = look_angles(&sat, -std::f64::consts::FRAC_PI_2, &observer);
        assert!((overhead.elevation - 90.0).abs() < 1e-4);
        let below = look_angles(&sat, 0.0, &observer);
        assert!(below.elevation < 0.0);
    }

    #[test]
    fn test_degenerate_range() {
        let observer = ObserverLocation::new(10.0, 20.0, 0.0);
        let look = look_angles(&observer.eci(1.3), 1.3, &observer);
        assert_eq!(look.elevation, -90.0);
    }

    #[test]
    fn test_frame_round_trip() {
        let v = Vector3::new(1000.0, -2000.0, 3000.0);
        let back = ecef_to_eci(&eci_to_ecef(&v, 2.1), 2.1);
        assert!((back - v).norm() < 1e-9);
    }
}
