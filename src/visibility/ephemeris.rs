//! Low-precision Sun and Moon positions
//!
//! Wraps satkit's analytical ephemerides. Positions come back in GCRF metres;
//! the sub-degree offset to the TEME frame SGP4 produces is ignored, which is
//! well inside the tolerance of the shadow and brightness models.

use nalgebra::Vector3;
use satkit::lpephem;

use super::observer::{look_angles, ObserverLocation};
use crate::time::Epoch;

/// Geocentric Sun position (km), `None` if the epoch is outside satkit's range
pub fn sun_position_km(epoch: Epoch) -> Option<Vector3<f64>> {
    let instant = epoch.to_instant()?;
    let sun = lpephem::sun::pos_gcrf(&instant);
    Some(Vector3::new(sun[0], sun[1], sun[2]) / 1000.0)
}

/// Geocentric Moon position (km)
pub fn moon_position_km(epoch: Epoch) -> Option<Vector3<f64>> {
    let instant = epoch.to_instant()?;
    let moon = lpephem::moon::pos_gcrf(&instant);
    Some(Vector3::new(moon[0], moon[1], moon[2]) / 1000.0)
}

/// Elevation of the Sun above the observer's horizon (degrees)
pub fn sun_altitude(sun: &Vector3<f64>, gmst: f64, observer: &ObserverLocation) -> f64 {
    look_angles(sun, gmst, observer).elevation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sun_distance() {
        let epoch = Epoch::new(2024, 172.5);
        let sun = sun_position_km(epoch).unwrap();
        let au = 149_597_870.7;
        assert!((sun.norm() / au - 1.0).abs() < 0.02);
        // Near the June solstice the Sun sits ~23.4 deg north
        let declination = (sun.z / sun.norm()).asin().to_degrees();
        assert!((declination - 23.4).abs() < 1.0);
    }

    #[test]
    fn test_moon_distance() {
        let moon = moon_position_km(Epoch::new(2024, 100.0)).unwrap();
        assert!(moon.norm() > 350_000.0 && moon.norm() < 410_000.0);
    }

    #[test]
    fn test_sun_altitude_day_and_night() {
        // Greenwich at noon and midnight UTC around the equinox
        let observer = ObserverLocation::new(0.0, 0.0, 0.0);
        let noon = Epoch::new(2024, 80.5);
        let sun = sun_position_km(noon).unwrap();
        assert!(sun_altitude(&sun, noon.gmst(), &observer) > 60.0);

        let midnight = Epoch::new(2024, 81.0);
        let sun = sun_position_km(midnight).unwrap();
        assert!(sun_altitude(&sun, midnight.gmst(), &observer) < -60.0);
    }
}
