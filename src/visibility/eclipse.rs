//! Cylindrical shadow models for the Earth and the Moon

use nalgebra::Vector3;

use super::angle_between;
use crate::propagation::EARTH_RADIUS_KM;

/// Mean lunar radius (km)
pub const MOON_RADIUS_KM: f64 = 1737.4;

/// Sun-Moon separation seen from the geocentre below which a lunar shadow
/// can reach near-Earth objects (degrees). Covers geostationary altitude.
pub const MOON_ALIGNMENT_DEG: f64 = 7.0;

/// Default width of the shadow-factor ramp at the cylinder edge (km)
pub const DEFAULT_PENUMBRA_KM: f64 = 100.0;

/// Perpendicular distance from `point` to the shadow axis cast by a body at
/// `occluder` away from the Sun, or `None` when `point` is on the sunward side.
fn shadow_axis_distance(
    point: &Vector3<f64>,
    occluder: &Vector3<f64>,
    sun: &Vector3<f64>,
) -> Option<f64> {
    let sun_dir = (sun - occluder).try_normalize(0.0)?;
    let relative = point - occluder;

    // Projection of the object onto the sun direction
    let proj = relative.dot(&sun_dir);
    if proj > 0.0 {
        return None;
    }

    Some((relative - proj * sun_dir).norm())
}

/// Simple cylindrical Earth-shadow check.
///
/// `satellite` and `sun` are geocentric inertial positions (km).
pub fn is_eclipsed(satellite: &Vector3<f64>, sun: &Vector3<f64>) -> bool {
    match shadow_axis_distance(satellite, &Vector3::zeros(), sun) {
        Some(distance) => distance < EARTH_RADIUS_KM,
        None => false,
    }
}

/// Continuous illumination factor (0 = full shadow, 1 = full sunlight).
///
/// Ramps linearly across a band of width `penumbra_km` centred on the
/// shadow cylinder's edge, so `factor < 0.5` agrees with [`is_eclipsed`].
pub fn shadow_factor(satellite: &Vector3<f64>, sun: &Vector3<f64>, penumbra_km: f64) -> f64 {
    let Some(distance) = shadow_axis_distance(satellite, &Vector3::zeros(), sun) else {
        return 1.0;
    };
    if penumbra_km <= 0.0 {
        return if distance < EARTH_RADIUS_KM { 0.0 } else { 1.0 };
    }

    let inner = EARTH_RADIUS_KM - penumbra_km / 2.0;
    ((distance - inner) / penumbra_km).clamp(0.0, 1.0)
}

/// Whether the Sun and Moon are close enough in the sky for a lunar shadow
/// to matter
pub fn moon_sun_aligned(sun: &Vector3<f64>, moon: &Vector3<f64>) -> bool {
    angle_between(sun, moon).to_degrees() < MOON_ALIGNMENT_DEG
}

/// Cylindrical Moon-shadow (solar eclipse) check.
///
/// Only evaluates the cylinder test when the Sun and Moon are roughly
/// aligned as seen from the geocentre.
pub fn is_moon_eclipsed(satellite: &Vector3<f64>, sun: &Vector3<f64>, moon: &Vector3<f64>) -> bool {
    if !moon_sun_aligned(sun, moon) {
        return false;
    }
    match shadow_axis_distance(satellite, moon, sun) {
        Some(distance) => distance < MOON_RADIUS_KM,
        None => false,
    }
}
