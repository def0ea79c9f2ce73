//! Apparent brightness estimation
//!
//! Diffuse (Lambertian) sphere model: standard magnitude at 1000 km and 90°
//! phase, corrected for range, phase and atmospheric extinction. Accurate to
//! one or two magnitudes at best.

use std::f64::consts::PI;

use nalgebra::Vector3;

use super::angle_between;

/// Range at which the standard magnitude is defined (km)
pub const STANDARD_RANGE_KM: f64 = 1000.0;

/// Extinction per airmass (magnitudes, V band)
pub const EXTINCTION_PER_AIRMASS: f64 = 0.2;

/// Dimming applied when the phase function vanishes (fully unlit side)
pub const INVISIBLE_PENALTY_MAG: f64 = 10.0;

/// Naked-eye limiting magnitude used by the bright-pass filter
pub const NAKED_EYE_LIMIT_MAG: f64 = 5.0;

/// Angle at the satellite between the Sun and the observer (radians)
pub fn phase_angle(
    satellite: &Vector3<f64>,
    sun: &Vector3<f64>,
    observer: &Vector3<f64>,
) -> f64 {
    angle_between(&(sun - satellite), &(observer - satellite))
}

/// Angle at the observer between the Sun and the satellite (radians)
pub fn solar_elongation(
    observer: &Vector3<f64>,
    satellite: &Vector3<f64>,
    sun: &Vector3<f64>,
) -> f64 {
    angle_between(&(sun - observer), &(satellite - observer))
}

/// Lambertian sphere phase function `(sin φ + (π − φ) cos φ) / π`
pub fn phase_function(phase: f64) -> f64 {
    let phase = phase.clamp(0.0, PI);
    ((phase.sin() + (PI - phase) * phase.cos()) / PI).max(0.0)
}

/// Kasten-Young relative airmass for an elevation in degrees.
///
/// Elevations below the horizon are clamped to 0°.
pub fn airmass(elevation_deg: f64) -> f64 {
    let h = elevation_deg.clamp(0.0, 90.0);
    1.0 / (h.to_radians().sin() + 0.50572 * (h + 6.07995).powf(-1.6364))
}

/// Estimated visual magnitude of a sunlit satellite.
///
/// `phase` in radians, `elevation_deg` of the satellite as seen by the
/// observer.
pub fn apparent_magnitude(
    standard_magnitude: f64,
    range_km: f64,
    phase: f64,
    elevation_deg: f64,
) -> f64 {
    let range_term = 5.0 * (range_km.max(1e-3) / STANDARD_RANGE_KM).log10();

    let f = phase_function(phase);
    let phase_term = if f <= 1e-12 {
        INVISIBLE_PENALTY_MAG
    } else {
        -2.5 * (f / phase_function(PI / 2.0)).log10()
    };

    standard_magnitude + range_term + phase_term + EXTINCTION_PER_AIRMASS * airmass(elevation_deg)
}
