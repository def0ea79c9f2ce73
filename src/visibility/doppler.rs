//! Range rate and Doppler shift
//!
//! Classical (non-relativistic) Doppler; the relativistic term is far below
//! anything measurable at orbital velocities.

use nalgebra::Vector3;

use super::observer::{eci_to_ecef, ObserverLocation};
use crate::propagation::{StateVector, OMEGA_EARTH};

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// Rate of change of observer-to-satellite range (km/s, positive receding).
pub fn range_rate(state: &StateVector, gmst: f64, observer: &ObserverLocation) -> f64 {
    let position = eci_to_ecef(&state.position, gmst);
    let omega = Vector3::new(0.0, 0.0, OMEGA_EARTH);
    let velocity = eci_to_ecef(&state.velocity, gmst) - omega.cross(&position);

    match (position - observer.ecef()).try_normalize(0.0) {
        Some(line_of_sight) => velocity.dot(&line_of_sight),
        None => 0.0,
    }
}

/// Received frequency for a transmitter at `frequency_hz` moving with
/// `range_rate_km_s` along the line of sight.
pub fn doppler_shift(frequency_hz: f64, range_rate_km_s: f64) -> f64 {
    frequency_hz * SPEED_OF_LIGHT_KM_S / (SPEED_OF_LIGHT_KM_S + range_rate_km_s)
}
