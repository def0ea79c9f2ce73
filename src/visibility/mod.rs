//! Observer-relative geometry
//!
//! Pure, stateless functions shared by live tracking and pass prediction:
//! look angles, Earth and Moon shadow tests, apparent brightness and
//! Doppler. Inputs are inertial-frame vectors in km unless noted otherwise.

mod doppler;
mod eclipse;
mod ephemeris;
mod magnitude;
mod observer;

pub use doppler::*;
pub use eclipse::*;
pub use ephemeris::*;
pub use magnitude::*;
pub use observer::*;

use nalgebra::Vector3;

/// Angle between two vectors in radians, `0` if either is degenerate
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom <= 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}
