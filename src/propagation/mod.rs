//! Orbital propagation module
//!
//! This module provides two interchangeable ways of evaluating an object's
//! position:
//!
//! ## SGP4 Propagation (High fidelity)
//!
//! Each [`OrbitalObject`] carries a [`HighFidelityModel`] handle. The default
//! implementation wraps the SGP4 propagator from satkit and is used for pass
//! prediction, where precision matters.
//!
//! ## Analytic Keplerian Propagation (Fast)
//!
//! A two-body ellipse whose orientation drifts with the J2 secular rates and
//! whose mean anomaly follows the mean-motion decay term. Cheap enough to
//! evaluate for whole catalogs every frame, and the basis of the orbit
//! shape cache in [`orbit_track`].
//!
//! # Example
//!
//! ```ignore
//! use spacepass::propagation::*;
//!
//! let object = OrbitalObject::from_tle(Some("ISS (ZARYA)"), line1, line2)?;
//! let state = position(&object, epoch, PropagationMethod::HighFidelity)?;
//! ```

mod elements;
pub mod orbit_track;
mod propagator;
mod tracker;

pub use elements::*;
pub use orbit_track::{
    altitude_to_color, OrbitShapeCache, OrbitShapeEntry, OrbitVertex, RefreshOutcome,
    ShapeCacheConfig,
};
pub use propagator::*;
pub use tracker::*;

/// Earth's gravitational parameter in km³/s²
pub const MU_EARTH_KM3_S2: f64 = 398_600.4418;

/// Earth radius in kilometers (spherical Earth model, WGS-84 equatorial)
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Second zonal harmonic (WGS-84)
pub const J2: f64 = 1.082_626_68e-3;

/// Earth's rotation rate in rad/s
pub const OMEGA_EARTH: f64 = 7.292_115_0e-5;
