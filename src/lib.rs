//! spacepass - orbit propagation and pass prediction
//!
//! Tracks orbiting objects from two-line element sets and predicts when they
//! are observable from a ground location.
//!
//! - [`time`]: the TLE-style [`Epoch`] and sidereal time
//! - [`propagation`]: element model, SGP4 and analytic propagators, the
//!   position tracker and the orbit shape cache
//! - [`visibility`]: look angles, eclipse, brightness and Doppler
//! - [`passes`]: pass prediction engine and its cancelable worker
//! - [`data`]: catalog loading from TLE text or JSON
//! - [`config`]: settings file

pub mod config;
pub mod data;
pub mod passes;
pub mod propagation;
pub mod time;
pub mod visibility;

pub use time::Epoch;
