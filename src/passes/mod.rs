//! Pass prediction
//!
//! Finds the windows in which objects are above an observer's horizon,
//! filters them and annotates them with lighting and brightness. The scan
//! itself is a pure function of a [`PassRequest`]; [`PassWorker`] runs it on
//! a background thread and streams the results.

mod engine;
mod filter;
mod request;
mod worker;

pub use engine::*;
pub use filter::*;
pub use request::*;
pub use worker::*;

#[cfg(test)]
pub(crate) mod testing {
    //! Synthetic circular-orbit objects shared by the scan and worker tests

    use std::f64::consts::TAU;
    use std::sync::Arc;

    use nalgebra::Vector3;

    use super::{PassFilter, PassRequest, PassSettings, PassTarget};
    use crate::propagation::{
        HighFidelityModel, KeplerianElements, OrbitalObject, PropagationError, StateVector,
        MU_EARTH_KM3_S2,
    };
    use crate::time::Epoch;
    use crate::visibility::ObserverLocation;

    /// Semi-major axis of a 90 minute orbit
    pub const SCENARIO_RADIUS_KM: f64 = 6652.555;

    /// Equatorial circular orbit, angle `phase0` (inertial) at `epoch`
    #[derive(Debug)]
    pub struct CircularModel {
        pub epoch: Epoch,
        pub radius_km: f64,
        pub phase0: f64,
    }

    impl HighFidelityModel for CircularModel {
        fn state_at(&self, epoch: Epoch) -> Result<StateVector, PropagationError> {
            let n = (MU_EARTH_KM3_S2 / self.radius_km.powi(3)).sqrt();
            let theta = self.phase0 + n * epoch.seconds_since(self.epoch);
            let (s, c) = theta.sin_cos();
            Ok(StateVector {
                position: Vector3::new(c, s, 0.0) * self.radius_km,
                velocity: Vector3::new(-s, c, 0.0) * self.radius_km * n,
            })
        }

        fn name(&self) -> &'static str {
            "circular"
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl HighFidelityModel for Failing {
        fn state_at(&self, _epoch: Epoch) -> Result<StateVector, PropagationError> {
            Err(PropagationError::Decayed)
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn elements(phase0: f64) -> KeplerianElements {
        KeplerianElements {
            semi_major_axis_km: SCENARIO_RADIUS_KM,
            eccentricity: 0.0,
            inclination: 0.0,
            raan: 0.0,
            arg_perigee: 0.0,
            mean_anomaly: phase0.rem_euclid(TAU),
        }
    }

    /// 90 minute equatorial object `offset` radians ahead of a Greenwich
    /// observer at `start`
    pub fn circular_target(start: Epoch, offset: f64) -> PassTarget {
        let phase0 = start.gmst() + offset;
        let model = CircularModel {
            epoch: start,
            radius_km: SCENARIO_RADIUS_KM,
            phase0,
        };
        let object =
            OrbitalObject::new(90001, "CIRCULAR", start, elements(phase0), 0.0, Arc::new(model))
                .unwrap();
        PassTarget::new(Arc::new(object))
    }

    pub fn failing_target() -> PassTarget {
        let object = OrbitalObject::new(
            90002,
            "FAILING",
            Epoch::new(2024, 1.0),
            elements(0.0),
            0.0,
            Arc::new(Failing),
        )
        .unwrap();
        PassTarget::new(Arc::new(object))
    }

    /// Observer at (0°, 0°), one day, 10° floor
    pub fn scenario_request(start: Epoch, offset: f64) -> PassRequest {
        let settings = PassSettings {
            filter: PassFilter {
                min_elevation: 10.0,
                ..Default::default()
            },
            ..Default::default()
        };
        PassRequest::new(
            ObserverLocation::new(0.0, 0.0, 0.0),
            vec![circular_target(start, offset)],
            start,
            &settings,
        )
    }
}
