//! Position evaluation: SGP4 via satkit and the analytic J2 ellipse

use std::f64::consts::TAU;
use std::fmt;

use nalgebra::{Matrix3, Vector3};
use parking_lot::Mutex;
use satkit::sgp4::sgp4;

use super::elements::OrbitalObject;
use super::{EARTH_RADIUS_KM, MU_EARTH_KM3_S2};
use crate::time::Epoch;

/// Inertial-frame position and velocity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    /// km
    pub position: Vector3<f64>,
    /// km/s
    pub velocity: Vector3<f64>,
}

impl StateVector {
    pub fn radius_km(&self) -> f64 {
        self.position.norm()
    }

    pub fn altitude_km(&self) -> f64 {
        self.radius_km() - EARTH_RADIUS_KM
    }

    fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|v| v.is_finite())
    }
}

/// The model could not produce a usable state at the requested instant.
///
/// Callers treat this as "no position for this sample", never as fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationError {
    /// Orbit has decayed below the surface or mean motion went non-positive
    Decayed,
    /// Elements cannot be evaluated (e.g. eccentricity outside `[0, 1)`)
    InvalidElements,
    /// Time could not be represented by the model
    InvalidEpoch,
    /// The model produced NaN or infinite output
    NonFinite,
    /// Error reported by the underlying model
    Model { message: String },
}

impl fmt::Display for PropagationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decayed => write!(f, "Orbit has decayed"),
            Self::InvalidElements => write!(f, "Elements cannot be propagated"),
            Self::InvalidEpoch => write!(f, "Epoch is outside the model's time range"),
            Self::NonFinite => write!(f, "Propagator returned a non-finite state"),
            Self::Model { message } => write!(f, "Propagation failed: {}", message),
        }
    }
}

impl std::error::Error for PropagationError {}

/// Trusted external position model attached to each object.
///
/// Implementations must be `Send + Sync` so objects can be shared with the
/// pass prediction worker.
pub trait HighFidelityModel: Send + Sync + fmt::Debug {
    /// Inertial state at `epoch`
    fn state_at(&self, epoch: Epoch) -> Result<StateVector, PropagationError>;

    /// Model name
    fn name(&self) -> &'static str;
}

/// SGP4 general perturbations model backed by satkit.
///
/// satkit keeps initialization state inside the TLE, so propagation needs
/// mutable access; the lock keeps the model shareable between threads.
pub struct Sgp4Model {
    tle: Mutex<satkit::TLE>,
    epoch: Epoch,
}

impl fmt::Debug for Sgp4Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sgp4Model").field("epoch", &self.epoch).finish()
    }
}

impl Sgp4Model {
    /// Wrap a parsed element set. The model's reference epoch is the TLE's own.
    pub fn new(tle: satkit::TLE) -> Self {
        Self {
            epoch: Epoch::from_instant(&tle.epoch),
            tle: Mutex::new(tle),
        }
    }

    /// Reference epoch of the element set
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

impl HighFidelityModel for Sgp4Model {
    fn state_at(&self, epoch: Epoch) -> Result<StateVector, PropagationError> {
        let dt = epoch.seconds_since(self.epoch);
        if !dt.is_finite() {
            return Err(PropagationError::InvalidEpoch);
        }

        let mut tle = self.tle.lock();
        let time = tle.epoch + satkit::Duration::from_seconds(dt);

        match sgp4(&mut *tle, &[time]) {
            Ok(result) => {
                // TEME, meters and m/s
                let pos = result.pos.column(0);
                let vel = result.vel.column(0);
                let state = StateVector {
                    position: Vector3::new(pos[0], pos[1], pos[2]) / 1000.0,
                    velocity: Vector3::new(vel[0], vel[1], vel[2]) / 1000.0,
                };

                if !state.is_finite() {
                    return Err(PropagationError::NonFinite);
                }
                if state.radius_km() < EARTH_RADIUS_KM {
                    return Err(PropagationError::Decayed);
                }
                Ok(state)
            }
            Err(e) => Err(PropagationError::Model {
                message: format!("{:?}", e),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "SGP4"
    }
}

/// Which evaluator to use for a position query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationMethod {
    /// The object's attached model (SGP4 for catalog objects)
    #[default]
    HighFidelity,
    /// Keplerian ellipse with J2 secular drift and mean-motion decay
    Analytic,
}

impl PropagationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HighFidelity => "High fidelity (SGP4)",
            Self::Analytic => "Analytic (Kepler + J2)",
        }
    }
}

/// Evaluate an object's inertial state at `epoch`.
pub fn position(
    object: &OrbitalObject,
    epoch: Epoch,
    method: PropagationMethod,
) -> Result<StateVector, PropagationError> {
    match method {
        PropagationMethod::HighFidelity => object.model().state_at(epoch),
        PropagationMethod::Analytic => analytic_state(object, epoch),
    }
}

/// 3-1-3 rotation from the perifocal frame into the inertial frame,
/// `R3(-Ω) · R1(-i) · R3(-ω)`.
pub fn perifocal_to_inertial(raan: f64, inclination: f64, arg_perigee: f64) -> Matrix3<f64> {
    let (so, co) = raan.sin_cos();
    let (si, ci) = inclination.sin_cos();
    let (sw, cw) = arg_perigee.sin_cos();

    Matrix3::new(
        co * cw - so * sw * ci,
        -co * sw - so * cw * ci,
        so * si,
        so * cw + co * sw * ci,
        -so * sw + co * cw * ci,
        -co * si,
        sw * si,
        cw * si,
        ci,
    )
}

/// Solve Kepler's equation `E - e sin E = M` by Newton iteration.
pub fn eccentric_anomaly(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let m = mean_anomaly.rem_euclid(TAU);
    let mut e_anom = if eccentricity > 0.8 { std::f64::consts::PI } else { m };

    for _ in 0..30 {
        let f = e_anom - eccentricity * e_anom.sin() - m;
        let step = f / (1.0 - eccentricity * e_anom.cos());
        e_anom -= step;
        if step.abs() < 1e-12 {
            break;
        }
    }
    e_anom
}

/// True anomaly from eccentric anomaly
pub fn true_anomaly(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let (s, c) = (eccentric_anomaly / 2.0).sin_cos();
    2.0 * ((1.0 + eccentricity).sqrt() * s).atan2((1.0 - eccentricity).sqrt() * c)
}

/// Point on the orbit in the perifocal frame at true anomaly `nu`
pub fn perifocal_point(semi_major_axis_km: f64, eccentricity: f64, nu: f64) -> Vector3<f64> {
    let p = semi_major_axis_km * (1.0 - eccentricity * eccentricity);
    let r = p / (1.0 + eccentricity * nu.cos());
    Vector3::new(r * nu.cos(), r * nu.sin(), 0.0)
}

/// Fast two-body state with secular orientation drift.
///
/// Shape (`a`, `e`) is taken from the reference elements; node and perigee
/// drift with the J2 rates and the mean anomaly follows the decay term.
pub fn analytic_state(object: &OrbitalObject, epoch: Epoch) -> Result<StateVector, PropagationError> {
    let el = &object.elements;
    let a = el.semi_major_axis_km;
    let e = el.eccentricity;
    if !(0.0..1.0).contains(&e) || a <= 0.0 {
        return Err(PropagationError::InvalidElements);
    }

    let dt = object.elapsed_seconds(epoch);
    if object.mean_motion_at(epoch) <= 0.0 {
        return Err(PropagationError::Decayed);
    }

    let mean_anomaly =
        el.mean_anomaly + object.mean_motion() * dt + 0.5 * object.mean_motion_dot() * dt * dt;
    let big_e = eccentric_anomaly(mean_anomaly, e);
    let nu = true_anomaly(big_e, e);

    let p = a * (1.0 - e * e);
    let r_pf = perifocal_point(a, e, nu);
    let v_scale = (MU_EARTH_KM3_S2 / p).sqrt();
    let v_pf = Vector3::new(-v_scale * nu.sin(), v_scale * (e + nu.cos()), 0.0);

    let orientation = object.corrected_elements(epoch);
    let rotation = perifocal_to_inertial(
        orientation.raan,
        orientation.inclination,
        orientation.arg_perigee,
    );

    let state = StateVector {
        position: rotation * r_pf,
        velocity: rotation * v_pf,
    };
    if !state.is_finite() {
        return Err(PropagationError::NonFinite);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::KeplerianElements;
    use std::f64::consts::PI;
    use std::sync::Arc;

    const ISS_LINE1: &str = "1 25544U 98067A   20148.21301450  .00001715  00000-0  38778-4 0  9992";
    const ISS_LINE2: &str = "2 25544  51.6435  92.2789 0002570 358.0648 144.9972 15.49396855228767";

    #[derive(Debug)]
    struct Analytic;

    impl HighFidelityModel for Analytic {
        fn state_at(&self, _epoch: Epoch) -> Result<StateVector, PropagationError> {
            Err(PropagationError::Decayed)
        }

        fn name(&self) -> &'static str {
            "analytic-only"
        }
    }

    fn circular(inclination: f64) -> OrbitalObject {
        OrbitalObject::new(
            7,
            "CIRCULAR",
            Epoch::new(2024, 50.0),
            KeplerianElements {
                semi_major_axis_km: 7000.0,
                eccentricity: 0.0,
                inclination,
                raan: 0.0,
                arg_perigee: 0.0,
                mean_anomaly: 0.0,
            },
            0.0,
            Arc::new(Analytic),
        )
        .unwrap()
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let r = perifocal_to_inertial(1.1, 0.9, 2.3);
        let identity = r * r.transpose();
        assert!((identity - Matrix3::identity()).norm() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kepler_solution() {
        for &e in &[0.0, 0.1, 0.5, 0.9] {
            for &m in &[0.1, 1.0, 3.0, 5.5] {
                let big_e = eccentric_anomaly(m, e);
                let residual = big_e - e * big_e.sin() - m;
                assert!(residual.abs() < 1e-10, "e={} m={} residual={}", e, m, residual);
            }
        }
    }

    #[test]
    fn test_circular_orbit_radius_and_speed() {
        let obj = circular(0.5);
        for minutes in [0.0, 17.0, 45.0, 300.0] {
            let state = analytic_state(&obj, obj.epoch.add_seconds(minutes * 60.0)).unwrap();
            assert!((state.radius_km() - 7000.0).abs() < 1e-6);
            let speed = (MU_EARTH_KM3_S2 / 7000.0).sqrt();
            assert!((state.velocity.norm() - speed).abs() < 1e-9);
            assert!(state.position.dot(&state.velocity).abs() < 1e-6);
        }
    }

    #[test]
    fn test_equatorial_quarter_orbit() {
        let obj = circular(0.0);
        let quarter = obj.period_seconds() / 4.0;
        let state = analytic_state(&obj, obj.epoch.add_seconds(quarter)).unwrap();
        // Secular drift rotates the in-plane angle slightly, so allow a few km
        assert!(state.position.x.abs() < 20.0, "x {}", state.position.x);
        assert!((state.position.y - 7000.0).abs() < 1.0);
        assert!(state.position.z.abs() < 1e-9);
    }

    #[test]
    fn test_true_anomaly_at_apsides() {
        assert!(true_anomaly(0.0, 0.3).abs() < 1e-12);
        assert!((true_anomaly(PI, 0.3) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_position_dispatch() {
        let obj = circular(0.2);
        assert!(position(&obj, obj.epoch, PropagationMethod::Analytic).is_ok());
        assert_eq!(
            position(&obj, obj.epoch, PropagationMethod::HighFidelity),
            Err(PropagationError::Decayed)
        );
    }

    #[test]
    fn test_sgp4_simple_propagation() {
        let iss = OrbitalObject::from_tle(None, ISS_LINE1, ISS_LINE2).unwrap();
        let s1 = position(&iss, iss.epoch, PropagationMethod::HighFidelity).unwrap();
        let s2 = position(&iss, iss.epoch.add_seconds(3600.0), PropagationMethod::HighFidelity)
            .unwrap();

        assert_ne!(s1.position, s2.position);
        assert!(s1.altitude_km() > 350.0 && s1.altitude_km() < 450.0);
        assert!((s1.velocity.norm() - 7.66).abs() < 0.1);
    }

    #[test]
    fn test_analytic_tracks_sgp4_near_epoch() {
        let iss = OrbitalObject::from_tle(None, ISS_LINE1, ISS_LINE2).unwrap();
        let t = iss.epoch.add_seconds(600.0);
        let sgp4_state = position(&iss, t, PropagationMethod::HighFidelity).unwrap();
        let analytic = position(&iss, t, PropagationMethod::Analytic).unwrap();
        let separation = (sgp4_state.position - analytic.position).norm();
        assert!(separation < 100.0, "separation {} km", separation);
    }
}
