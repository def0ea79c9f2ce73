//! Orbital element model
//!
//! An [`OrbitalObject`] is built once per parsed element set. The secular J2
//! rates and mean motion are computed at construction and never change; a
//! new element set means a new object.

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::propagator::{HighFidelityModel, Sgp4Model};
use super::{EARTH_RADIUS_KM, J2, MU_EARTH_KM3_S2};
use crate::time::{Epoch, SECONDS_PER_DAY};

/// Classical Keplerian elements (angles in radians, distance in km)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeplerianElements {
    pub semi_major_axis_km: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub raan: f64,
    pub arg_perigee: f64,
    pub mean_anomaly: f64,
}

impl KeplerianElements {
    /// Semi-latus rectum `p = a(1 - e²)` in km
    pub fn semi_latus_rectum_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity * self.eccentricity)
    }
}

/// Orientation of the orbit plane after secular drift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedOrientation {
    pub raan: f64,
    pub arg_perigee: f64,
    pub inclination: f64,
}

/// Why an element set could not become an [`OrbitalObject`]
#[derive(Debug, Clone)]
pub enum ElementError {
    /// A TLE line has the wrong line number or stray characters
    MalformedLine { line: u8, message: String },
    /// satkit could not read the element set
    Tle(String),
    /// Catalog number does not fit a NORAD id
    CatalogNumber(i32),
    /// Mean motion is zero, negative or not finite
    NonPhysicalMeanMotion(f64),
    /// Eccentricity outside `[0, 1)`
    Eccentricity(f64),
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine { line, message } => {
                write!(f, "TLE line {} is malformed: {}", line, message)
            }
            Self::Tle(message) => write!(f, "Could not read element set: {}", message),
            Self::CatalogNumber(n) => write!(f, "Invalid catalog number: {}", n),
            Self::NonPhysicalMeanMotion(n) => write!(f, "Non-physical mean motion: {}", n),
            Self::Eccentricity(e) => write!(f, "Eccentricity {} is not elliptical", e),
        }
    }
}

impl std::error::Error for ElementError {}

fn check_line(text: &str, line: u8) -> Result<(), ElementError> {
    let expected = char::from(b'0' + line);
    if !text.starts_with(expected) {
        return Err(ElementError::MalformedLine {
            line,
            message: format!("does not start with '{}'", expected),
        });
    }
    if !text.is_ascii() {
        return Err(ElementError::MalformedLine {
            line,
            message: "contains non-ASCII characters".into(),
        });
    }
    Ok(())
}

/// Secular J2 drift rates `(raan_rate, arg_perigee_rate)` in rad/s
pub fn secular_rates(elements: &KeplerianElements, mean_motion: f64) -> (f64, f64) {
    let p = elements.semi_latus_rectum_km();
    let factor = 1.5 * mean_motion * J2 * (EARTH_RADIUS_KM / p).powi(2);
    let sin_i = elements.inclination.sin();
    let raan_rate = -factor * elements.inclination.cos();
    let arg_perigee_rate = factor * (2.0 - 2.5 * sin_i * sin_i);
    (raan_rate, arg_perigee_rate)
}

/// A tracked object: identity, reference elements and propagation handle
pub struct OrbitalObject {
    pub id: u32,
    pub name: String,
    /// Reference epoch of the elements
    pub epoch: Epoch,
    pub elements: KeplerianElements,
    /// rad/s
    mean_motion: f64,
    /// rad/s
    raan_rate: f64,
    /// rad/s
    arg_perigee_rate: f64,
    /// rad/s²
    mean_motion_dot: f64,
    model: Arc<dyn HighFidelityModel>,
}

impl fmt::Debug for OrbitalObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrbitalObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("epoch", &self.epoch)
            .field("elements", &self.elements)
            .field("model", &self.model.name())
            .finish()
    }
}

impl OrbitalObject {
    /// Create an object from classical elements and a high-fidelity model.
    ///
    /// `mean_motion_dot` is the full first derivative of mean motion in rad/s².
    pub fn new(
        id: u32,
        name: impl Into<String>,
        epoch: Epoch,
        elements: KeplerianElements,
        mean_motion_dot: f64,
        model: Arc<dyn HighFidelityModel>,
    ) -> Result<Self, ElementError> {
        if !(0.0..1.0).contains(&elements.eccentricity) {
            return Err(ElementError::Eccentricity(elements.eccentricity));
        }

        let a = elements.semi_major_axis_km;
        let mean_motion = (MU_EARTH_KM3_S2 / (a * a * a)).sqrt();
        if !mean_motion.is_finite() || mean_motion <= 0.0 {
            return Err(ElementError::NonPhysicalMeanMotion(mean_motion));
        }

        let (raan_rate, arg_perigee_rate) = secular_rates(&elements, mean_motion);

        Ok(Self {
            id,
            name: name.into(),
            epoch,
            elements,
            mean_motion,
            raan_rate,
            arg_perigee_rate,
            mean_motion_dot: if mean_motion_dot.is_finite() {
                mean_motion_dot
            } else {
                0.0
            },
            model,
        })
    }

    /// Build an object from a two-line element set, backed by SGP4.
    pub fn from_tle(name: Option<&str>, line1: &str, line2: &str) -> Result<Self, ElementError> {
        let (line1, line2) = (line1.trim(), line2.trim());
        check_line(line1, 1)?;
        check_line(line2, 2)?;
        let tle = satkit::TLE::load_2line(line1, line2)
            .map_err(|e| ElementError::Tle(e.to_string()))?;
        Self::from_satkit_tle(name, tle)
    }

    /// Build an object from an element set satkit has already parsed. The
    /// same TLE drives SGP4, so both evaluators share one reference epoch.
    pub fn from_satkit_tle(name: Option<&str>, tle: satkit::TLE) -> Result<Self, ElementError> {
        if !tle.mean_motion.is_finite() || tle.mean_motion <= 0.0 {
            return Err(ElementError::NonPhysicalMeanMotion(tle.mean_motion));
        }
        let id = u32::try_from(tle.sat_num).map_err(|_| ElementError::CatalogNumber(tle.sat_num))?;

        let n_rad_s = tle.mean_motion * TAU / SECONDS_PER_DAY;
        let elements = KeplerianElements {
            semi_major_axis_km: (MU_EARTH_KM3_S2 / (n_rad_s * n_rad_s)).cbrt(),
            eccentricity: tle.eccen,
            inclination: tle.inclination.to_radians(),
            raan: tle.raan.to_radians(),
            arg_perigee: tle.arg_of_perigee.to_radians(),
            mean_anomaly: tle.mean_anomaly.to_radians(),
        };
        // satkit stores half the first derivative, in rev/day²
        let mean_motion_dot = 2.0 * tle.mean_motion_dot * TAU / (SECONDS_PER_DAY * SECONDS_PER_DAY);

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("NORAD {}", id));
        let model = Sgp4Model::new(tle);

        Self::new(id, name, model.epoch(), elements, mean_motion_dot, Arc::new(model))
    }

    /// Mean motion at the reference epoch in rad/s
    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }

    /// First derivative of mean motion in rad/s²
    pub fn mean_motion_dot(&self) -> f64 {
        self.mean_motion_dot
    }

    /// `(raan_rate, arg_perigee_rate)` in rad/s
    pub fn secular_rates(&self) -> (f64, f64) {
        (self.raan_rate, self.arg_perigee_rate)
    }

    pub fn model(&self) -> &dyn HighFidelityModel {
        self.model.as_ref()
    }

    /// Seconds elapsed from the element epoch to `epoch`
    pub fn elapsed_seconds(&self, epoch: Epoch) -> f64 {
        epoch.seconds_since(self.epoch)
    }

    /// Node and perigee argument after secular drift to `epoch`
    pub fn corrected_elements(&self, epoch: Epoch) -> CorrectedOrientation {
        let dt = self.elapsed_seconds(epoch);
        CorrectedOrientation {
            raan: (self.elements.raan + self.raan_rate * dt).rem_euclid(TAU),
            arg_perigee: (self.elements.arg_perigee + self.arg_perigee_rate * dt).rem_euclid(TAU),
            inclination: self.elements.inclination,
        }
    }

    /// Mean motion at `epoch` including decay, rad/s
    pub fn mean_motion_at(&self, epoch: Epoch) -> f64 {
        self.mean_motion + self.mean_motion_dot * self.elapsed_seconds(epoch)
    }

    /// Semi-major axis implied by the decayed mean motion at `epoch`.
    ///
    /// `None` once the decay term has driven mean motion non-positive.
    pub fn decayed_semi_major_axis(&self, epoch: Epoch) -> Option<f64> {
        let n = self.mean_motion_at(epoch);
        if !n.is_finite() || n <= 0.0 {
            return None;
        }
        Some(self.elements.semi_major_axis_km * (self.mean_motion / n).powf(2.0 / 3.0))
    }

    pub fn period_seconds(&self) -> f64 {
        2.0 * PI / self.mean_motion
    }

    /// Perigee and apogee altitudes above the spherical Earth (km)
    pub fn perigee_apogee_km(&self) -> (f64, f64) {
        let a = self.elements.semi_major_axis_km;
        let e = self.elements.eccentricity;
        (a * (1.0 - e) - EARTH_RADIUS_KM, a * (1.0 + e) - EARTH_RADIUS_KM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{analytic_state, PropagationError, StateVector};

    const ISS_LINE1: &str = "1 25544U 98067A   20148.21301450  .00001715  00000-0  38778-4 0  9992";
    const ISS_LINE2: &str = "2 25544  51.6435  92.2789 0002570 358.0648 144.9972 15.49396855228767";

    #[derive(Debug)]
    struct Unused;

    impl HighFidelityModel for Unused {
        fn state_at(&self, _epoch: Epoch) -> Result<StateVector, PropagationError> {
            Err(PropagationError::InvalidElements)
        }

        fn name(&self) -> &'static str {
            "unused"
        }
    }

    fn object(inclination_deg: f64) -> OrbitalObject {
        OrbitalObject::new(
            1,
            "TEST",
            Epoch::new(2024, 100.0),
            KeplerianElements {
                semi_major_axis_km: EARTH_RADIUS_KM + 500.0,
                eccentricity: 0.001,
                inclination: inclination_deg.to_radians(),
                raan: 0.0,
                arg_perigee: 0.0,
                mean_anomaly: 0.0,
            },
            0.0,
            Arc::new(Unused),
        )
        .unwrap()
    }

    #[test]
    fn test_elements_from_tle() {
        let iss = OrbitalObject::from_tle(None, ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(iss.id, 25544);
        assert_eq!(iss.name, "NORAD 25544");
        assert_eq!(iss.epoch.year(), 2020);
        assert!((iss.epoch.day_of_year() - 148.2130145).abs() < 1e-6);
        assert!((iss.elements.inclination.to_degrees() - 51.6435).abs() < 1e-9);
        assert!((iss.elements.raan.to_degrees() - 92.2789).abs() < 1e-9);
        assert!((iss.elements.eccentricity - 0.000257).abs() < 1e-12);
        let rev_per_day = iss.mean_motion() * SECONDS_PER_DAY / TAU;
        assert!((rev_per_day - 15.49396855).abs() < 1e-6);
    }

    #[test]
    fn test_sgp4_shares_the_element_epoch() {
        let iss = OrbitalObject::from_tle(None, ISS_LINE1, ISS_LINE2).unwrap();
        let tle = satkit::TLE::load_2line(ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(iss.epoch, Sgp4Model::new(tle).epoch());
    }

    #[test]
    fn test_malformed_tle_rejected() {
        assert!(OrbitalObject::from_tle(None, "1 25544U", ISS_LINE2).is_err());
        assert!(matches!(
            OrbitalObject::from_tle(None, ISS_LINE2, ISS_LINE1),
            Err(ElementError::MalformedLine { line: 1, .. })
        ));
        let broken = ISS_LINE2.replace("15.49396855", "15.4939xx55");
        assert!(OrbitalObject::from_tle(None, ISS_LINE1, &broken).is_err());
        let accented = ISS_LINE1.replacen("98067A", "98067\u{e9}", 1);
        assert!(OrbitalObject::from_tle(None, &accented, ISS_LINE2).is_err());
    }

    #[test]
    fn test_iss_semi_major_axis() {
        let iss = OrbitalObject::from_tle(Some("ISS (ZARYA)"), ISS_LINE1, ISS_LINE2).unwrap();
        let (perigee, apogee) = iss.perigee_apogee_km();
        assert!(perigee > 380.0 && perigee < 450.0, "perigee {}", perigee);
        assert!(apogee > perigee);
        assert!((iss.period_seconds() / 60.0 - 92.9).abs() < 0.5);
        assert_eq!(iss.name, "ISS (ZARYA)");
        assert!(iss.mean_motion_dot() > 0.0);
    }

    #[test]
    fn test_prograde_node_regresses() {
        let obj = object(51.6);
        let (raan_rate, arg_rate) = obj.secular_rates();
        assert!(raan_rate < 0.0);
        // ISS-like orbit regresses about 5 degrees per day
        let per_day = raan_rate.to_degrees() * SECONDS_PER_DAY;
        assert!((per_day + 5.0).abs() < 0.5, "raan drift {} deg/day", per_day);
        assert!(arg_rate > 0.0);
    }

    #[test]
    fn test_retrograde_and_critical_inclination() {
        let (raan_rate, _) = object(98.0).secular_rates();
        assert!(raan_rate > 0.0);

        // Perigee rotation vanishes at the critical inclination (63.43 deg)
        let (_, arg_rate) = object(63.4349).secular_rates();
        assert!(arg_rate.abs() < 1e-10);
    }

    #[test]
    fn test_corrected_elements_drift_linearly() {
        let obj = object(51.6);
        let day_later = obj.epoch.add_days(1.0);
        let corrected = obj.corrected_elements(day_later);
        let (raan_rate, _) = obj.secular_rates();
        let expected = (raan_rate * SECONDS_PER_DAY).rem_euclid(TAU);
        assert!((corrected.raan - expected).abs() < 1e-9);
        assert_eq!(corrected.inclination, obj.elements.inclination);
    }

    #[test]
    fn test_rejects_hyperbolic_elements() {
        let mut elements = object(10.0).elements;
        elements.eccentricity = 1.2;
        let result = OrbitalObject::new(
            2,
            "BAD",
            Epoch::new(2024, 1.0),
            elements,
            0.0,
            Arc::new(Unused),
        );
        assert!(matches!(result, Err(ElementError::Eccentricity(_))));
    }

    #[test]
    fn test_decay_shrinks_semi_major_axis() {
        let mut obj = object(51.6);
        obj.mean_motion_dot = 1e-12;
        let later = obj.epoch.add_days(10.0);
        let a = obj.decayed_semi_major_axis(later).unwrap();
        assert!(a < obj.elements.semi_major_axis_km);
        assert!(analytic_state(&obj, later).is_ok());
    }
}
