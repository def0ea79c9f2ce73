//! Pass requests and results

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::filter::PassFilter;
use crate::propagation::{OrbitalObject, PropagationMethod};
use crate::time::Epoch;
use crate::visibility::ObserverLocation;

/// One object to scan, with the presentation and photometric data the
/// element set does not carry
#[derive(Debug, Clone)]
pub struct PassTarget {
    pub object: Arc<OrbitalObject>,
    pub color: [f32; 4],
    /// Magnitude at 1000 km and 90° phase, if known
    pub standard_magnitude: Option<f64>,
}

impl PassTarget {
    pub fn new(object: Arc<OrbitalObject>) -> Self {
        Self {
            object,
            color: [1.0, 1.0, 1.0, 1.0],
            standard_magnitude: None,
        }
    }
}

/// Scan parameters shared by every request, loadable from the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSettings {
    pub duration_days: f64,
    /// Coarse scan step (seconds)
    pub step_s: f64,
    /// Resample step used by the spatial and duration filters (seconds)
    pub fine_step_s: f64,
    pub filter: PassFilter,
    /// Attach eclipse and magnitude to every path sample
    pub annotate_path: bool,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            duration_days: 1.0,
            step_s: 60.0,
            fine_step_s: 10.0,
            filter: PassFilter::default(),
            annotate_path: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassRequest {
    pub observer: ObserverLocation,
    pub targets: Vec<PassTarget>,
    pub start: Epoch,
    pub duration_days: f64,
    pub step_s: f64,
    pub fine_step_s: f64,
    pub filter: PassFilter,
    pub method: PropagationMethod,
    pub annotate_path: bool,
}

impl PassRequest {
    pub fn new(
        observer: ObserverLocation,
        targets: Vec<PassTarget>,
        start: Epoch,
        settings: &PassSettings,
    ) -> Self {
        Self {
            observer,
            targets,
            start,
            duration_days: settings.duration_days,
            step_s: settings.step_s,
            fine_step_s: settings.fine_step_s,
            filter: settings.filter.clone(),
            method: PropagationMethod::HighFidelity,
            annotate_path: settings.annotate_path,
        }
    }

    pub fn end(&self) -> Epoch {
        self.start.add_days(self.duration_days.max(0.0))
    }
}

/// One point of a pass's sky track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSample {
    pub epoch: Epoch,
    pub azimuth: f64,
    pub elevation: f64,
    pub range_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eclipsed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
}

/// An accepted visibility window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pass {
    pub object_id: u32,
    pub name: String,
    pub color: [f32; 4],
    pub aos: Epoch,
    pub tca: Epoch,
    pub los: Epoch,
    pub aos_azimuth: f64,
    pub tca_azimuth: f64,
    pub los_azimuth: f64,
    pub max_elevation: f64,
    pub range_at_tca_km: f64,
    pub duration_s: f64,
    /// Time spent inside the azimuth window and above the horizon mask
    pub visible_duration_s: f64,
    pub eclipsed_at_tca: bool,
    pub magnitude: Option<f64>,
    /// Sun elevation at the observer at TCA (degrees)
    pub sun_altitude: Option<f64>,
    /// Observer-centred angle between Sun and object at TCA (degrees)
    pub solar_elongation: Option<f64>,
    pub path: Vec<PathSample>,
}
