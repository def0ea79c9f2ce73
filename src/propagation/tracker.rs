//! Live position tracking for a population of objects

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use nalgebra::Vector3;

use super::elements::OrbitalObject;
use super::propagator::{position, PropagationMethod};
use super::EARTH_RADIUS_KM;
use crate::time::{Epoch, SECONDS_PER_DAY};

/// Propagation result for a single object
#[derive(Debug, Clone, Copy)]
pub struct TrackedState {
    /// Inertial position (km)
    pub position_km: Vector3<f64>,
    /// Inertial velocity (km/s)
    pub velocity_km_s: Vector3<f64>,
    /// Position in render space (Earth radii, Y-up)
    pub render_position: Vec3,
    /// Altitude above Earth surface (km)
    pub altitude_km: f64,
    /// Age of the element set in days (for error estimation)
    pub element_age_days: f64,
}

/// Convert an inertial position in km into render space.
///
/// The inertial frame is Z-up (polar axis), rendering is Y-up. Preserves
/// right-handedness: X -> X, Z -> Y, Y -> -Z, scaled to Earth radii.
pub fn to_render_space(position_km: &Vector3<f64>) -> Vec3 {
    let scale = 1.0 / EARTH_RADIUS_KM;
    Vec3::new(
        (position_km.x * scale) as f32,
        (position_km.z * scale) as f32,
        (-position_km.y * scale) as f32,
    )
}

/// Arena of tracked objects with one cached state slot per object.
///
/// The tracker is owned by a single thread; the state slots are rewritten
/// by [`Tracker::propagate_all`] and read everywhere else. Objects are
/// shared (`Arc`) so they can be handed to the pass worker without copying.
pub struct Tracker {
    objects: Vec<Arc<OrbitalObject>>,
    index: HashMap<u32, usize>,
    states: Vec<Option<TrackedState>>,
    current_time: Epoch,
    method: PropagationMethod,
}

impl Tracker {
    pub fn new(start: Epoch, method: PropagationMethod) -> Self {
        Self {
            objects: Vec::new(),
            index: HashMap::new(),
            states: Vec::new(),
            current_time: start,
            method,
        }
    }

    /// Replace the tracked population
    pub fn load_objects(&mut self, objects: impl IntoIterator<Item = Arc<OrbitalObject>>) {
        self.objects.clear();
        self.index.clear();
        self.states.clear();

        for object in objects {
            self.insert(object);
        }

        log::info!("Tracking {} objects", self.objects.len());
    }

    /// Add an object, replacing any previous object with the same id
    pub fn insert(&mut self, object: Arc<OrbitalObject>) {
        match self.index.get(&object.id) {
            Some(&slot) => {
                self.objects[slot] = object;
                self.states[slot] = None;
            }
            None => {
                self.index.insert(object.id, self.objects.len());
                self.objects.push(object);
                self.states.push(None);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[Arc<OrbitalObject>] {
        &self.objects
    }

    pub fn object(&self, id: u32) -> Option<&Arc<OrbitalObject>> {
        self.index.get(&id).map(|&slot| &self.objects[slot])
    }

    pub fn method(&self) -> PropagationMethod {
        self.method
    }

    pub fn set_method(&mut self, method: PropagationMethod) {
        self.method = method;
    }

    /// Get current simulation time
    pub fn current_time(&self) -> Epoch {
        self.current_time
    }

    pub fn set_time(&mut self, time: Epoch) {
        self.current_time = time;
    }

    /// Advance time by delta seconds (negative runs backwards)
    pub fn advance_time(&mut self, delta_seconds: f64) {
        self.current_time = self.current_time.add_seconds(delta_seconds);
    }

    /// Greenwich sidereal angle at the current time (radians)
    pub fn gmst(&self) -> f64 {
        self.current_time.gmst()
    }

    pub fn format_time(&self) -> String {
        self.current_time.to_string()
    }

    /// Evaluate one object at the current time without touching its slot
    pub fn propagate(&self, id: u32) -> Option<TrackedState> {
        let object = self.object(id)?;
        self.evaluate(object)
    }

    fn evaluate(&self, object: &OrbitalObject) -> Option<TrackedState> {
        match position(object, self.current_time, self.method) {
            Ok(state) => Some(TrackedState {
                position_km: state.position,
                velocity_km_s: state.velocity,
                render_position: to_render_space(&state.position),
                altitude_km: state.altitude_km(),
                element_age_days: (self.current_time.seconds_since(object.epoch)
                    / SECONDS_PER_DAY)
                    .abs(),
            }),
            Err(e) => {
                log::trace!("No position for {} at {}: {}", object.id, self.current_time, e);
                None
            }
        }
    }

    /// Refresh every object's cached state at the current time.
    ///
    /// Objects that fail to propagate have their slot cleared and are simply
    /// not rendered this frame. Returns the number of usable states.
    pub fn propagate_all(&mut self) -> usize {
        let mut available = 0;
        for slot in 0..self.objects.len() {
            let state = self.evaluate(&self.objects[slot]);
            if state.is_some() {
                available += 1;
            }
            self.states[slot] = state;
        }
        available
    }

    /// Cached state from the last [`Tracker::propagate_all`]
    pub fn state(&self, id: u32) -> Option<&TrackedState> {
        let &slot = self.index.get(&id)?;
        self.states[slot].as_ref()
    }

    /// Iterate `(object, cached state)` pairs with a usable state
    pub fn states(&self) -> impl Iterator<Item = (&Arc<OrbitalObject>, &TrackedState)> {
        self.objects
            .iter()
            .zip(self.states.iter())
            .filter_map(|(object, state)| state.as_ref().map(|s| (object, s)))
    }
}
