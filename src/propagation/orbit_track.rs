//! Orbit shape cache
//!
//! Keeps a polyline approximation of every tracked orbit ellipse so the
//! per-object trigonometry is not redone each frame. Two refresh paths work
//! over the same entry array:
//!
//! - **Orientation**: rotates the cached perifocal points by the secularly
//!   drifted node/perigee. Throttled by a wall-clock rate limit and a
//!   simulated-time interval.
//! - **Shape**: regenerates the perifocal points when decay has moved the
//!   semi-major axis past a threshold. Checked on a much coarser
//!   simulated-time interval.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::elements::OrbitalObject;
use super::propagator::{perifocal_point, perifocal_to_inertial};
use super::tracker::to_render_space;
use super::EARTH_RADIUS_KM;
use crate::time::Epoch;

/// Orbit line vertex (line-list topology)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct OrbitVertex {
    /// Render space (Earth radii, Y-up)
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Orbit color stops by altitude (km): blue through cyan across LEO, green
/// to yellow through MEO, yellow at GEO, fading to orange beyond.
const ALTITUDE_GRADIENT: [(f32, [f32; 3]); 6] = [
    (500.0, [0.2, 0.4, 1.0]),
    (2_000.0, [0.2, 1.0, 1.0]),
    (20_000.0, [0.0, 1.0, 0.0]),
    (35_000.0, [1.0, 1.0, 0.0]),
    (40_000.0, [1.0, 1.0, 0.0]),
    (90_000.0, [1.0, 0.5, 0.0]),
];

/// Orbit color for a mean altitude in km, clamped at both ends of the gradient
pub fn altitude_to_color(altitude_km: f64) -> [f32; 4] {
    let alt = altitude_km as f32;
    let (first_alt, first) = ALTITUDE_GRADIENT[0];
    let rgb = if alt <= first_alt {
        first
    } else {
        ALTITUDE_GRADIENT
            .windows(2)
            .find(|pair| alt < pair[1].0)
            .map(|pair| {
                let ((lo_alt, lo), (hi_alt, hi)) = (pair[0], pair[1]);
                let t = (alt - lo_alt) / (hi_alt - lo_alt);
                [0, 1, 2].map(|i| lo[i] + (hi[i] - lo[i]) * t)
            })
            .unwrap_or(ALTITUDE_GRADIENT[ALTITUDE_GRADIENT.len() - 1].1)
    };
    [rgb[0], rgb[1], rgb[2], 1.0]
}

/// Refresh cadence for [`OrbitShapeCache`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeCacheConfig {
    /// Line segments per orbit
    pub segments: usize,
    /// Simulated seconds between orientation refreshes
    pub orientation_interval_s: f64,
    /// Minimum wall-clock time between orientation refreshes
    pub min_refresh_interval_ms: u64,
    /// Simulated seconds between decay checks
    pub shape_check_interval_s: f64,
    /// Semi-major axis drift that triggers a shape rebuild (km)
    pub decay_threshold_km: f64,
}

impl Default for ShapeCacheConfig {
    fn default() -> Self {
        Self {
            segments: 90,
            orientation_interval_s: 60.0,
            min_refresh_interval_ms: 250,
            shape_check_interval_s: 3600.0,
            decay_threshold_km: 1.0,
        }
    }
}

impl ShapeCacheConfig {
    fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }
}

/// Cached ellipse for one object
#[derive(Debug, Clone)]
pub struct OrbitShapeEntry {
    pub object_id: u32,
    pub color: [f32; 4],
    /// `segments + 1` points in the perifocal frame (km)
    pub perifocal: Vec<Vector3<f64>>,
    /// Semi-major axis the perifocal points were built from (km)
    pub built_semi_major_axis_km: f64,
    /// Epoch of the last orientation refresh
    pub oriented_at: Option<Epoch>,
    /// Perifocal points rotated into the inertial frame (km)
    pub inertial: Vec<Vector3<f64>>,
}

impl OrbitShapeEntry {
    fn build(object: &OrbitalObject, semi_major_axis_km: f64, segments: usize) -> Self {
        let e = object.elements.eccentricity;
        let perifocal = (0..=segments)
            .map(|i| {
                let nu = TAU * i as f64 / segments as f64;
                perifocal_point(semi_major_axis_km, e, nu)
            })
            .collect();

        Self {
            object_id: object.id,
            color: altitude_to_color(semi_major_axis_km - EARTH_RADIUS_KM),
            perifocal,
            built_semi_major_axis_km: semi_major_axis_km,
            oriented_at: None,
            inertial: Vec::new(),
        }
    }

    fn orient(&mut self, object: &OrbitalObject, epoch: Epoch) {
        let o = object.corrected_elements(epoch);
        let rotation = perifocal_to_inertial(o.raan, o.inclination, o.arg_perigee);
        self.inertial = self.perifocal.iter().map(|p| rotation * p).collect();
        self.oriented_at = Some(epoch);
    }
}

/// What an [`OrbitShapeCache::update`] call recomputed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub orientations_refreshed: bool,
    pub shapes_rebuilt: usize,
}

impl RefreshOutcome {
    /// Whether the geometry buffer changed and needs re-uploading
    pub fn geometry_changed(&self) -> bool {
        self.orientations_refreshed || self.shapes_rebuilt > 0
    }
}

/// Precomputed orbit polylines for a population of objects
pub struct OrbitShapeCache {
    config: ShapeCacheConfig,
    entries: Vec<OrbitShapeEntry>,
    vertices: Vec<OrbitVertex>,
    last_orientation: Option<Epoch>,
    last_shape_check: Option<Epoch>,
    last_wall_refresh: Option<Instant>,
}

impl OrbitShapeCache {
    pub fn new(config: ShapeCacheConfig) -> Self {
        Self {
            config: ShapeCacheConfig {
                segments: config.segments.max(3),
                ..config
            },
            entries: Vec::new(),
            vertices: Vec::new(),
            last_orientation: None,
            last_shape_check: None,
            last_wall_refresh: None,
        }
    }

    pub fn config(&self) -> &ShapeCacheConfig {
        &self.config
    }

    pub fn entries(&self) -> &[OrbitShapeEntry] {
        &self.entries
    }

    /// Line-list geometry for every cached orbit
    pub fn vertices(&self) -> &[OrbitVertex] {
        &self.vertices
    }

    /// Rebuild every entry from scratch (new population).
    pub fn rebuild(&mut self, objects: &[Arc<OrbitalObject>], epoch: Epoch, now: Instant) {
        let segments = self.config.segments;
        self.entries = objects
            .iter()
            .map(|object| {
                let a = object
                    .decayed_semi_major_axis(epoch)
                    .unwrap_or(object.elements.semi_major_axis_km);
                let mut entry = OrbitShapeEntry::build(object, a, segments);
                entry.orient(object, epoch);
                entry
            })
            .collect();

        self.last_orientation = Some(epoch);
        self.last_shape_check = Some(epoch);
        self.last_wall_refresh = Some(now);
        self.rebuild_vertices();

        log::debug!(
            "Built orbit shapes for {} objects ({} segments)",
            self.entries.len(),
            segments
        );
    }

    fn population_matches(&self, objects: &[Arc<OrbitalObject>]) -> bool {
        self.entries.len() == objects.len()
            && self
                .entries
                .iter()
                .zip(objects)
                .all(|(entry, object)| entry.object_id == object.id)
    }

    /// Apply the refresh policy for the current simulated `epoch`.
    ///
    /// `objects` must be in the same order as at the last rebuild; a changed
    /// population triggers a full rebuild.
    pub fn update(
        &mut self,
        objects: &[Arc<OrbitalObject>],
        epoch: Epoch,
        now: Instant,
    ) -> RefreshOutcome {
        if !self.population_matches(objects) {
            self.rebuild(objects, epoch, now);
            return RefreshOutcome {
                orientations_refreshed: true,
                shapes_rebuilt: self.entries.len(),
            };
        }

        let mut outcome = RefreshOutcome::default();

        let shape_due = self
            .last_shape_check
            .map_or(true, |t| epoch.seconds_since(t).abs() > self.config.shape_check_interval_s);
        if shape_due {
            outcome.shapes_rebuilt = self.rebuild_decayed_shapes(objects, epoch);
            self.last_shape_check = Some(epoch);
        }

        let wall_ready = self
            .last_wall_refresh
            .map_or(true, |t| now.saturating_duration_since(t) >= self.config.min_refresh_interval());
        let sim_ready = self
            .last_orientation
            .map_or(true, |t| epoch.seconds_since(t).abs() > self.config.orientation_interval_s);

        if wall_ready && sim_ready {
            self.refresh_orientation(objects, epoch);
            self.last_wall_refresh = Some(now);
            outcome.orientations_refreshed = true;
        }

        if outcome.shapes_rebuilt > 0 && !outcome.orientations_refreshed {
            self.rebuild_vertices();
        }

        outcome
    }

    /// Rotate every cached shape to the orientation at `epoch`.
    pub fn refresh_orientation(&mut self, objects: &[Arc<OrbitalObject>], epoch: Epoch) {
        for (entry, object) in self.entries.iter_mut().zip(objects) {
            entry.orient(object, epoch);
        }
        self.last_orientation = Some(epoch);
        self.rebuild_vertices();
    }

    /// Regenerate shapes whose semi-major axis has decayed past the
    /// threshold. Rebuilt entries are re-oriented immediately. Returns the
    /// number of rebuilt entries.
    pub fn rebuild_decayed_shapes(&mut self, objects: &[Arc<OrbitalObject>], epoch: Epoch) -> usize {
        let segments = self.config.segments;
        let threshold = self.config.decay_threshold_km;
        let mut rebuilt = 0;

        for (entry, object) in self.entries.iter_mut().zip(objects) {
            let Some(a) = object.decayed_semi_major_axis(epoch) else {
                continue;
            };
            if (a - entry.built_semi_major_axis_km).abs() > threshold {
                *entry = OrbitShapeEntry::build(object, a, segments);
                entry.orient(object, epoch);
                rebuilt += 1;
            }
        }

        if rebuilt > 0 {
            log::debug!("Rebuilt {} decayed orbit shapes", rebuilt);
        }
        rebuilt
    }

    fn rebuild_vertices(&mut self) {
        self.vertices.clear();
        self.vertices
            .reserve(self.entries.len() * self.config.segments * 2);

        for entry in &self.entries {
            for pair in entry.inertial.windows(2) {
                for point in pair {
                    self.vertices.push(OrbitVertex {
                        position: to_render_space(point).to_array(),
                        color: entry.color,
                    });
                }
            }
        }
    }
}
