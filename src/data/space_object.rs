//! Catalog file records
//!
//! A catalog is a JSON object keyed by catalog number (as a string):
//! `{ "generated_at": ..., "objects": { "25544": { ... } } }`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::propagation::{ElementError, OrbitalObject};

/// Root of a JSON catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceObjectDatabase {
    pub generated_at: String,
    pub objects: HashMap<String, SpaceObject>,
}

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceObject {
    pub norad_cat_id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decay_date: Option<String>,
    #[serde(default)]
    pub tle: Option<TleData>,
    /// Visual magnitude at 1000 km range and 90° phase
    #[serde(default)]
    pub standard_magnitude: Option<f64>,
}

/// Two-line element set as stored in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TleData {
    pub epoch: String,
    pub line1: String,
    pub line2: String,
}

impl SpaceObject {
    /// Display name, falling back to the catalog number
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", self.norad_cat_id))
    }

    pub fn is_decayed(&self) -> bool {
        self.decay_date.is_some()
    }

    /// Build a propagatable object, `None` when the entry carries no elements
    pub fn to_orbital_object(&self) -> Option<Result<OrbitalObject, ElementError>> {
        let tle = self.tle.as_ref()?;
        let name = self.display_name();
        Some(OrbitalObject::from_tle(Some(&name), &tle.line1, &tle.line2))
    }
}
