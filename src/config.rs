//! Settings file
//!
//! JSON with every section optional; missing fields take their defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::passes::{PassSettings, WorkerConfig};
use crate::propagation::ShapeCacheConfig;
use crate::visibility::ObserverLocation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacepassConfig {
    pub shape_cache: ShapeCacheConfig,
    pub passes: PassSettings,
    pub worker: WorkerConfig,
    /// Default observer when none is given on the command line
    pub observer: Option<ObserverLocation>,
}

/// Read a config file
pub fn load_config(path: impl AsRef<Path>) -> Result<SpacepassConfig> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
    let config: SpacepassConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    log::debug!("Loaded config from {:?}", path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::VisibilityClass;

    #[test]
    fn test_defaults() {
        let config = SpacepassConfig::default();
        assert_eq!(config.shape_cache.segments, 90);
        assert_eq!(config.passes.step_s, 60.0);
        assert_eq!(config.passes.fine_step_s, 10.0);
        assert_eq!(config.passes.filter.min_elevation, 10.0);
        assert_eq!(config.worker.flush_interval_ms, 100);
        assert!(config.observer.is_none());
    }

    #[test]
    fn test_partial_file() {
        let json = r#"{
            "passes": { "duration_days": 3.0, "filter": { "visibility": "naked_eye" } },
            "observer": { "latitude_deg": 51.5, "longitude_deg": -0.1 }
        }"#;
        let config: SpacepassConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.passes.duration_days, 3.0);
        assert_eq!(config.passes.step_s, 60.0);
        assert_eq!(config.passes.filter.visibility, VisibilityClass::NakedEye);
        assert_eq!(config.passes.filter.min_elevation, 10.0);
        assert_eq!(config.worker, WorkerConfig::default());

        let observer = config.observer.unwrap();
        assert_eq!(observer.latitude_deg, 51.5);
        assert_eq!(observer.altitude_m, 0.0);
    }

    #[test]
    fn test_load_errors_carry_path() {
        let err = load_config("/nonexistent/spacepass.json").unwrap_err();
        assert!(format!("{:#}", err).contains("spacepass.json"));
    }
}
