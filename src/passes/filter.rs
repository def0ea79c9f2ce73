//! Pass acceptance criteria

use serde::{Deserialize, Serialize};

/// Azimuth range in degrees, wrapping through north when `min > max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AzimuthBounds")]
pub struct AzimuthWindow {
    pub min: f64,
    pub max: f64,
}

/// Window bounds as written in a config file, before normalization
#[derive(Deserialize)]
struct AzimuthBounds {
    min: f64,
    max: f64,
}

impl From<AzimuthBounds> for AzimuthWindow {
    fn from(bounds: AzimuthBounds) -> Self {
        Self::new(bounds.min, bounds.max)
    }
}

impl AzimuthWindow {
    /// Every azimuth
    pub const FULL: Self = Self {
        min: 0.0,
        max: 360.0,
    };

    /// Normalize both bounds into `[0, 360)`. A span of a full turn or more
    /// is kept as [`AzimuthWindow::FULL`].
    pub fn new(min: f64, max: f64) -> Self {
        if max - min >= 360.0 {
            return Self::FULL;
        }
        Self {
            min: min.rem_euclid(360.0),
            max: max.rem_euclid(360.0),
        }
    }

    pub fn contains(&self, azimuth: f64) -> bool {
        let az = azimuth.rem_euclid(360.0);
        if self.min <= self.max {
            az >= self.min && az <= self.max
        } else {
            az >= self.min || az <= self.max
        }
    }
}

/// Minimum usable elevation at eight azimuths 45° apart, starting at north
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HorizonMask(pub [f64; 8]);

impl HorizonMask {
    const SPACING_DEG: f64 = 45.0;

    /// Mask elevation at `azimuth`, linearly interpolated between the two
    /// neighbouring points (wrapping from 315° back to 0°)
    pub fn elevation_at(&self, azimuth: f64) -> f64 {
        let az = azimuth.rem_euclid(360.0);
        let position = az / Self::SPACING_DEG;
        let index = (position.floor() as usize) % 8;
        let next = (index + 1) % 8;
        let t = position - position.floor();
        self.0[index] * (1.0 - t) + self.0[next] * t
    }
}

/// How strict the sun/eclipse condition is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityClass {
    /// Every geometric pass
    #[default]
    Any,
    /// Observer in astronomical twilight or darker and object sunlit
    Observable,
    /// Observable and brighter than the naked-eye limit
    NakedEye,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassFilter {
    /// Peak elevation floor (degrees)
    pub min_elevation: f64,
    /// Peak elevation ceiling (degrees)
    pub max_elevation: Option<f64>,
    pub azimuth_window: Option<AzimuthWindow>,
    pub horizon_mask: HorizonMask,
    /// Minimum time spent inside the window and above the mask (seconds)
    pub min_duration_s: f64,
    pub visibility: VisibilityClass,
}

impl Default for PassFilter {
    fn default() -> Self {
        Self {
            min_elevation: 10.0,
            max_elevation: None,
            azimuth_window: None,
            horizon_mask: HorizonMask::default(),
            min_duration_s: 0.0,
            visibility: VisibilityClass::Any,
        }
    }
}

impl PassFilter {
    pub fn accepts_peak(&self, elevation: f64) -> bool {
        elevation >= self.min_elevation && self.max_elevation.map_or(true, |max| elevation <= max)
    }

    /// Whether a sky position is inside the azimuth window and above the mask
    pub fn accepts_direction(&self, azimuth: f64, elevation: f64) -> bool {
        let in_window = self.azimuth_window.map_or(true, |w| w.contains(azimuth));
        in_window && elevation >= self.horizon_mask.elevation_at(azimuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azimuth_window_wraps() {
        let window = AzimuthWindow::new(350.0, 10.0);
        assert!(window.contains(355.0));
        assert!(window.contains(5.0));
        assert!(window.contains(0.0));
        assert!(!window.contains(180.0));
        assert!(!window.contains(20.0));
    }

    #[test]
    fn test_azimuth_window_plain() {
        let window = AzimuthWindow::new(90.0, 180.0);
        assert!(window.contains(135.0));
        assert!(window.contains(-225.0));
        assert!(!window.contains(270.0));
    }

    #[test]
    fn test_full_turn_window() {
        for (min, max) in [(0.0, 360.0), (-180.0, 180.0), (10.0, 400.0)] {
            let window = AzimuthWindow::new(min, max);
            assert_eq!(window, AzimuthWindow::FULL);
            assert!(window.contains(0.0));
            assert!(window.contains(180.0));
            assert!(window.contains(359.9));
        }
        let sliver = AzimuthWindow::new(0.0, 359.0);
        assert!(!sliver.contains(359.5));
    }

    #[test]
    fn test_window_from_config_is_normalized() {
        let filter: PassFilter =
            serde_json::from_str(r#"{"azimuth_window":{"min":-10.0,"max":10.0}}"#).unwrap();
        let window = filter.azimuth_window.unwrap();
        assert_eq!(window, AzimuthWindow::new(350.0, 10.0));
        assert!(window.contains(355.0));
        assert!(window.contains(5.0));
        assert!(!window.contains(90.0));

        let full: AzimuthWindow = serde_json::from_str(r#"{"min":0.0,"max":360.0}"#).unwrap();
        assert!(full.contains(180.0));
    }

    #[test]
    fn test_horizon_mask_interpolation() {
        let mask = HorizonMask([10.0, 20.0, 0.0, 0.0, 0.0, 0.0, 0.0, 30.0]);
        assert!((mask.elevation_at(0.0) - 10.0).abs() < 1e-12);
        assert!((mask.elevation_at(22.5) - 15.0).abs() < 1e-12);
        assert!((mask.elevation_at(45.0) - 20.0).abs() < 1e-12);
        // 315 -> 360 wraps back to the north point
        assert!((mask.elevation_at(337.5) - 20.0).abs() < 1e-12);
        assert!((mask.elevation_at(-22.5) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_peak_bounds() {
        let filter = PassFilter {
            min_elevation: 20.0,
            max_elevation: Some(60.0),
            ..Default::default()
        };
        assert!(!filter.accepts_peak(15.0));
        assert!(filter.accepts_peak(45.0));
        assert!(!filter.accepts_peak(75.0));
    }

    #[test]
    fn test_direction_filter() {
        let filter = PassFilter {
            azimuth_window: Some(AzimuthWindow::new(350.0, 10.0)),
            horizon_mask: HorizonMask([15.0; 8]),
            ..Default::default()
        };
        assert!(filter.accepts_direction(5.0, 20.0));
        assert!(!filter.accepts_direction(5.0, 10.0));
        assert!(!filter.accepts_direction(180.0, 80.0));
    }
}
