//! Selection settings for events and tracks
//!
//! These are the thresholds the tasks apply before any classification work.
//! Bounds are inclusive: a value sitting exactly on a bound passes.
//!
//! # Main Types
//!
//! - [`TrackCuts`] - Per-track admission thresholds
//! - [`EventCuts`] - Per-event selection thresholds

use serde::{Deserialize, Serialize};

/// Default track-selection filter bit mask
pub const DEFAULT_FILTER_BIT: u32 = 96;

/// Track admission thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackCuts {
    /// Host filter-bit mask the track must pass
    pub filter_bit: u32,

    /// Pseudorapidity acceptance (inclusive)
    pub eta_min: f64,
    pub eta_max: f64,

    /// Transverse momentum acceptance in GeV/c (inclusive)
    pub pt_min: f64,
    pub pt_max: f64,
}

impl Default for TrackCuts {
    fn default() -> Self {
        Self {
            filter_bit: DEFAULT_FILTER_BIT,
            eta_min: -0.8,
            eta_max: 0.8,
            pt_min: 0.2,
            pt_max: 20.0,
        }
    }
}

impl TrackCuts {
    pub fn eta_in_range(&self, eta: f64) -> bool {
        !(eta < self.eta_min || eta > self.eta_max)
    }

    pub fn pt_in_range(&self, pt: f64) -> bool {
        !(pt < self.pt_min || pt > self.pt_max)
    }

    /// Check the ranges are usable
    pub fn validate(&self) -> Result<(), String> {
        if self.eta_min > self.eta_max {
            return Err(format!(
                "eta range is inverted ({} > {})",
                self.eta_min, self.eta_max
            ));
        }
        if self.pt_min > self.pt_max {
            return Err(format!(
                "pt range is inverted ({} > {})",
                self.pt_min, self.pt_max
            ));
        }
        if self.filter_bit == 0 {
            return Err("filter bit mask must not be zero".to_string());
        }
        Ok(())
    }
}

/// Event selection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCuts {
    /// Maximum |z| of the primary vertex in cm
    pub max_vertex_z: f64,

    /// Minimum number of vertex contributors
    pub min_vertex_contributors: i32,

    /// Reject events the host flagged as pile-up
    pub reject_pile_up: bool,
}

impl Default for EventCuts {
    fn default() -> Self {
        Self {
            max_vertex_z: 10.0,
            min_vertex_contributors: 1,
            reject_pile_up: true,
        }
    }
}

impl EventCuts {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_vertex_z > 0.0) {
            return Err(format!(
                "max_vertex_z must be positive, got {}",
                self.max_vertex_z
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_cuts_defaults() {
        let cuts = TrackCuts::default();
        assert_eq!(cuts.filter_bit, 96);
        assert!(cuts.eta_in_range(0.8));
        assert!(cuts.eta_in_range(-0.8));
        assert!(!cuts.eta_in_range(0.8001));
        assert!(cuts.pt_in_range(0.2));
        assert!(cuts.pt_in_range(20.0));
        assert!(!cuts.pt_in_range(0.199));
        assert!(!cuts.pt_in_range(20.001));
    }

    #[test]
    fn test_track_cuts_validation() {
        let mut cuts = TrackCuts::default();
        assert!(cuts.validate().is_ok());

        cuts.pt_min = 30.0;
        assert!(cuts.validate().is_err());
    }

    #[test]
    fn test_event_cuts_partial_deserialize() {
        let cuts: EventCuts = serde_json::from_str(r#"{"max_vertex_z": 7.5}"#).unwrap();
        assert_eq!(cuts.max_vertex_z, 7.5);
        assert!(cuts.reject_pile_up);
        assert_eq!(cuts.min_vertex_contributors, 1);
    }
}
