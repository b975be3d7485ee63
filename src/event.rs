//! Host-side event model and collaborator interfaces
//!
//! The analysis host owns event iteration and the PID machinery. This module
//! describes what the tasks consume from it:
//!
//! - [`Event`] / [`TrackRecord`] - reconstructed event content
//! - [`PidProvider`] - n-sigma deviations per detector and mass hypothesis
//! - [`PidRegistry`] - where classification results are published
//!
//! [`RecordedPid`] and [`ResponseRegistry`] are plain in-memory
//! implementations used by the replay driver and by tests.

use crate::types::{TrackId, TrackResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of entries in the XYZ/PxPyPz lower-triangular covariance
pub const COVARIANCE_SIZE: usize = 21;

/// PID detector subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detector {
    Tpc,
    Tof,
}

/// Mass hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Pion,
    Kaon,
    Proton,
    Electron,
}

impl Species {
    /// Hypotheses checked for every track, in feature order
    pub const HYPOTHESES: [Species; 4] = [
        Species::Pion,
        Species::Kaon,
        Species::Proton,
        Species::Electron,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Species::Pion => 0,
            Species::Kaon => 1,
            Species::Proton => 2,
            Species::Electron => 3,
        }
    }
}

/// Detector response status for one n-sigma query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PidStatus {
    Ok,
    NoSignal,
    NoParams,
    Mismatch,
}

/// Placeholder value reported when a detector has no n-sigma for a track
pub const NO_SIGMA: f64 = -9999.0;

/// Primary vertex of an event
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub contributors: i32,
}

/// n-sigma values recorded alongside a track (one slot per hypothesis)
///
/// `None` means the detector reported no usable signal for that hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordedPid {
    #[serde(default)]
    pub tof: [Option<f64>; 4],
    #[serde(default)]
    pub tpc: [Option<f64>; 4],
}

impl RecordedPid {
    /// All hypotheses present for both detectors
    pub fn complete(tof: [f64; 4], tpc: [f64; 4]) -> Self {
        Self {
            tof: tof.map(Some),
            tpc: tpc.map(Some),
        }
    }
}

/// One reconstructed track as handed over by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: TrackId,
    /// Bitmask of track-selection filters this track passed
    pub filter_map: u32,
    pub eta: f64,
    pub pt: f64,
    pub p: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub tpc_clusters: u16,
    /// TPC dE/dx signal
    pub tpc_signal: f64,
    /// Raw TOF signal (ps)
    pub tof_signal: f64,
    /// Event start time at this track's momentum (ps)
    pub tof_start_time: f64,
    /// Track length up to the TOF (cm)
    pub integrated_length: f64,
    /// `None` when the covariance could not be propagated
    #[serde(default)]
    pub covariance: Option<[f64; COVARIANCE_SIZE]>,
    #[serde(default)]
    pub pid: RecordedPid,
    /// Monte-Carlo truth PDG code, when the input is simulated
    #[serde(default)]
    pub mc_pdg: Option<i32>,
}

impl TrackRecord {
    /// Host "test filter bit" semantics: any of the requested bits set
    pub fn test_filter_bit(&self, mask: u32) -> bool {
        self.filter_map & mask != 0
    }

    /// TOF signal corrected for the event start time
    pub fn corrected_tof_time(&self) -> f64 {
        self.tof_signal - self.tof_start_time
    }
}

/// One collision event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    /// Reference multiplicity from the event header (negative when invalid)
    pub ref_multiplicity: f64,
    #[serde(default)]
    pub vertex: Option<Vertex>,
    /// Pile-up flag as computed by the host's event utilities
    #[serde(default)]
    pub pile_up: bool,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

/// Source of PID n-sigma deviations
#[cfg_attr(test, mockall::automock)]
pub trait PidProvider {
    /// Deviation of the measured response from the expectation for `species`
    fn n_sigma(&self, detector: Detector, species: Species, track: &TrackRecord) -> (PidStatus, f64);
}

/// Provider answering from the values recorded on each track
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedPidProvider;

impl PidProvider for RecordedPidProvider {
    fn n_sigma(&self, detector: Detector, species: Species, track: &TrackRecord) -> (PidStatus, f64) {
        let slot = match detector {
            Detector::Tof => track.pid.tof[species.index()],
            Detector::Tpc => track.pid.tpc[species.index()],
        };
        match slot {
            Some(value) => (PidStatus::Ok, value),
            None => (PidStatus::NoSignal, NO_SIGMA),
        }
    }
}

/// Sink for per-track classification results
///
/// The host clears it at the start of every event; publishers never do.
pub trait PidRegistry {
    fn set_response(&mut self, track: TrackId, result: TrackResult);
    fn clear(&mut self);
}

/// In-memory registry keyed by track id
#[derive(Debug, Clone, Default)]
pub struct ResponseRegistry {
    responses: HashMap<TrackId, TrackResult>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, track: TrackId) -> Option<&TrackResult> {
        self.responses.get(&track)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Results sorted by track id
    pub fn sorted(&self) -> Vec<(TrackId, &TrackResult)> {
        let mut entries: Vec<_> = self.responses.iter().map(|(id, r)| (*id, r)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl PidRegistry for ResponseRegistry {
    fn set_response(&mut self, track: TrackId, result: TrackResult) {
        self.responses.insert(track, result);
    }

    fn clear(&mut self) {
        self.responses.clear();
    }
}
