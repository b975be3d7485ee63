//! Track selection and feature extraction
//!
//! - [`filter`] - which tracks are eligible for classification
//! - [`encoder`] - fixed-order feature rows for admitted tracks
//!
//! [`extract_batch`] runs both over an event's tracks and keeps the admitted
//! rows in track order together with their ids.

pub mod encoder;
pub mod filter;

pub use encoder::{encode, tof_beta, PidSigmas, TrackMeasurements, SPEED_OF_LIGHT_CM_PER_PS};
pub use filter::{AdmittedTrack, Rejection, TrackFilter};

use crate::event::{PidProvider, TrackRecord};
use crate::types::FeatureBatch;
use std::collections::HashMap;

/// Admission counters accumulated over a run
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub admitted: u64,
    pub rejected: HashMap<Rejection, u64>,
}

impl FilterStats {
    pub fn record(&mut self, outcome: Result<(), Rejection>) {
        match outcome {
            Ok(()) => self.admitted += 1,
            Err(reason) => *self.rejected.entry(reason).or_insert(0) += 1,
        }
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }
}

/// Filter and encode an event's tracks, preserving their order
pub fn extract_batch(
    tracks: &[TrackRecord],
    filter: &TrackFilter,
    pid: &dyn PidProvider,
    stats: &mut FilterStats,
) -> FeatureBatch {
    let mut batch = FeatureBatch::with_capacity(tracks.len());
    for track in tracks {
        match filter.admit(track, pid) {
            Ok(admitted) => {
                batch.push(admitted.id, encode(&admitted.measurements));
                stats.record(Ok(()));
            }
            Err(reason) => {
                tracing::trace!("Track {} rejected: {}", track.id, reason);
                stats.record(Err(reason));
            }
        }
    }
    batch
}
