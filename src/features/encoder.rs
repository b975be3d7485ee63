//! Feature encoder
//!
//! Turns the measured quantities of an admitted track into a
//! [`TrackFeatureRow`] in wire order. Pure; the only derived quantity is the
//! TOF velocity ratio.

use crate::event::{TrackRecord, COVARIANCE_SIZE};
use crate::types::{FeatureField, TrackFeatureRow};

/// Speed of light in cm/ps
pub const SPEED_OF_LIGHT_CM_PER_PS: f64 = 2.99792458e-2;

/// n-sigma deviations for pion, kaon, proton, electron (in that order)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidSigmas {
    pub tof: [f64; 4],
    pub tpc: [f64; 4],
}

/// Everything the encoder needs from one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMeasurements {
    pub tpc_clusters: f64,
    pub tpc_signal: f64,
    pub p: f64,
    pub pt: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub sigmas: PidSigmas,
    /// v/c from the TOF measurement
    pub beta: f64,
    pub covariance: [f64; COVARIANCE_SIZE],
}

impl TrackMeasurements {
    /// Collect measurements from a host track
    ///
    /// `tof_time` is the start-time corrected TOF signal; the filter guarantees
    /// it is non-zero.
    pub fn from_track(
        track: &TrackRecord,
        covariance: &[f64; COVARIANCE_SIZE],
        sigmas: PidSigmas,
        tof_time: f64,
    ) -> Self {
        Self {
            tpc_clusters: f64::from(track.tpc_clusters),
            tpc_signal: track.tpc_signal,
            p: track.p,
            pt: track.pt,
            px: track.px,
            py: track.py,
            pz: track.pz,
            sigmas,
            beta: tof_beta(track.integrated_length, tof_time),
            covariance: *covariance,
        }
    }
}

/// Velocity over c from track length (cm) and flight time (ps)
pub fn tof_beta(integrated_length: f64, tof_time: f64) -> f64 {
    (integrated_length / tof_time) / SPEED_OF_LIGHT_CM_PER_PS
}

/// Encode measurements into a wire-ordered feature row
pub fn encode(m: &TrackMeasurements) -> TrackFeatureRow {
    let mut row = TrackFeatureRow::default();

    row[FeatureField::TpcClusters] = m.tpc_clusters as f32;
    row[FeatureField::TpcSignal] = m.tpc_signal as f32;
    row[FeatureField::P] = m.p as f32;
    row[FeatureField::Pt] = m.pt as f32;
    row[FeatureField::Px] = m.px as f32;
    row[FeatureField::Py] = m.py as f32;
    row[FeatureField::Pz] = m.pz as f32;

    row[FeatureField::TofNSigmaPion] = m.sigmas.tof[0] as f32;
    row[FeatureField::TofNSigmaKaon] = m.sigmas.tof[1] as f32;
    row[FeatureField::TofNSigmaProton] = m.sigmas.tof[2] as f32;
    row[FeatureField::TofNSigmaElectron] = m.sigmas.tof[3] as f32;
    row[FeatureField::TpcNSigmaPion] = m.sigmas.tpc[0] as f32;
    row[FeatureField::TpcNSigmaKaon] = m.sigmas.tpc[1] as f32;
    row[FeatureField::TpcNSigmaProton] = m.sigmas.tpc[2] as f32;
    row[FeatureField::TpcNSigmaElectron] = m.sigmas.tpc[3] as f32;

    row[FeatureField::TofBeta] = m.beta as f32;

    for (field, cov_index) in FeatureField::COVARIANCE {
        row[field] = m.covariance[cov_index] as f32;
    }

    row
}
