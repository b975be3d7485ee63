//! Track admission policy
//!
//! A track is admitted when it passes the filter bit, the eta and pt windows,
//! has a covariance matrix, reports OK PID status in TOF and TPC for all four
//! hypotheses and has a non-zero corrected TOF time. Anything else is a
//! [`Rejection`], which is a filtering decision and never an error.

use super::encoder::{PidSigmas, TrackMeasurements};
use crate::config::TrackCuts;
use crate::event::{Detector, PidProvider, PidStatus, Species, TrackRecord};
use crate::types::TrackId;

/// Why a track was left out of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    FilterBit,
    Eta,
    Pt,
    NoCovariance,
    PidStatus(Detector, Species),
    ZeroTofTime,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::FilterBit => write!(f, "filter bit"),
            Rejection::Eta => write!(f, "eta out of range"),
            Rejection::Pt => write!(f, "pt out of range"),
            Rejection::NoCovariance => write!(f, "no covariance"),
            Rejection::PidStatus(detector, species) => {
                write!(f, "{:?} PID not OK for {:?}", detector, species)
            }
            Rejection::ZeroTofTime => write!(f, "zero TOF time"),
        }
    }
}

/// A track that passed every cut, with what the encoder needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmittedTrack {
    pub id: TrackId,
    pub mc_pdg: Option<i32>,
    pub measurements: TrackMeasurements,
}

/// Admission policy built from [`TrackCuts`]
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    cuts: TrackCuts,
}

impl TrackFilter {
    pub fn new(cuts: TrackCuts) -> Self {
        Self { cuts }
    }

    pub fn cuts(&self) -> &TrackCuts {
        &self.cuts
    }

    /// Kinematic acceptance and covariance availability
    pub fn is_track_valid(&self, eta: f64, pt: f64, has_covariance: bool) -> Result<(), Rejection> {
        if !self.cuts.eta_in_range(eta) {
            return Err(Rejection::Eta);
        }
        if !self.cuts.pt_in_range(pt) {
            return Err(Rejection::Pt);
        }
        if !has_covariance {
            return Err(Rejection::NoCovariance);
        }
        Ok(())
    }

    fn sigmas_for(
        detector: Detector,
        track: &TrackRecord,
        pid: &dyn PidProvider,
    ) -> Result<[f64; 4], Rejection> {
        let mut values = [0.0; 4];
        for species in Species::HYPOTHESES {
            let (status, value) = pid.n_sigma(detector, species, track);
            if status != PidStatus::Ok {
                return Err(Rejection::PidStatus(detector, species));
            }
            values[species.index()] = value;
        }
        Ok(values)
    }

    /// Run every cut in order and collect the measurements of a passing track
    pub fn admit(&self, track: &TrackRecord, pid: &dyn PidProvider) -> Result<AdmittedTrack, Rejection> {
        if !track.test_filter_bit(self.cuts.filter_bit) {
            return Err(Rejection::FilterBit);
        }

        self.is_track_valid(track.eta, track.pt, track.covariance.is_some())?;
        let covariance = track.covariance.as_ref().ok_or(Rejection::NoCovariance)?;

        let sigmas = PidSigmas {
            tof: Self::sigmas_for(Detector::Tof, track, pid)?,
            tpc: Self::sigmas_for(Detector::Tpc, track, pid)?,
        };

        let tof_time = track.corrected_tof_time();
        if tof_time == 0.0 {
            return Err(Rejection::ZeroTofTime);
        }

        Ok(AdmittedTrack {
            id: track.id,
            mc_pdg: track.mc_pdg,
            measurements: TrackMeasurements::from_track(track, covariance, sigmas, tof_time),
        })
    }
}
