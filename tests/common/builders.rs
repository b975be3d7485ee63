//! Test data builders for creating test objects

use mlpid::event::{RecordedPid, Species, TrackRecord, Vertex, COVARIANCE_SIZE};
use mlpid::types::TrackId;
use mlpid::Event;

/// Builder for tracks that pass every default cut unless told otherwise
pub struct TrackBuilder {
    track: TrackRecord,
}

impl TrackBuilder {
    pub fn new(id: i32) -> Self {
        let mut covariance = [0.0; COVARIANCE_SIZE];
        for (i, c) in covariance.iter_mut().enumerate() {
            *c = 0.001 * (i + 1) as f64;
        }
        Self {
            track: TrackRecord {
                id: TrackId(id),
                filter_map: 96,
                eta: 0.1,
                pt: 1.0,
                p: 1.1,
                px: 0.8,
                py: 0.6,
                pz: 0.45,
                tpc_clusters: 120,
                tpc_signal: 55.0,
                tof_signal: 14_000.0,
                tof_start_time: 25.0,
                integrated_length: 390.0,
                covariance: Some(covariance),
                pid: RecordedPid::complete([0.3, 2.5, 4.0, 6.0], [0.5, 3.0, 5.0, 7.0]),
                mc_pdg: None,
            },
        }
    }

    pub fn eta(mut self, eta: f64) -> Self {
        self.track.eta = eta;
        self
    }

    pub fn pt(mut self, pt: f64) -> Self {
        self.track.pt = pt;
        self
    }

    pub fn filter_map(mut self, filter_map: u32) -> Self {
        self.track.filter_map = filter_map;
        self
    }

    pub fn no_covariance(mut self) -> Self {
        self.track.covariance = None;
        self
    }

    pub fn tof_sigmas(mut self, sigmas: [f64; 4]) -> Self {
        self.track.pid.tof = sigmas.map(Some);
        self
    }

    pub fn tpc_sigmas(mut self, sigmas: [f64; 4]) -> Self {
        self.track.pid.tpc = sigmas.map(Some);
        self
    }

    pub fn missing_tof(mut self, species: Species) -> Self {
        self.track.pid.tof[species.index()] = None;
        self
    }

    pub fn zero_tof_time(mut self) -> Self {
        self.track.tof_start_time = self.track.tof_signal;
        self
    }

    pub fn mc_pdg(mut self, pdg: i32) -> Self {
        self.track.mc_pdg = Some(pdg);
        self
    }

    pub fn build(self) -> TrackRecord {
        self.track
    }
}

/// Builder for events that pass the default event selection
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            event: Event {
                id,
                ref_multiplicity: 25.0,
                vertex: Some(Vertex {
                    x: 0.01,
                    y: -0.02,
                    z: 1.5,
                    contributors: 12,
                }),
                pile_up: false,
                tracks: Vec::new(),
            },
        }
    }

    pub fn track(mut self, track: TrackRecord) -> Self {
        self.event.tracks.push(track);
        self
    }

    pub fn tracks(mut self, tracks: impl IntoIterator<Item = TrackRecord>) -> Self {
        self.event.tracks.extend(tracks);
        self
    }

    pub fn vertex_z(mut self, z: f64) -> Self {
        if let Some(vertex) = self.event.vertex.as_mut() {
            vertex.z = z;
        }
        self
    }

    pub fn no_vertex(mut self) -> Self {
        self.event.vertex = None;
        self
    }

    pub fn pile_up(mut self) -> Self {
        self.event.pile_up = true;
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_builder() {
        let track = TrackBuilder::new(4).pt(3.0).mc_pdg(321).build();
        assert_eq!(track.id, TrackId(4));
        assert_eq!(track.pt, 3.0);
        assert_eq!(track.mc_pdg, Some(321));
        assert!(track.test_filter_bit(96));
    }
}
