//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{EventBuilder, TrackBuilder};
use common::mock_helpers::{spawn_peer, MockPid};
use mlpid::channel::{ClassifierLink, UniformClassifier};
use mlpid::config::TrackCuts;
use mlpid::event::{Detector, PidProvider, PidStatus, RecordedPidProvider, Species};
use mlpid::features::{tof_beta, TrackFilter, SPEED_OF_LIGHT_CM_PER_PS};
use mlpid::types::TrackId;
use mlpid::Framing;

#[test]
fn test_infrastructure_setup() {
    let event = EventBuilder::new(7)
        .track(TrackBuilder::new(1).build())
        .track(TrackBuilder::new(2).pt(5.0).build())
        .build();

    assert_eq!(event.id, 7);
    assert_eq!(event.tracks.len(), 2);
    assert_eq!(event.tracks[1].id, TrackId(2));
}

#[test]
fn test_mock_pid_provider() {
    let mut pid = MockPid::new();
    pid.expect_n_sigma()
        .times(1)
        .returning(|_, _, _| (PidStatus::Ok, 1.5));

    let track = TrackBuilder::new(1).build();
    assert_eq!(
        pid.n_sigma(Detector::Tof, Species::Kaon, &track),
        (PidStatus::Ok, 1.5)
    );
}

#[test]
fn test_spawned_peer_shuts_down() {
    let (mut channel, peer) = spawn_peer(Framing::Binary, vec![211], UniformClassifier);
    channel.handshake().unwrap();
    channel.shutdown().unwrap();

    let stats = peer.join().unwrap().unwrap();
    assert_eq!(stats.handshakes, 1);
    assert_eq!(stats.batches, 0);
}

#[test]
fn test_default_built_track_is_admitted() {
    let filter = TrackFilter::new(TrackCuts::default());
    let track = TrackBuilder::new(1).build();
    assert!(filter.admit(&track, &RecordedPidProvider).is_ok());

    // A particle crossing the TOF at light speed has beta 1
    common::assert_float_eq(tof_beta(SPEED_OF_LIGHT_CM_PER_PS * 1000.0, 1000.0), 1.0, 1e-12);
}
