//! Mock construction helpers

use mlpid::channel::{
    connected_pair, Classifier, ClassifierChannel, ClassifierPeer, Endpoints, PeerStats,
    PipeReader, PipeWriter,
};
use mlpid::event::{Detector, PidProvider, PidStatus, Species, TrackRecord};
use mlpid::types::{ClassVocabulary, FeatureField, ProbabilityRow, TrackFeatureRow};
use mlpid::Framing;
use std::thread::JoinHandle;

mockall::mock! {
    pub Pid {}

    impl PidProvider for Pid {
        fn n_sigma(&self, detector: Detector, species: Species, track: &TrackRecord) -> (PidStatus, f64);
    }
}

/// Channel end held by the task in tests
pub type MemoryChannel = ClassifierChannel<PipeReader, PipeWriter>;

/// Puts all weight on the class at index `pt mod classes`
///
/// Lets a test see which request row produced which response row.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtIndexClassifier;

impl Classifier for PtIndexClassifier {
    fn classify(&mut self, vocabulary: &ClassVocabulary, row: &TrackFeatureRow) -> ProbabilityRow {
        let hot = row[FeatureField::Pt] as usize % vocabulary.len();
        ProbabilityRow(
            (0..vocabulary.len())
                .map(|i| if i == hot { 1.0 } else { 0.0 })
                .collect(),
        )
    }
}

/// Run a classifier peer on its own thread, connected by in-memory pipes
pub fn spawn_peer<C>(
    framing: Framing,
    classes: Vec<i32>,
    classifier: C,
) -> (MemoryChannel, JoinHandle<mlpid::Result<PeerStats>>)
where
    C: Classifier + Send + 'static,
{
    let (task_side, peer_side) = connected_pair();
    let vocabulary = ClassVocabulary::new(classes).expect("valid test vocabulary");

    let handle = std::thread::spawn(move || {
        let Endpoints { reader, writer } = peer_side;
        ClassifierPeer::new(framing, reader, writer, vocabulary, classifier).serve()
    });

    let channel = ClassifierChannel::new(framing, task_side.reader, task_side.writer);
    (channel, handle)
}
