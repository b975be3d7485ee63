//! Classifier side of the protocol
//!
//! [`ClassifierPeer`] answers requests until it reads the shutdown sentinel:
//! the handshake with its class vocabulary and each feature batch with one
//! probability row per track. The probabilities come from a [`Classifier`];
//! the ones shipped here stand in for a trained model in tests, benchmarks and
//! the `serve` command.
//!
//! - [`UniformClassifier`] - every class equally likely
//! - [`FixedClassifier`] - the same row for every track
//! - [`NSigmaClassifier`] - Gaussian weights from the TOF/TPC n-sigma features

use crate::codec::{Framing, Request};
use crate::error::{MlPidError, Result};
use crate::types::{
    ClassId, ClassVocabulary, FeatureField, ProbabilityBatch, ProbabilityRow, TrackFeatureRow,
};
use std::io::{BufRead, Write};

/// Turns one feature row into one probability per vocabulary class
#[cfg_attr(test, mockall::automock)]
pub trait Classifier {
    fn classify(&mut self, vocabulary: &ClassVocabulary, row: &TrackFeatureRow) -> ProbabilityRow;
}

/// Assigns `1 / classes` to every class
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformClassifier;

impl Classifier for UniformClassifier {
    fn classify(&mut self, vocabulary: &ClassVocabulary, _row: &TrackFeatureRow) -> ProbabilityRow {
        let p = 1.0 / vocabulary.len() as f32;
        ProbabilityRow(vec![p; vocabulary.len()])
    }
}

/// Answers every track with the same probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct FixedClassifier {
    row: Vec<f32>,
}

impl FixedClassifier {
    pub fn new(row: Vec<f32>) -> Self {
        Self { row }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&mut self, _vocabulary: &ClassVocabulary, _row: &TrackFeatureRow) -> ProbabilityRow {
        ProbabilityRow(self.row.clone())
    }
}

/// Weights each known species by `exp(-(tof² + tpc²) / 2)` of its n-sigma
/// features and normalizes over the vocabulary. Classes without n-sigma
/// features (muons, nuclei) get zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NSigmaClassifier;

impl NSigmaClassifier {
    fn sigma_fields(class: ClassId) -> Option<(FeatureField, FeatureField)> {
        match class.unsigned_abs() {
            211 => Some((FeatureField::TofNSigmaPion, FeatureField::TpcNSigmaPion)),
            321 => Some((FeatureField::TofNSigmaKaon, FeatureField::TpcNSigmaKaon)),
            2212 => Some((FeatureField::TofNSigmaProton, FeatureField::TpcNSigmaProton)),
            11 => Some((FeatureField::TofNSigmaElectron, FeatureField::TpcNSigmaElectron)),
            _ => None,
        }
    }
}

impl Classifier for NSigmaClassifier {
    fn classify(&mut self, vocabulary: &ClassVocabulary, row: &TrackFeatureRow) -> ProbabilityRow {
        let weights: Vec<f32> = vocabulary
            .iter()
            .map(|class| match Self::sigma_fields(class) {
                Some((tof, tpc)) => {
                    let (tof, tpc) = (row[tof], row[tpc]);
                    (-0.5 * (tof * tof + tpc * tpc)).exp()
                }
                None => 0.0,
            })
            .collect();

        let total: f32 = weights.iter().sum();
        if total > 0.0 {
            ProbabilityRow(weights.into_iter().map(|w| w / total).collect())
        } else {
            ProbabilityRow(weights)
        }
    }
}

/// Counters for a served session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    pub handshakes: u64,
    pub batches: u64,
    pub tracks: u64,
}

/// Serves one request/response session over a pair of streams
pub struct ClassifierPeer<R: BufRead, W: Write, C: Classifier> {
    framing: Framing,
    reader: R,
    writer: W,
    vocabulary: ClassVocabulary,
    classifier: C,
    stats: PeerStats,
}

impl<R: BufRead, W: Write, C: Classifier> ClassifierPeer<R, W, C> {
    pub fn new(
        framing: Framing,
        reader: R,
        writer: W,
        vocabulary: ClassVocabulary,
        classifier: C,
    ) -> Self {
        Self {
            framing,
            reader,
            writer,
            vocabulary,
            classifier,
            stats: PeerStats::default(),
        }
    }

    pub fn stats(&self) -> PeerStats {
        self.stats
    }

    /// Answer requests until the shutdown sentinel arrives
    ///
    /// The stream closing before the sentinel is a protocol error.
    pub fn serve(&mut self) -> Result<PeerStats> {
        tracing::info!(
            "Serving {} classes over {} framing",
            self.vocabulary.len(),
            self.framing
        );

        loop {
            match self.framing.read_request(&mut self.reader)? {
                Request::Handshake => {
                    self.framing
                        .write_vocabulary(&mut self.writer, &self.vocabulary)?;
                    self.writer.flush()?;
                    self.stats.handshakes += 1;
                    tracing::debug!("Sent vocabulary {}", self.vocabulary);
                }
                Request::Batch(rows) => {
                    let answer = self.classify_batch(&rows)?;
                    self.framing.write_probabilities(&mut self.writer, &answer)?;
                    self.writer.flush()?;
                    self.stats.batches += 1;
                    self.stats.tracks += rows.len() as u64;
                    tracing::trace!("Answered batch of {} tracks", rows.len());
                }
                Request::Shutdown => {
                    tracing::info!(
                        "Shutdown received after {} batches ({} tracks)",
                        self.stats.batches,
                        self.stats.tracks
                    );
                    return Ok(self.stats);
                }
            }
        }
    }

    fn classify_batch(&mut self, rows: &[TrackFeatureRow]) -> Result<ProbabilityBatch> {
        let classes = self.vocabulary.len();
        let answer = rows
            .iter()
            .map(|row| {
                let probabilities = self.classifier.classify(&self.vocabulary, row);
                if probabilities.len() != classes {
                    return Err(MlPidError::Protocol(format!(
                        "classifier produced {} probabilities for {} classes",
                        probabilities.len(),
                        classes
                    )));
                }
                Ok(probabilities)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ProbabilityBatch::from_rows(answer))
    }
}
