//! Result binder
//!
//! Maps probability rows back onto the tracks that produced them and picks
//! the predicted class. Correspondence is purely positional: row *i* of the
//! response belongs to track *i* of the request.

use crate::error::{MlPidError, Result};
use crate::event::PidRegistry;
use crate::types::{ClassId, ClassVocabulary, ProbabilityBatch, TrackId, TrackResult};

/// Class with the highest probability, scanning left to right
///
/// Only a strictly larger probability replaces the current best, so ties go
/// to the first class. A row with no positive probability predicts class 0.
pub fn predicted_class(vocabulary: &ClassVocabulary, probabilities: &[f32]) -> ClassId {
    let mut max_prob = 0.0f32;
    let mut predicted: ClassId = 0;
    for (class, &prob) in vocabulary.iter().zip(probabilities) {
        if prob > max_prob {
            max_prob = prob;
            predicted = class;
        }
    }
    predicted
}

/// Build one result per track, in request order
pub fn bind(
    vocabulary: &ClassVocabulary,
    track_ids: &[TrackId],
    probabilities: &ProbabilityBatch,
) -> Result<Vec<(TrackId, TrackResult)>> {
    if track_ids.len() != probabilities.len() {
        return Err(MlPidError::Protocol(format!(
            "{} probability rows for {} tracks",
            probabilities.len(),
            track_ids.len()
        )));
    }

    track_ids
        .iter()
        .zip(probabilities.rows())
        .map(|(&track, row)| {
            if row.len() != vocabulary.len() {
                return Err(MlPidError::Protocol(format!(
                    "probability row for track {} has {} columns, vocabulary has {}",
                    track,
                    row.len(),
                    vocabulary.len()
                )));
            }

            let result = TrackResult {
                probabilities: vocabulary.iter().zip(row.as_slice().iter().copied()).collect(),
                predicted: predicted_class(vocabulary, row.as_slice()),
            };
            Ok((track, result))
        })
        .collect()
}

/// Bind and publish into the host registry. Nothing is published on error.
pub fn publish(
    vocabulary: &ClassVocabulary,
    track_ids: &[TrackId],
    probabilities: &ProbabilityBatch,
    registry: &mut dyn PidRegistry,
) -> Result<usize> {
    let results = bind(vocabulary, track_ids, probabilities)?;
    let count = results.len();
    for (track, result) in results {
        registry.set_response(track, result);
    }
    Ok(count)
}
