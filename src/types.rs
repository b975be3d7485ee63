//! Core data types for the ML PID protocol
//!
//! This module contains the data structures that travel through one event's
//! classification round trip.
//!
//! # Main Types
//!
//! - [`ClassVocabulary`] - Ordered class ids the classifier can predict, fixed per run
//! - [`TrackFeatureRow`] - The 25 protocol-ordered features of one track
//! - [`FeatureField`] - Semantic names for the feature columns
//! - [`FeatureBatch`] - Rows for one event plus their out-of-band track ids
//! - [`ProbabilityBatch`] - The classifier's answer, one row per request row
//! - [`TrackResult`] - Per-track probabilities and the predicted class
//!
//! # Positional Correspondence
//!
//! Track ids never go over the wire. Row *i* of a [`ProbabilityBatch`] answers
//! row *i* of the [`FeatureBatch`] that produced it, so a batch keeps its ids
//! and rows in lockstep and only ever grows through [`FeatureBatch::push`].

use crate::error::{MlPidError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of features per track on the wire
pub const FEATURE_WIDTH: usize = 25;

/// Class identifier (a PDG particle code)
pub type ClassId = i32;

/// Host-assigned track identifier, unique within one event
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i32);

impl fmt::Debug for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackId({})", self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Feature columns in wire order
///
/// The discriminant is the column index expected by the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FeatureField {
    TpcClusters = 0,
    TpcSignal,
    P,
    Pt,
    Px,
    Py,
    Pz,
    TofNSigmaPion,
    TofNSigmaKaon,
    TofNSigmaProton,
    TofNSigmaElectron,
    TpcNSigmaPion,
    TpcNSigmaKaon,
    TpcNSigmaProton,
    TpcNSigmaElectron,
    TofBeta,
    Cov2,
    Cov5,
    Cov9,
    Cov13,
    Cov14,
    Cov17,
    Cov18,
    Cov19,
    Cov20,
}

impl FeatureField {
    /// All fields in wire order
    pub const ALL: [FeatureField; FEATURE_WIDTH] = [
        FeatureField::TpcClusters,
        FeatureField::TpcSignal,
        FeatureField::P,
        FeatureField::Pt,
        FeatureField::Px,
        FeatureField::Py,
        FeatureField::Pz,
        FeatureField::TofNSigmaPion,
        FeatureField::TofNSigmaKaon,
        FeatureField::TofNSigmaProton,
        FeatureField::TofNSigmaElectron,
        FeatureField::TpcNSigmaPion,
        FeatureField::TpcNSigmaKaon,
        FeatureField::TpcNSigmaProton,
        FeatureField::TpcNSigmaElectron,
        FeatureField::TofBeta,
        FeatureField::Cov2,
        FeatureField::Cov5,
        FeatureField::Cov9,
        FeatureField::Cov13,
        FeatureField::Cov14,
        FeatureField::Cov17,
        FeatureField::Cov18,
        FeatureField::Cov19,
        FeatureField::Cov20,
    ];

    /// Covariance fields paired with their index in the 21-entry covariance matrix
    pub const COVARIANCE: [(FeatureField, usize); 9] = [
        (FeatureField::Cov2, 2),
        (FeatureField::Cov5, 5),
        (FeatureField::Cov9, 9),
        (FeatureField::Cov13, 13),
        (FeatureField::Cov14, 14),
        (FeatureField::Cov17, 17),
        (FeatureField::Cov18, 18),
        (FeatureField::Cov19, 19),
        (FeatureField::Cov20, 20),
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used in training dumps
    pub fn column_name(self) -> &'static str {
        match self {
            FeatureField::TpcClusters => "TPCNcls",
            FeatureField::TpcSignal => "TPCsignal",
            FeatureField::P => "P",
            FeatureField::Pt => "Pt",
            FeatureField::Px => "Px",
            FeatureField::Py => "Py",
            FeatureField::Pz => "Pz",
            FeatureField::TofNSigmaPion => "nSigmaTOFPi",
            FeatureField::TofNSigmaKaon => "nSigmaTOFK",
            FeatureField::TofNSigmaProton => "nSigmaTOFP",
            FeatureField::TofNSigmaElectron => "nSigmaTOFe",
            FeatureField::TpcNSigmaPion => "nSigmaTPCPi",
            FeatureField::TpcNSigmaKaon => "nSigmaTPCK",
            FeatureField::TpcNSigmaProton => "nSigmaTPCP",
            FeatureField::TpcNSigmaElectron => "nSigmaTPCe",
            FeatureField::TofBeta => "tbeta",
            FeatureField::Cov2 => "cov2",
            FeatureField::Cov5 => "cov5",
            FeatureField::Cov9 => "cov9",
            FeatureField::Cov13 => "cov13",
            FeatureField::Cov14 => "cov14",
            FeatureField::Cov17 => "cov17",
            FeatureField::Cov18 => "cov18",
            FeatureField::Cov19 => "cov19",
            FeatureField::Cov20 => "cov20",
        }
    }
}

/// One track's features in wire order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackFeatureRow([f32; FEATURE_WIDTH]);

impl TrackFeatureRow {
    /// Wrap values that are already in wire order
    pub fn from_array(values: [f32; FEATURE_WIDTH]) -> Self {
        Self(values)
    }

    /// Build a row from a slice, checking its length
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let array: [f32; FEATURE_WIDTH] = values.try_into().map_err(|_| {
            MlPidError::Protocol(format!(
                "feature row has {} values, expected {}",
                values.len(),
                FEATURE_WIDTH
            ))
        })?;
        Ok(Self(array))
    }

    #[inline]
    pub fn get(&self, field: FeatureField) -> f32 {
        self.0[field.index()]
    }

    #[inline]
    pub fn set(&mut self, field: FeatureField, value: f32) {
        self.0[field.index()] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Index<FeatureField> for TrackFeatureRow {
    type Output = f32;

    fn index(&self, field: FeatureField) -> &f32 {
        &self.0[field.index()]
    }
}

impl IndexMut<FeatureField> for TrackFeatureRow {
    fn index_mut(&mut self, field: FeatureField) -> &mut f32 {
        &mut self.0[field.index()]
    }
}

/// Ordered, non-empty set of class ids fixed for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassVocabulary(Vec<ClassId>);

impl ClassVocabulary {
    /// Create a vocabulary, rejecting empty or duplicated ids
    pub fn new(ids: Vec<ClassId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(MlPidError::Protocol(
                "class vocabulary must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(*id) {
                return Err(MlPidError::Protocol(format!(
                    "class id {} appears more than once in the vocabulary",
                    id
                )));
            }
        }

        Ok(Self(ids))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a vocabulary built by [`ClassVocabulary::new`]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> &[ClassId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.0.iter().copied()
    }

    /// Column position of a class id
    pub fn position(&self, id: ClassId) -> Option<usize> {
        self.0.iter().position(|&c| c == id)
    }
}

impl fmt::Display for ClassVocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(" "))
    }
}

/// Feature rows for one event with their originating track ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBatch {
    track_ids: Vec<TrackId>,
    rows: Vec<TrackFeatureRow>,
}

impl FeatureBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            track_ids: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Build a batch from rows only (used on the classifier side, where ids are unknown)
    pub fn from_rows(rows: Vec<TrackFeatureRow>) -> Self {
        let track_ids = (0..rows.len() as i32).map(TrackId).collect();
        Self { track_ids, rows }
    }

    /// Append a track; id and row always move together
    pub fn push(&mut self, track_id: TrackId, row: TrackFeatureRow) {
        self.track_ids.push(track_id);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn track_ids(&self) -> &[TrackId] {
        &self.track_ids
    }

    pub fn rows(&self) -> &[TrackFeatureRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrackFeatureRow)> {
        self.track_ids.iter().copied().zip(self.rows.iter())
    }
}

/// One probability per vocabulary entry, positionally aligned with it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilityRow(pub Vec<f32>);

impl ProbabilityRow {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Classifier answer for one batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilityBatch {
    rows: Vec<ProbabilityRow>,
}

impl ProbabilityBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a row-major (track-major, class-minor) flat buffer into rows
    pub fn from_flat(values: &[f32], classes: usize) -> Result<Self> {
        if classes == 0 {
            return Err(MlPidError::Protocol(
                "probability rows need at least one class".to_string(),
            ));
        }
        if values.len() % classes != 0 {
            return Err(MlPidError::Protocol(format!(
                "{} probabilities do not divide into rows of {}",
                values.len(),
                classes
            )));
        }

        let rows = values
            .chunks_exact(classes)
            .map(|chunk| ProbabilityRow(chunk.to_vec()))
            .collect();
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<ProbabilityRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ProbabilityRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&ProbabilityRow> {
        self.rows.get(index)
    }

    /// Flatten back to the row-major wire layout
    pub fn to_flat(&self) -> Vec<f32> {
        self.rows.iter().flat_map(|r| r.0.iter().copied()).collect()
    }
}

/// Classification result for one track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackResult {
    /// Probability per class id, in vocabulary order
    pub probabilities: Vec<(ClassId, f32)>,
    /// Class id with the highest probability (first one on ties)
    pub predicted: ClassId,
}

impl TrackResult {
    /// Probability assigned to a class id
    pub fn probability(&self, class: ClassId) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(id, _)| *id == class)
            .map(|(_, p)| *p)
    }
}
