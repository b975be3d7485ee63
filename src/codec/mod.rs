//! Wire codec for the classifier pipes
//!
//! Two framings express the same messages. The framing is chosen once per run
//! and both ends of the pipe must agree on it:
//!
//! - [`Framing::Binary`] - 4-byte little-endian words (canonical)
//! - [`Framing::Text`] - whitespace-delimited ASCII (legacy)
//!
//! # Messages
//!
//! | message        | direction          | content                                   |
//! |----------------|--------------------|-------------------------------------------|
//! | handshake      | task → classifier  | `0` where a track count is expected       |
//! | vocabulary     | classifier → task  | class count, then that many class ids     |
//! | feature batch  | task → classifier  | track count, then `count × 25` features   |
//! | probabilities  | classifier → task  | `count × classes` floats, track-major     |
//! | shutdown       | task → classifier  | `-1` where a track count is expected      |
//!
//! The codec only frames. Track ids never go on the wire; the caller keeps
//! request order and response order aligned.
//!
//! Both the requesting side (`write_handshake`, `read_vocabulary`,
//! `write_batch`, `read_probabilities`, `write_shutdown`) and the classifier
//! side (`read_request`, `write_vocabulary`, `write_probabilities`) are here,
//! so either end of the pipe can be driven from Rust.

pub mod binary;
pub mod text;

use crate::error::{MlPidError, Result};
use crate::types::{ClassVocabulary, FeatureBatch, ProbabilityBatch, TrackFeatureRow};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Size of one binary word
pub const WORD_SIZE: usize = 4;

/// Track count value that requests the class vocabulary
pub const HANDSHAKE: i32 = 0;

/// Track count value that ends the session
pub const SHUTDOWN_SENTINEL: i32 = -1;

/// Upper bound on tracks in one batch; larger counts mean a desynchronized stream
pub const MAX_TRACKS: usize = 1 << 20;

/// Upper bound on vocabulary size
pub const MAX_CLASSES: usize = 4096;

/// Wire framing, selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    Binary,
    Text,
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Binary => write!(f, "binary"),
            Framing::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = MlPidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Framing::Binary),
            "text" => Ok(Framing::Text),
            other => Err(MlPidError::Config(format!(
                "unknown framing '{}', expected 'binary' or 'text'",
                other
            ))),
        }
    }
}

/// A message as seen by the classifier side
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Send the class vocabulary
    Handshake,
    /// Classify these rows, answering in the same order
    Batch(Vec<TrackFeatureRow>),
    /// No more requests
    Shutdown,
}

pub(crate) fn check_batch_size(count: usize, max: usize, what: &str) -> Result<usize> {
    if count > max {
        return Err(MlPidError::Protocol(format!(
            "{} {} exceeds the limit of {}",
            what, count, max
        )));
    }
    Ok(count)
}

impl Framing {
    /// Write the vocabulary request. Returns bytes written.
    pub fn write_handshake<W: Write>(self, writer: &mut W) -> Result<usize> {
        match self {
            Framing::Binary => binary::write_handshake(writer),
            Framing::Text => text::write_handshake(writer),
        }
    }

    /// Read the class count and that many class ids
    pub fn read_vocabulary<R: BufRead>(self, reader: &mut R) -> Result<ClassVocabulary> {
        match self {
            Framing::Binary => binary::read_vocabulary(reader),
            Framing::Text => text::read_vocabulary(reader),
        }
    }

    /// Write one event's feature batch. Returns bytes written.
    pub fn write_batch<W: Write>(self, writer: &mut W, batch: &FeatureBatch) -> Result<usize> {
        match self {
            Framing::Binary => binary::write_batch(writer, batch),
            Framing::Text => text::write_batch(writer, batch),
        }
    }

    /// Read `tracks × classes` probabilities
    pub fn read_probabilities<R: BufRead>(
        self,
        reader: &mut R,
        tracks: usize,
        classes: usize,
    ) -> Result<ProbabilityBatch> {
        let tracks = check_batch_size(tracks, MAX_TRACKS, "track count")?;
        match self {
            Framing::Binary => binary::read_probabilities(reader, tracks, classes),
            Framing::Text => text::read_probabilities(reader, tracks, classes),
        }
    }

    /// Write the end-of-session sentinel. Returns bytes written.
    pub fn write_shutdown<W: Write>(self, writer: &mut W) -> Result<usize> {
        match self {
            Framing::Binary => binary::write_shutdown(writer),
            Framing::Text => text::write_shutdown(writer),
        }
    }

    /// Classifier side: read the next request
    pub fn read_request<R: BufRead>(self, reader: &mut R) -> Result<Request> {
        match self {
            Framing::Binary => binary::read_request(reader),
            Framing::Text => text::read_request(reader),
        }
    }

    /// Classifier side: answer the handshake
    pub fn write_vocabulary<W: Write>(
        self,
        writer: &mut W,
        vocabulary: &ClassVocabulary,
    ) -> Result<usize> {
        match self {
            Framing::Binary => binary::write_vocabulary(writer, vocabulary),
            Framing::Text => text::write_vocabulary(writer, vocabulary),
        }
    }

    /// Classifier side: answer a batch
    pub fn write_probabilities<W: Write>(
        self,
        writer: &mut W,
        batch: &ProbabilityBatch,
    ) -> Result<usize> {
        match self {
            Framing::Binary => binary::write_probabilities(writer, batch),
            Framing::Text => text::write_probabilities(writer, batch),
        }
    }
}
