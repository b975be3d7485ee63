//! Binary framing
//!
//! Every scalar is a 4-byte little-endian value. The reader always knows from
//! its position in the protocol whether the next word is an `i32` or an `f32`;
//! the two are never mixed within one read.
//!
//! ```text
//! handshake      i32 0
//! vocabulary     i32 n, n × i32 class id
//! feature batch  i32 n, n × 25 × f32
//! probabilities  n × classes × f32 (track-major)
//! shutdown       i32 -1
//! ```

use super::{check_batch_size, Request, HANDSHAKE, SHUTDOWN_SENTINEL, WORD_SIZE};
use crate::error::{MlPidError, Result};
use crate::types::{
    ClassVocabulary, FeatureBatch, ProbabilityBatch, TrackFeatureRow, FEATURE_WIDTH,
};
use std::io::{Read, Write};

fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<usize> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(WORD_SIZE)
}

fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; WORD_SIZE];
    reader
        .read_exact(&mut buf)
        .map_err(|e| MlPidError::from_read(e, what))?;
    Ok(i32::from_le_bytes(buf))
}

fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> Result<usize> {
    let mut bytes = Vec::with_capacity(values.len() * WORD_SIZE);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

fn read_f32s<R: Read>(reader: &mut R, count: usize, what: &str) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; count * WORD_SIZE];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MlPidError::from_read(e, what))?;
    Ok(bytes
        .chunks_exact(WORD_SIZE)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

// ==================== Requesting side ====================

pub fn write_handshake<W: Write>(writer: &mut W) -> Result<usize> {
    write_i32(writer, HANDSHAKE)
}

pub fn read_vocabulary<R: Read>(reader: &mut R) -> Result<ClassVocabulary> {
    let count = read_i32(reader, "class count")?;
    if count <= 0 {
        return Err(MlPidError::Protocol(format!(
            "classifier announced {} classes",
            count
        )));
    }
    let count = check_batch_size(count as usize, super::MAX_CLASSES, "class count")?;

    let mut bytes = vec![0u8; count * WORD_SIZE];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MlPidError::from_read(e, "class ids"))?;
    let ids = bytes
        .chunks_exact(WORD_SIZE)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    ClassVocabulary::new(ids)
}

pub fn write_batch<W: Write>(writer: &mut W, batch: &FeatureBatch) -> Result<usize> {
    let mut written = write_i32(writer, batch.len() as i32)?;
    let flat: Vec<f32> = batch
        .rows()
        .iter()
        .flat_map(|row| row.as_slice().iter().copied())
        .collect();
    written += write_f32s(writer, &flat)?;
    Ok(written)
}

pub fn read_probabilities<R: Read>(
    reader: &mut R,
    tracks: usize,
    classes: usize,
) -> Result<ProbabilityBatch> {
    let values = read_f32s(reader, tracks * classes, "probabilities")?;
    ProbabilityBatch::from_flat(&values, classes)
}

pub fn write_shutdown<W: Write>(writer: &mut W) -> Result<usize> {
    write_i32(writer, SHUTDOWN_SENTINEL)
}

// ==================== Classifier side ====================

pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let count = read_i32(reader, "track count")?;
    match count {
        HANDSHAKE => Ok(Request::Handshake),
        SHUTDOWN_SENTINEL => Ok(Request::Shutdown),
        n if n < 0 => Err(MlPidError::Protocol(format!("negative track count {}", n))),
        n => {
            let tracks = check_batch_size(n as usize, super::MAX_TRACKS, "track count")?;
            let values = read_f32s(reader, tracks * FEATURE_WIDTH, "feature rows")?;
            let rows = values
                .chunks_exact(FEATURE_WIDTH)
                .map(TrackFeatureRow::from_slice)
                .collect::<Result<Vec<_>>>()?;
            Ok(Request::Batch(rows))
        }
    }
}

pub fn write_vocabulary<W: Write>(writer: &mut W, vocabulary: &ClassVocabulary) -> Result<usize> {
    let mut written = write_i32(writer, vocabulary.len() as i32)?;
    for id in vocabulary.iter() {
        written += write_i32(writer, id)?;
    }
    Ok(written)
}

pub fn write_probabilities<W: Write>(writer: &mut W, batch: &ProbabilityBatch) -> Result<usize> {
    write_f32s(writer, &batch.to_flat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackId;
    use std::io::Cursor;

    #[test]
    fn test_handshake_is_four_zero_bytes() {
        let mut out = Vec::new();
        assert_eq!(write_handshake(&mut out).unwrap(), 4);
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_shutdown_is_minus_one() {
        let mut out = Vec::new();
        assert_eq!(write_shutdown(&mut out).unwrap(), 4);
        assert_eq!(out, (-1i32).to_le_bytes().to_vec());
    }

    #[test]
    fn test_read_vocabulary() {
        let mut bytes = Vec::new();
        for v in [3i32, 11, 13, 211] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let vocab = read_vocabulary(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(vocab.ids(), &[11, 13, 211]);
    }

    #[test]
    fn test_short_vocabulary_is_protocol_error() {
        let mut bytes = Vec::new();
        for v in [3i32, 11, 13] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = read_vocabulary(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_non_positive_class_count() {
        let err = read_vocabulary(&mut Cursor::new(0i32.to_le_bytes().to_vec())).unwrap_err();
        assert!(err.is_protocol());
        let err = read_vocabulary(&mut Cursor::new((-4i32).to_le_bytes().to_vec())).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_batch_layout() {
        let mut row = [0.0f32; FEATURE_WIDTH];
        row[0] = 1.0;
        row[24] = 2.5;
        let mut batch = FeatureBatch::new();
        batch.push(TrackId(9), TrackFeatureRow::from_array(row));

        let mut out = Vec::new();
        let written = write_batch(&mut out, &batch).unwrap();
        assert_eq!(written, 4 + FEATURE_WIDTH * 4);
        assert_eq!(&out[0..4], &1i32.to_le_bytes());
        assert_eq!(&out[4..8], &1.0f32.to_le_bytes());
        assert_eq!(&out[out.len() - 4..], &2.5f32.to_le_bytes());

        match read_request(&mut Cursor::new(out)).unwrap() {
            Request::Batch(rows) => assert_eq!(rows, batch.rows()),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_read_request_kinds() {
        let handshake = read_request(&mut Cursor::new(0i32.to_le_bytes().to_vec())).unwrap();
        assert_eq!(handshake, Request::Handshake);

        let shutdown = read_request(&mut Cursor::new((-1i32).to_le_bytes().to_vec())).unwrap();
        assert_eq!(shutdown, Request::Shutdown);

        let err = read_request(&mut Cursor::new((-7i32).to_le_bytes().to_vec())).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_probabilities_are_track_major() {
        let batch = ProbabilityBatch::from_flat(&[0.1, 0.2, 0.7, 0.6, 0.3, 0.1], 3).unwrap();
        let mut out = Vec::new();
        assert_eq!(write_probabilities(&mut out, &batch).unwrap(), 24);

        let decoded = read_probabilities(&mut Cursor::new(out), 2, 3).unwrap();
        assert_eq!(decoded.row(0).unwrap().as_slice(), &[0.1, 0.2, 0.7]);
        assert_eq!(decoded.row(1).unwrap().as_slice(), &[0.6, 0.3, 0.1]);
    }

    #[test]
    fn test_truncated_probabilities() {
        let err = read_probabilities(&mut Cursor::new(vec![0u8; 10]), 1, 3).unwrap_err();
        assert!(err.is_protocol());
    }
}
