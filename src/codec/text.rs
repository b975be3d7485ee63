//! Text framing (legacy)
//!
//! Whitespace-delimited ASCII. Every message ends with a newline so the
//! reader on the other side never waits for a terminator that is not coming.
//!
//! ```text
//! handshake      0
//! vocabulary     n
//!                id id ... id
//! feature batch  n
//!                25
//!                f f ... f        (n lines)
//! probabilities  p p ... p        (n lines, one per track)
//! shutdown       -1
//! ```
//!
//! Floats are printed with the shortest representation that reads back to the
//! same `f32`.

use super::{check_batch_size, Request, HANDSHAKE, SHUTDOWN_SENTINEL};
use crate::error::{MlPidError, Result};
use crate::types::{
    ClassVocabulary, FeatureBatch, ProbabilityBatch, TrackFeatureRow, FEATURE_WIDTH,
};
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Read one whitespace-delimited token without consuming past it
fn read_token<R: BufRead>(reader: &mut R, what: &str) -> Result<String> {
    let mut token = Vec::new();
    loop {
        let (consumed, done) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                if token.is_empty() {
                    return Err(MlPidError::Protocol(format!(
                        "peer closed the stream while reading {}",
                        what
                    )));
                }
                break;
            }

            let mut consumed = 0;
            let mut done = false;
            for &byte in buf {
                if byte.is_ascii_whitespace() {
                    consumed += 1;
                    if !token.is_empty() {
                        done = true;
                        break;
                    }
                } else {
                    token.push(byte);
                    consumed += 1;
                }
            }
            (consumed, done)
        };
        reader.consume(consumed);
        if done {
            break;
        }
    }

    String::from_utf8(token)
        .map_err(|_| MlPidError::Protocol(format!("non-ASCII token while reading {}", what)))
}

fn read_value<R: BufRead, T: FromStr>(reader: &mut R, what: &str) -> Result<T> {
    let token = read_token(reader, what)?;
    token
        .parse()
        .map_err(|_| MlPidError::Protocol(format!("cannot parse {:?} as {}", token, what)))
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<usize> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(line.len() + 1)
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

// ==================== Requesting side ====================

pub fn write_handshake<W: Write>(writer: &mut W) -> Result<usize> {
    write_line(writer, &HANDSHAKE.to_string())
}

pub fn read_vocabulary<R: BufRead>(reader: &mut R) -> Result<ClassVocabulary> {
    let count: i32 = read_value(reader, "class count")?;
    if count <= 0 {
        return Err(MlPidError::Protocol(format!(
            "classifier announced {} classes",
            count
        )));
    }
    let count = check_batch_size(count as usize, super::MAX_CLASSES, "class count")?;

    let ids = (0..count)
        .map(|_| read_value::<_, i32>(reader, "class id"))
        .collect::<Result<Vec<_>>>()?;
    ClassVocabulary::new(ids)
}

pub fn write_batch<W: Write>(writer: &mut W, batch: &FeatureBatch) -> Result<usize> {
    let mut written = write_line(writer, &batch.len().to_string())?;
    written += write_line(writer, &FEATURE_WIDTH.to_string())?;
    for row in batch.rows() {
        written += write_line(writer, &join(row.as_slice().iter()))?;
    }
    Ok(written)
}

pub fn read_probabilities<R: BufRead>(
    reader: &mut R,
    tracks: usize,
    classes: usize,
) -> Result<ProbabilityBatch> {
    let values = (0..tracks * classes)
        .map(|_| read_value::<_, f32>(reader, "probability"))
        .collect::<Result<Vec<_>>>()?;
    ProbabilityBatch::from_flat(&values, classes)
}

pub fn write_shutdown<W: Write>(writer: &mut W) -> Result<usize> {
    write_line(writer, &SHUTDOWN_SENTINEL.to_string())
}

// ==================== Classifier side ====================

pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request> {
    let count: i32 = read_value(reader, "track count")?;
    match count {
        HANDSHAKE => Ok(Request::Handshake),
        SHUTDOWN_SENTINEL => Ok(Request::Shutdown),
        n if n < 0 => Err(MlPidError::Protocol(format!("negative track count {}", n))),
        n => {
            let tracks = check_batch_size(n as usize, super::MAX_TRACKS, "track count")?;
            let width: usize = read_value(reader, "feature width")?;
            if width != FEATURE_WIDTH {
                return Err(MlPidError::Protocol(format!(
                    "feature width {} does not match {}",
                    width, FEATURE_WIDTH
                )));
            }

            let mut rows = Vec::with_capacity(tracks);
            for _ in 0..tracks {
                let values = (0..FEATURE_WIDTH)
                    .map(|_| read_value::<_, f32>(reader, "feature"))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(TrackFeatureRow::from_slice(&values)?);
            }
            Ok(Request::Batch(rows))
        }
    }
}

pub fn write_vocabulary<W: Write>(writer: &mut W, vocabulary: &ClassVocabulary) -> Result<usize> {
    let mut written = write_line(writer, &vocabulary.len().to_string())?;
    written += write_line(writer, &join(vocabulary.iter()))?;
    Ok(written)
}

pub fn write_probabilities<W: Write>(writer: &mut W, batch: &ProbabilityBatch) -> Result<usize> {
    let mut written = 0;
    for row in batch.rows() {
        written += write_line(writer, &join(row.as_slice().iter()))?;
    }
    Ok(written)
}
