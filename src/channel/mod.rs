//! Classifier channel
//!
//! Owns the two unidirectional streams to the external classifier and drives
//! the protocol over them:
//!
//! ```text
//! Uninitialized ──handshake──▶ AwaitingVocabulary ──▶ Ready
//!                                                     │  ▲
//!                                      write batch    ▼  │ read probabilities
//!                                                  Sending ─▶ AwaitingResponse
//! Ready ──shutdown──▶ Closed            any I/O failure ──▶ Failed
//! ```
//!
//! Every operation blocks. There is no timeout, no retry and no reconnect: a
//! classifier that stops answering stalls the caller, and any failure while
//! sending or awaiting a response leaves the channel [`ChannelState::Failed`]
//! for the rest of the run.
//!
//! # Components
//!
//! - [`ClassifierChannel`] - the state machine, generic over its streams
//! - [`ClassifierLink`] - object-safe interface the tasks hold
//! - [`ChannelStats`] - round-trip counters and latency tracking
//! - [`memory`] - in-process pipes for running a peer on another thread
//! - [`peer`] - the classifier side of the protocol
//!
//! # Example
//!
//! ```ignore
//! use mlpid::channel::{ClassifierChannel, ClassifierLink};
//! use mlpid::config::PipeConfig;
//!
//! let mut channel = ClassifierChannel::open_pipes(&PipeConfig::default())?;
//! let vocabulary = channel.handshake()?.clone();
//! let probabilities = channel.round_trip(&batch)?;
//! channel.shutdown()?;
//! ```

pub mod memory;
pub mod peer;

pub use memory::{connected_pair, Endpoints, PipeReader, PipeWriter};
pub use peer::{
    Classifier, ClassifierPeer, FixedClassifier, NSigmaClassifier, PeerStats, UniformClassifier,
};

use crate::codec::Framing;
use crate::config::PipeConfig;
use crate::error::{MlPidError, Result, ResultExt};
use crate::types::{ClassVocabulary, FeatureBatch, ProbabilityBatch};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::time::{Duration, Instant};

/// Size of the rolling window for recent round-trip times
const RECENT_WINDOW_SIZE: usize = 100;

/// Protocol state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    AwaitingVocabulary,
    Ready,
    Sending,
    AwaitingResponse,
    Closed,
    Failed,
}

impl ChannelState {
    pub fn name(self) -> &'static str {
        match self {
            ChannelState::Uninitialized => "Uninitialized",
            ChannelState::AwaitingVocabulary => "AwaitingVocabulary",
            ChannelState::Ready => "Ready",
            ChannelState::Sending => "Sending",
            ChannelState::AwaitingResponse => "AwaitingResponse",
            ChannelState::Closed => "Closed",
            ChannelState::Failed => "Failed",
        }
    }
}

/// Statistics for channel round trips
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Completed round trips
    pub round_trips: u64,
    /// Events whose batch was empty, so nothing was sent
    pub skipped_empty: u64,
    /// Tracks sent over all round trips
    pub tracks_sent: u64,
    /// Bytes written to the request pipe (handshake and sentinel included)
    pub bytes_written: u64,
    /// Bytes consumed from the response pipe (vocabulary included)
    pub bytes_read: u64,
    /// Total round-trip time in microseconds
    pub total_round_trip_us: u64,
    /// Last round-trip time in microseconds
    pub last_round_trip_us: u64,
    /// Minimum round-trip time observed (microseconds)
    pub min_round_trip_us: u64,
    /// Maximum round-trip time observed (microseconds)
    pub max_round_trip_us: u64,
    /// Rolling window of recent round-trip times
    pub recent_round_trips: VecDeque<u64>,
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self {
            round_trips: 0,
            skipped_empty: 0,
            tracks_sent: 0,
            bytes_written: 0,
            bytes_read: 0,
            total_round_trip_us: 0,
            last_round_trip_us: 0,
            min_round_trip_us: u64::MAX,
            max_round_trip_us: 0,
            recent_round_trips: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl ChannelStats {
    /// Average round-trip time in microseconds
    pub fn avg_round_trip_us(&self) -> f64 {
        if self.round_trips == 0 {
            0.0
        } else {
            self.total_round_trip_us as f64 / self.round_trips as f64
        }
    }

    /// Record a completed round trip
    pub fn record_round_trip(&mut self, elapsed: Duration, tracks: usize) {
        // At least 1us so rates never divide by zero
        let time_us = (elapsed.as_micros() as u64).max(1);

        self.round_trips += 1;
        self.tracks_sent += tracks as u64;
        self.total_round_trip_us += time_us;
        self.last_round_trip_us = time_us;
        self.min_round_trip_us = self.min_round_trip_us.min(time_us);
        self.max_round_trip_us = self.max_round_trip_us.max(time_us);

        self.recent_round_trips.push_back(time_us);
        if self.recent_round_trips.len() > RECENT_WINDOW_SIZE {
            self.recent_round_trips.pop_front();
        }
    }

    /// Spread (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_round_trips.iter().min().copied().unwrap_or(0);
        let max = self.recent_round_trips.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }
}

impl std::fmt::Display for ChannelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} round trips, {} tracks, {} empty skipped, {} bytes out, {} bytes in",
            self.round_trips,
            self.tracks_sent,
            self.skipped_empty,
            self.bytes_written,
            self.bytes_read
        )?;
        if self.round_trips > 0 {
            write!(
                f,
                ", latency avg {:.0}us min {}us max {}us jitter {}us",
                self.avg_round_trip_us(),
                self.min_round_trip_us,
                self.max_round_trip_us,
                self.jitter_us()
            )?;
        }
        Ok(())
    }
}

/// Counts the bytes a codec consumes from the wrapped reader
struct ReadCounter<'a, R: BufRead> {
    inner: &'a mut R,
    consumed: usize,
}

impl<'a, R: BufRead> ReadCounter<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self { inner, consumed: 0 }
    }
}

impl<R: BufRead> Read for ReadCounter<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for ReadCounter<'_, R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.consumed += amt;
        self.inner.consume(amt)
    }
}

/// Interface the tasks use to talk to a classifier
pub trait ClassifierLink {
    fn state(&self) -> ChannelState;

    /// Request and read the class vocabulary
    fn handshake(&mut self) -> Result<&ClassVocabulary>;

    /// Vocabulary established by the handshake
    fn vocabulary(&self) -> Option<&ClassVocabulary>;

    /// Send one event's batch and wait for its probabilities
    ///
    /// An empty batch performs no I/O and yields an empty answer.
    fn round_trip(&mut self, batch: &FeatureBatch) -> Result<ProbabilityBatch>;

    /// Send the sentinel and close both streams
    fn shutdown(&mut self) -> Result<()>;

    fn stats(&self) -> &ChannelStats;
}

/// Channel backed by named pipes on disk
pub type PipeChannel = ClassifierChannel<BufReader<File>, BufWriter<File>>;

/// Protocol state machine over an inbound and an outbound stream
pub struct ClassifierChannel<R: BufRead, W: Write> {
    framing: Framing,
    state: ChannelState,
    reader: Option<R>,
    writer: Option<W>,
    vocabulary: Option<ClassVocabulary>,
    stats: ChannelStats,
}

impl PipeChannel {
    /// Open the request pipe for writing and the response pipe for reading
    ///
    /// Opening a FIFO blocks until the classifier opens the other end, so the
    /// classifier must open the request pipe first as well.
    pub fn open_pipes(config: &PipeConfig) -> Result<Self> {
        tracing::info!(
            "Opening classifier pipes ({} framing): {:?} -> {:?}",
            config.framing,
            config.request_path,
            config.response_path
        );

        let request = OpenOptions::new()
            .write(true)
            .open(&config.request_path)
            .with_context(|| format!("Failed to open request pipe {:?}", config.request_path))?;
        let response = File::open(&config.response_path)
            .with_context(|| format!("Failed to open response pipe {:?}", config.response_path))?;

        Ok(Self::new(
            config.framing,
            BufReader::new(response),
            BufWriter::new(request),
        ))
    }
}

impl<R: BufRead, W: Write> ClassifierChannel<R, W> {
    /// Wrap already-open streams; no I/O happens until [`handshake`](ClassifierLink::handshake)
    pub fn new(framing: Framing, reader: R, writer: W) -> Self {
        if framing == Framing::Text {
            tracing::warn!("Text framing is a legacy mode; binary framing is canonical");
        }
        Self {
            framing,
            state: ChannelState::Uninitialized,
            reader: Some(reader),
            writer: Some(writer),
            vocabulary: None,
            stats: ChannelStats::default(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    fn expect_state(&self, expected: ChannelState) -> Result<()> {
        if self.state != expected {
            return Err(MlPidError::InvalidState {
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        Ok(())
    }

    fn streams(&mut self) -> Result<(&mut R, &mut W)> {
        match (self.reader.as_mut(), self.writer.as_mut()) {
            (Some(reader), Some(writer)) => Ok((reader, writer)),
            _ => Err(MlPidError::InvalidState {
                expected: "open streams",
                found: self.state.name(),
            }),
        }
    }

    fn fail(&mut self, err: MlPidError) -> MlPidError {
        tracing::error!("Classifier channel failed in {}: {}", self.state.name(), err);
        self.state = ChannelState::Failed;
        err
    }

    fn do_handshake(&mut self) -> Result<ClassVocabulary> {
        let framing = self.framing;

        let (_, writer) = self.streams()?;
        let written = framing.write_handshake(writer)?;
        writer.flush()?;
        self.stats.bytes_written += written as u64;
        tracing::debug!("Asked the classifier for its classes");

        self.state = ChannelState::AwaitingVocabulary;
        let (reader, _) = self.streams()?;
        let mut counted = ReadCounter::new(reader);
        let vocabulary = framing.read_vocabulary(&mut counted);
        let consumed = counted.consumed;
        self.stats.bytes_read += consumed as u64;
        vocabulary
    }

    fn do_round_trip(&mut self, batch: &FeatureBatch, classes: usize) -> Result<ProbabilityBatch> {
        let framing = self.framing;

        self.state = ChannelState::Sending;
        let (_, writer) = self.streams()?;
        let written = framing.write_batch(writer, batch)?;
        writer.flush()?;
        self.stats.bytes_written += written as u64;

        self.state = ChannelState::AwaitingResponse;
        let (reader, _) = self.streams()?;
        let mut counted = ReadCounter::new(reader);
        let probabilities = framing.read_probabilities(&mut counted, batch.len(), classes);
        let consumed = counted.consumed;
        self.stats.bytes_read += consumed as u64;
        probabilities
    }

    /// Drop both streams; each is released regardless of the other
    fn close_streams(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Flushing request pipe on close failed: {}", e);
            }
            drop(writer);
        }
        drop(self.reader.take());
    }
}

impl<R: BufRead, W: Write> ClassifierLink for ClassifierChannel<R, W> {
    fn state(&self) -> ChannelState {
        self.state
    }

    fn handshake(&mut self) -> Result<&ClassVocabulary> {
        self.expect_state(ChannelState::Uninitialized)?;

        match self.do_handshake() {
            Ok(vocabulary) => {
                tracing::info!(
                    "Classifier offers {} classes: {}",
                    vocabulary.len(),
                    vocabulary
                );
                self.state = ChannelState::Ready;
                Ok(&*self.vocabulary.insert(vocabulary))
            }
            Err(e) => Err(self.fail(e.with_context("Class vocabulary handshake"))),
        }
    }

    fn vocabulary(&self) -> Option<&ClassVocabulary> {
        self.vocabulary.as_ref()
    }

    fn round_trip(&mut self, batch: &FeatureBatch) -> Result<ProbabilityBatch> {
        self.expect_state(ChannelState::Ready)?;

        if batch.is_empty() {
            self.stats.skipped_empty += 1;
            return Ok(ProbabilityBatch::new());
        }

        let classes = match self.vocabulary.as_ref() {
            Some(vocabulary) => vocabulary.len(),
            None => {
                return Err(MlPidError::InvalidState {
                    expected: "established vocabulary",
                    found: self.state.name(),
                })
            }
        };

        let start = Instant::now();
        match self.do_round_trip(batch, classes) {
            Ok(probabilities) => {
                self.stats.record_round_trip(start.elapsed(), batch.len());
                self.state = ChannelState::Ready;
                tracing::debug!(
                    "Classified {} tracks in {}us",
                    batch.len(),
                    self.stats.last_round_trip_us
                );
                Ok(probabilities)
            }
            Err(e) => {
                let context = format!("Round trip of {} tracks", batch.len());
                Err(self.fail(e.with_context(context)))
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.state {
            ChannelState::Closed => return Ok(()),
            ChannelState::Ready => {}
            other => {
                tracing::warn!(
                    "Closing classifier channel from {} without sending the sentinel",
                    other.name()
                );
                self.close_streams();
                self.state = ChannelState::Closed;
                return Ok(());
            }
        }

        let framing = self.framing;
        let sentinel = match self.streams() {
            Ok((_, writer)) => framing
                .write_shutdown(writer)
                .and_then(|written| writer.flush().map(|_| written).map_err(Into::into)),
            Err(e) => Err(e),
        };

        self.close_streams();
        self.state = ChannelState::Closed;

        match sentinel {
            Ok(written) => {
                self.stats.bytes_written += written as u64;
                tracing::info!("Classifier channel closed: {}", self.stats);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Sending the shutdown sentinel failed: {}", e);
                Err(e.with_context("Classifier shutdown"))
            }
        }
    }

    fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}

impl<R: BufRead, W: Write> Drop for ClassifierChannel<R, W> {
    fn drop(&mut self) {
        if self.state != ChannelState::Closed {
            if let Err(e) = self.shutdown() {
                tracing::warn!("Classifier channel teardown: {}", e);
            }
        }
    }
}
