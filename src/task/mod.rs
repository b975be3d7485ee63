//! Per-event analysis tasks
//!
//! The host drives a task through [`AnalysisTask`]: `initialize` once,
//! `process_event` for every collision event, `shutdown` once at the end.
//!
//! - [`MlPidTask`] classifies admitted tracks through the external classifier
//!   and publishes the results into the host's registry.
//! - [`PreprocessTask`] writes the same feature rows to CSV as training data.

pub mod preprocess;
pub mod selection;

pub use preprocess::PreprocessTask;
pub use selection::{EventSelector, SkipReason};

use crate::binder;
use crate::channel::{ChannelStats, ClassifierChannel, ClassifierLink};
use crate::config::TaskConfig;
use crate::error::{MlPidError, Result};
use crate::event::{Event, PidProvider, PidRegistry};
use crate::features::{extract_batch, FilterStats, TrackFilter};
use crate::types::ClassVocabulary;
use chrono::{DateTime, Local};

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Rejected by event selection
    Skipped(SkipReason),
    /// Selected, but no track passed the filter
    NoTracks,
    /// Results published for this many tracks
    Classified(usize),
    /// This many rows written to the dump
    Written(usize),
}

/// Host lifecycle of a task
pub trait AnalysisTask {
    fn name(&self) -> &'static str;

    fn initialize(&mut self) -> Result<()>;

    fn process_event(
        &mut self,
        event: &Event,
        pid: &dyn PidProvider,
        registry: &mut dyn PidRegistry,
    ) -> Result<EventOutcome>;

    fn shutdown(&mut self) -> Result<RunSummary>;
}

/// Counters for one run of a task
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub task: &'static str,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub events: u64,
    pub skipped_events: u64,
    pub empty_events: u64,
    /// Tracks classified or written
    pub tracks: u64,
    pub rejected_tracks: u64,
}

impl RunSummary {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            started_at: Local::now(),
            finished_at: None,
            events: 0,
            skipped_events: 0,
            empty_events: 0,
            tracks: 0,
            rejected_tracks: 0,
        }
    }

    pub fn record(&mut self, outcome: EventOutcome) {
        self.events += 1;
        match outcome {
            EventOutcome::Skipped(_) => self.skipped_events += 1,
            EventOutcome::NoTracks => self.empty_events += 1,
            EventOutcome::Classified(n) | EventOutcome::Written(n) => self.tracks += n as u64,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} events ({} skipped, {} without tracks), {} tracks, {} rejected, started {}",
            self.task,
            self.events,
            self.skipped_events,
            self.empty_events,
            self.tracks,
            self.rejected_tracks,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if let Some(finished) = self.finished_at {
            let elapsed = finished - self.started_at;
            write!(f, ", ran {:.3}s", elapsed.num_milliseconds() as f64 / 1000.0)?;
        }
        Ok(())
    }
}

/// Classifies every admitted track of every selected event
pub struct MlPidTask {
    config: TaskConfig,
    selector: EventSelector,
    filter: TrackFilter,
    channel: Option<Box<dyn ClassifierLink>>,
    filter_stats: FilterStats,
    summary: RunSummary,
}

impl MlPidTask {
    pub const NAME: &'static str = "ml-pid";

    /// Task that opens the configured pipes on [`initialize`](AnalysisTask::initialize)
    pub fn new(config: TaskConfig) -> Self {
        Self {
            selector: EventSelector::new(config.event_cuts.clone()),
            filter: TrackFilter::new(config.track_cuts.clone()),
            config,
            channel: None,
            filter_stats: FilterStats::default(),
            summary: RunSummary::new(Self::NAME),
        }
    }

    /// Task that talks over an already-open channel
    pub fn with_channel(config: TaskConfig, channel: Box<dyn ClassifierLink>) -> Self {
        let mut task = Self::new(config);
        task.channel = Some(channel);
        task
    }

    pub fn vocabulary(&self) -> Option<&ClassVocabulary> {
        self.channel.as_ref().and_then(|c| c.vocabulary())
    }

    pub fn channel_stats(&self) -> Option<&ChannelStats> {
        self.channel.as_ref().map(|c| c.stats())
    }

    pub fn filter_stats(&self) -> &FilterStats {
        &self.filter_stats
    }

    fn channel_mut(&mut self) -> Result<&mut Box<dyn ClassifierLink>> {
        self.channel.as_mut().ok_or(MlPidError::InvalidState {
            expected: "initialized task",
            found: "no classifier channel",
        })
    }
}

impl AnalysisTask for MlPidTask {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;

        if self.channel.is_none() {
            let channel = ClassifierChannel::open_pipes(&self.config.pipes)?;
            self.channel = Some(Box::new(channel));
        }

        let vocabulary = self.channel_mut()?.handshake()?;
        tracing::info!("ML PID task ready with classes {}", vocabulary);
        Ok(())
    }

    fn process_event(
        &mut self,
        event: &Event,
        pid: &dyn PidProvider,
        registry: &mut dyn PidRegistry,
    ) -> Result<EventOutcome> {
        registry.clear();

        if let Err(reason) = self.selector.select(event) {
            tracing::debug!("Event {} skipped: {}", event.id, reason);
            let outcome = EventOutcome::Skipped(reason);
            self.summary.record(outcome);
            return Ok(outcome);
        }

        let rejected_before = self.filter_stats.total_rejected();
        let batch = extract_batch(&event.tracks, &self.filter, pid, &mut self.filter_stats);
        self.summary.rejected_tracks += self.filter_stats.total_rejected() - rejected_before;

        let channel = self.channel_mut()?;
        let probabilities = channel.round_trip(&batch)?;

        let outcome = if batch.is_empty() {
            EventOutcome::NoTracks
        } else {
            let vocabulary = channel.vocabulary().ok_or(MlPidError::InvalidState {
                expected: "established vocabulary",
                found: "no vocabulary",
            })?;
            let published =
                binder::publish(vocabulary, batch.track_ids(), &probabilities, registry)?;
            EventOutcome::Classified(published)
        };

        tracing::debug!(
            "Event {}: {} of {} tracks classified",
            event.id,
            batch.len(),
            event.tracks.len()
        );
        self.summary.record(outcome);
        Ok(outcome)
    }

    fn shutdown(&mut self) -> Result<RunSummary> {
        let closed = match self.channel.as_mut() {
            Some(channel) => channel.shutdown(),
            None => Ok(()),
        };

        self.summary.finish();
        tracing::info!("{}", self.summary);
        closed?;
        Ok(self.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;
    use crate::event::{MockPidProvider, ResponseRegistry, Vertex};
    use crate::types::{FeatureBatch, ProbabilityBatch};

    /// Channel double answering every track with the same row
    struct ScriptedLink {
        state: ChannelState,
        vocabulary: Option<ClassVocabulary>,
        row: Vec<f32>,
        stats: ChannelStats,
        sent: Vec<usize>,
    }

    impl ScriptedLink {
        fn new(row: Vec<f32>) -> Self {
            Self {
                state: ChannelState::Uninitialized,
                vocabulary: None,
                row,
                stats: ChannelStats::default(),
                sent: Vec::new(),
            }
        }
    }

    impl ClassifierLink for ScriptedLink {
        fn state(&self) -> ChannelState {
            self.state
        }

        fn handshake(&mut self) -> Result<&ClassVocabulary> {
            self.state = ChannelState::Ready;
            let vocabulary = ClassVocabulary::new(vec![211, 321, 2212])?;
            Ok(&*self.vocabulary.insert(vocabulary))
        }

        fn vocabulary(&self) -> Option<&ClassVocabulary> {
            self.vocabulary.as_ref()
        }

        fn round_trip(&mut self, batch: &FeatureBatch) -> Result<ProbabilityBatch> {
            if batch.is_empty() {
                return Ok(ProbabilityBatch::new());
            }
            self.sent.push(batch.len());
            let flat: Vec<f32> = (0..batch.len()).flat_map(|_| self.row.clone()).collect();
            ProbabilityBatch::from_flat(&flat, self.row.len())
        }

        fn shutdown(&mut self) -> Result<()> {
            self.state = ChannelState::Closed;
            Ok(())
        }

        fn stats(&self) -> &ChannelStats {
            &self.stats
        }
    }

    fn selected_event() -> Event {
        Event {
            id: 3,
            ref_multiplicity: 5.0,
            vertex: Some(Vertex {
                z: 1.0,
                contributors: 4,
                ..Vertex::default()
            }),
            pile_up: false,
            tracks: Vec::new(),
        }
    }

    #[test]
    fn test_process_before_initialize() {
        let mut task = MlPidTask::new(TaskConfig::default());
        let mut pid = MockPidProvider::new();
        pid.expect_n_sigma().never();
        let mut registry = ResponseRegistry::new();

        let err = task
            .process_event(&selected_event(), &pid, &mut registry)
            .unwrap_err();
        assert!(matches!(err, MlPidError::InvalidState { .. }));
    }

    #[test]
    fn test_skipped_event_clears_registry() {
        let link = ScriptedLink::new(vec![1.0, 0.0, 0.0]);
        let mut task = MlPidTask::with_channel(TaskConfig::default(), Box::new(link));
        task.initialize().unwrap();

        let mut registry = ResponseRegistry::new();
        registry.set_response(
            crate::types::TrackId(1),
            crate::types::TrackResult {
                probabilities: vec![],
                predicted: 211,
            },
        );

        let mut event = selected_event();
        event.vertex = None;
        let outcome = task
            .process_event(&event, &MockPidProvider::new(), &mut registry)
            .unwrap();

        assert_eq!(outcome, EventOutcome::Skipped(SkipReason::NoVertex));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_event_without_tracks() {
        let link = ScriptedLink::new(vec![1.0, 0.0, 0.0]);
        let mut task = MlPidTask::with_channel(TaskConfig::default(), Box::new(link));
        task.initialize().unwrap();

        let mut registry = ResponseRegistry::new();
        let outcome = task
            .process_event(&selected_event(), &MockPidProvider::new(), &mut registry)
            .unwrap();
        assert_eq!(outcome, EventOutcome::NoTracks);

        let summary = task.shutdown().unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.empty_events, 1);
        assert!(summary.finished_at.is_some());
    }

    #[test]
    fn test_summary_display() {
        let mut summary = RunSummary::new("ml-pid");
        summary.record(EventOutcome::Classified(4));
        summary.record(EventOutcome::Skipped(SkipReason::PileUp));
        let text = summary.to_string();
        assert!(text.starts_with("ml-pid: 2 events (1 skipped, 0 without tracks), 4 tracks"));
    }
}
