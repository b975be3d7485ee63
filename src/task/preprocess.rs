//! Training-data dump
//!
//! Writes the feature row of every admitted track to a CSV file instead of
//! sending it to a classifier. Admission is the same as for classification,
//! so the training set matches what the model sees at inference time.
//!
//! Columns: `event_id,track_id,pdg_code` followed by the 25 feature columns in
//! wire order. `pdg_code` is the Monte-Carlo truth when the input is simulated
//! and known, else 0.

use super::{AnalysisTask, EventOutcome, EventSelector, RunSummary};
use crate::config::{DumpConfig, TaskConfig};
use crate::error::{MlPidError, Result, ResultExt};
use crate::event::{Event, PidProvider, PidRegistry};
use crate::features::{encode, AdmittedTrack, FilterStats, TrackFilter};
use crate::types::FeatureField;
use std::fs::File;
use std::io::{BufWriter, Write};

pub struct PreprocessTask {
    config: DumpConfig,
    selector: EventSelector,
    filter: TrackFilter,
    writer: Option<BufWriter<File>>,
    rows: u64,
    filter_stats: FilterStats,
    summary: RunSummary,
}

impl PreprocessTask {
    pub const NAME: &'static str = "preprocess";

    pub fn new(config: &TaskConfig) -> Self {
        Self {
            config: config.dump.clone(),
            selector: EventSelector::new(config.event_cuts.clone()),
            filter: TrackFilter::new(config.track_cuts.clone()),
            writer: None,
            rows: 0,
            filter_stats: FilterStats::default(),
            summary: RunSummary::new(Self::NAME),
        }
    }

    /// Data rows written so far (header excluded)
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn filter_stats(&self) -> &FilterStats {
        &self.filter_stats
    }

    fn header() -> String {
        let mut columns = vec!["event_id", "track_id", "pdg_code"];
        columns.extend(FeatureField::ALL.iter().map(|f| f.column_name()));
        columns.join(",")
    }

    fn write_row(&mut self, event_id: i64, track: &AdmittedTrack) -> Result<()> {
        let pdg = if self.config.is_mc {
            track.mc_pdg.unwrap_or(0)
        } else {
            0
        };
        let row = encode(&track.measurements);

        let writer = self.writer.as_mut().ok_or(MlPidError::InvalidState {
            expected: "open dump file",
            found: "no dump file",
        })?;
        write!(writer, "{},{},{}", event_id, track.id.0, pdg)?;
        for value in row.as_slice() {
            write!(writer, ",{}", value)?;
        }
        writeln!(writer)?;

        self.rows += 1;
        Ok(())
    }
}

impl AnalysisTask for PreprocessTask {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self) -> Result<()> {
        let path = &self.config.output_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let file =
            File::create(path).with_context(|| format!("Failed to create dump file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", Self::header())?;
        self.writer = Some(writer);

        tracing::info!("Writing training data to {:?}", path);
        Ok(())
    }

    fn process_event(
        &mut self,
        event: &Event,
        pid: &dyn PidProvider,
        _registry: &mut dyn PidRegistry,
    ) -> Result<EventOutcome> {
        if let Err(reason) = self.selector.select(event) {
            tracing::debug!("Event {} skipped: {}", event.id, reason);
            let outcome = EventOutcome::Skipped(reason);
            self.summary.record(outcome);
            return Ok(outcome);
        }

        let mut written = 0;
        for track in &event.tracks {
            match self.filter.admit(track, pid) {
                Ok(admitted) => {
                    self.filter_stats.record(Ok(()));
                    self.write_row(event.id, &admitted)?;
                    written += 1;
                }
                Err(reason) => {
                    tracing::trace!("Track {} rejected: {}", track.id, reason);
                    self.filter_stats.record(Err(reason));
                    self.summary.rejected_tracks += 1;
                }
            }
        }

        let outcome = if written == 0 {
            EventOutcome::NoTracks
        } else {
            EventOutcome::Written(written)
        };
        self.summary.record(outcome);
        Ok(outcome)
    }

    fn shutdown(&mut self) -> Result<RunSummary> {
        let flushed = match self.writer.take() {
            Some(mut writer) => writer
                .flush()
                .with_context(|| format!("Failed to flush {:?}", self.config.output_path)),
            None => Ok(()),
        };

        self.summary.finish();
        tracing::info!("{}; {} rows in {:?}", self.summary, self.rows, self.config.output_path);
        flushed?;
        Ok(self.summary.clone())
    }
}
