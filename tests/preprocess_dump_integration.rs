//! Integration tests for the training-data dump

mod common;

use common::builders::{EventBuilder, TrackBuilder};
use mlpid::event::{RecordedPidProvider, ResponseRegistry};
use mlpid::{AnalysisTask, EventOutcome, PreprocessTask, TaskConfig};
use tempfile::TempDir;

fn dump_config(dir: &TempDir, is_mc: bool) -> TaskConfig {
    let mut config = TaskConfig::default();
    config.dump.output_path = dir.path().join("out").join("PreprocessedML.csv");
    config.dump.is_mc = is_mc;
    config
}

#[test]
fn test_header_once_and_one_row_per_track() {
    let dir = TempDir::new().unwrap();
    let config = dump_config(&dir, true);
    let mut task = PreprocessTask::new(&config);
    task.initialize().unwrap();

    let mut registry = ResponseRegistry::new();
    let first = EventBuilder::new(100)
        .track(TrackBuilder::new(1).mc_pdg(211).build())
        .track(TrackBuilder::new(2).pt(25.0).build())
        .build();
    let second = EventBuilder::new(101)
        .track(TrackBuilder::new(7).mc_pdg(-2212).pt(2.5).build())
        .build();

    assert_eq!(
        task.process_event(&first, &RecordedPidProvider, &mut registry)
            .unwrap(),
        EventOutcome::Written(1)
    );
    task.process_event(&second, &RecordedPidProvider, &mut registry)
        .unwrap();
    assert_eq!(task.rows_written(), 2);

    let summary = task.shutdown().unwrap();
    assert_eq!(summary.tracks, 2);
    assert_eq!(summary.rejected_tracks, 1);

    let content = std::fs::read_to_string(&config.dump.output_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("event_id,track_id,pdg_code,TPCNcls,"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("event_id")).count(), 1);

    let row: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(row.len(), 28);
    assert_eq!(&row[..3], &["101", "7", "-2212"]);
    common::assert_float_eq(row[6].parse::<f64>().unwrap(), 2.5, 1e-6);
}

#[test]
fn test_truth_hidden_for_real_data() {
    let dir = TempDir::new().unwrap();
    let config = dump_config(&dir, false);
    let mut task = PreprocessTask::new(&config);
    task.initialize().unwrap();

    let event = EventBuilder::new(5)
        .track(TrackBuilder::new(3).mc_pdg(321).build())
        .build();
    task.process_event(&event, &RecordedPidProvider, &mut ResponseRegistry::new())
        .unwrap();
    task.shutdown().unwrap();

    let content = std::fs::read_to_string(&config.dump.output_path).unwrap();
    let row = content.lines().nth(1).unwrap();
    assert!(row.starts_with("5,3,0,"));
}

#[test]
fn test_skipped_events_write_nothing() {
    let dir = TempDir::new().unwrap();
    let config = dump_config(&dir, false);
    let mut task = PreprocessTask::new(&config);
    task.initialize().unwrap();

    let event = EventBuilder::new(1)
        .no_vertex()
        .track(TrackBuilder::new(1).build())
        .build();
    let outcome = task
        .process_event(&event, &RecordedPidProvider, &mut ResponseRegistry::new())
        .unwrap();
    assert!(matches!(outcome, EventOutcome::Skipped(_)));

    task.shutdown().unwrap();
    let content = std::fs::read_to_string(&config.dump.output_path).unwrap();
    assert_eq!(content.lines().count(), 1);
}
