//! # mlpid: Machine-learning PID response over named pipes
//!
//! Classifies reconstructed tracks with an external classifier process. For
//! every collision event the selected tracks are encoded as 25-column feature
//! rows, written to a request pipe, and answered with one probability row per
//! track on a response pipe. Rows are matched to tracks purely by position.
//!
//! ## Architecture
//!
//! - **Features**: track admission ([`features::TrackFilter`]) and encoding
//! - **Codec**: binary (canonical) and text (legacy) framing of every message
//! - **Channel**: the pipe pair and its protocol state machine
//! - **Binder**: probability rows back onto track ids, arg-max prediction
//! - **Task**: the host lifecycle (`initialize`, `process_event`, `shutdown`)
//!   for classification and for the training-data dump
//!
//! ## Configuration
//!
//! Task settings are read from JSON or TOML. Without an explicit path the
//! config is looked up in the platform data directory under `dev.hxyulin.mlpid`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.mlpid/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.mlpid/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.mlpid\`
//!
//! ## Example
//!
//! ```ignore
//! use mlpid::{AnalysisTask, MlPidTask, RecordedPidProvider, ResponseRegistry, TaskConfig};
//!
//! let mut task = MlPidTask::new(TaskConfig::load_or_default(None)?);
//! task.initialize()?;
//!
//! let mut registry = ResponseRegistry::new();
//! for event in events {
//!     task.process_event(&event, &RecordedPidProvider, &mut registry)?;
//! }
//! let summary = task.shutdown()?;
//! ```

pub mod binder;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod features;
pub mod task;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelState, ClassifierChannel, ClassifierLink, ClassifierPeer};
pub use codec::Framing;
pub use config::TaskConfig;
pub use error::{MlPidError, Result};
pub use event::{Event, PidProvider, PidRegistry, RecordedPidProvider, ResponseRegistry};
pub use task::{AnalysisTask, EventOutcome, MlPidTask, PreprocessTask, RunSummary};
pub use types::{ClassVocabulary, FeatureBatch, ProbabilityBatch, TrackFeatureRow, TrackResult};
