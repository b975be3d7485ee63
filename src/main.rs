//! ML PID - Main Entry Point
//!
//! Drives the classification or dump task over events read from a JSON-lines
//! file, or serves the classifier side of the pipe protocol.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mlpid::{
    channel::{Classifier, ClassifierPeer, NSigmaClassifier, UniformClassifier},
    config::{default_config_path, TaskConfig},
    AnalysisTask, ClassVocabulary, Event, Framing, MlPidTask, PreprocessTask, RecordedPidProvider,
    ResponseRegistry,
};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mlpid", version, about = "Machine-learning PID response over named pipes")]
struct Cli {
    /// Task configuration (JSON, or TOML by extension)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the tracks of every event through the external classifier.
    Run {
        /// Events, one JSON object per line
        #[arg(long)]
        events: PathBuf,
        /// Write per-track results as JSON lines
        #[arg(long)]
        results: Option<PathBuf>,
        #[arg(long)]
        framing: Option<Framing>,
    },
    /// Answer requests on the pipes as a stand-in classifier.
    Serve {
        /// Class ids offered in the handshake
        #[arg(long, value_delimiter = ',', default_value = "11,13,211,321,2212")]
        classes: Vec<i32>,
        #[arg(long, value_enum, default_value_t = Model::Nsigma)]
        model: Model,
        #[arg(long)]
        framing: Option<Framing>,
    },
    /// Write admitted tracks to CSV as training data.
    Dump {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Input is simulated; write truth PDG codes
        #[arg(long)]
        mc: bool,
    },
    /// Write the effective configuration to a file.
    SaveConfig {
        /// Defaults to the platform data directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Model {
    Uniform,
    Nsigma,
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().context("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mlpid=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn read_events(path: &Path) -> Result<Vec<Event>> {
    let file = File::open(path).with_context(|| format!("opening events {:?}", path))?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {:?}", path))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("{:?} line {}: invalid event", path, index + 1))?;
        events.push(event);
    }
    tracing::info!("Read {} events from {:?}", events.len(), path);
    Ok(events)
}

fn run(config: TaskConfig, events: &Path, results: Option<&Path>) -> Result<()> {
    let events = read_events(events)?;
    let mut results = match results {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {:?}", path))?,
        )),
        None => None,
    };

    let mut task = MlPidTask::new(config);
    task.initialize().context("connecting to the classifier")?;

    let mut registry = ResponseRegistry::new();
    for event in &events {
        task.process_event(event, &RecordedPidProvider, &mut registry)
            .with_context(|| format!("event {}", event.id))?;

        if let Some(out) = results.as_mut() {
            for (track, result) in registry.sorted() {
                let line = serde_json::json!({
                    "event_id": event.id,
                    "track_id": track,
                    "predicted": result.predicted,
                    "probabilities": result.probabilities,
                });
                writeln!(out, "{}", line)?;
            }
        }
    }

    if let Some(mut out) = results {
        out.flush()?;
    }
    let summary = task.shutdown()?;
    if let Some(stats) = task.channel_stats() {
        tracing::info!("Classifier link: {}", stats);
    }
    println!("{}", summary);
    Ok(())
}

fn serve_with<C: Classifier>(
    config: &TaskConfig,
    vocabulary: ClassVocabulary,
    classifier: C,
) -> Result<()> {
    let pipes = &config.pipes;
    // Same open order as the task side, or both ends block forever
    let requests = File::open(&pipes.request_path)
        .with_context(|| format!("opening request pipe {:?}", pipes.request_path))?;
    let responses = OpenOptions::new()
        .write(true)
        .open(&pipes.response_path)
        .with_context(|| format!("opening response pipe {:?}", pipes.response_path))?;

    let mut peer = ClassifierPeer::new(
        pipes.framing,
        BufReader::new(requests),
        BufWriter::new(responses),
        vocabulary,
        classifier,
    );
    let stats = peer.serve()?;
    println!(
        "served {} batches, {} tracks",
        stats.batches, stats.tracks
    );
    Ok(())
}

fn dump(mut config: TaskConfig, events: &Path, out: Option<PathBuf>, mc: bool) -> Result<()> {
    if let Some(out) = out {
        config.dump.output_path = out;
    }
    config.dump.is_mc |= mc;

    let events = read_events(events)?;
    let mut task = PreprocessTask::new(&config);
    task.initialize()?;

    let mut registry = ResponseRegistry::new();
    for event in &events {
        task.process_event(event, &RecordedPidProvider, &mut registry)?;
    }

    let rows = task.rows_written();
    let summary = task.shutdown()?;
    println!("{}", summary);
    println!("{} rows written to {:?}", rows, config.dump.output_path);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    let mut config = TaskConfig::load_or_default(cli.config.as_deref())?;
    tracing::info!("Starting mlpid");

    match cli.command {
        Commands::Run {
            events,
            results,
            framing,
        } => {
            if let Some(framing) = framing {
                config.pipes.framing = framing;
            }
            run(config, &events, results.as_deref())
        }
        Commands::Serve {
            classes,
            model,
            framing,
        } => {
            if let Some(framing) = framing {
                config.pipes.framing = framing;
            }
            let vocabulary = ClassVocabulary::new(classes)?;
            match model {
                Model::Uniform => serve_with(&config, vocabulary, UniformClassifier),
                Model::Nsigma => serve_with(&config, vocabulary, NSigmaClassifier),
            }
        }
        Commands::Dump { events, out, mc } => dump(config, &events, out, mc),
        Commands::SaveConfig { out } => {
            let path = match out.or_else(default_config_path) {
                Some(path) => path,
                None => bail!("no platform data directory; pass --out"),
            };
            config.validate()?;
            config.save(&path)?;
            println!("configuration written to {:?}", path);
            Ok(())
        }
    }
}
