use crate::model::{Algorithm, Command, DataSource, FileDescriptor, SessionConfig};
use crate::orchestrator::{wall_clock_epoch, SessionController};
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "sawtooth-detector",
    version,
    about = "Sawtooth-oscillation detector control panel (simulated sessions)"
)]
pub struct Cli {
    /// Print a JSON session report and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text session report and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Data source to select in headless mode (file, adc or live)
    #[arg(long)]
    pub source: Option<DataSource>,

    /// File name reported by the file loader when --source file is used
    #[arg(long, default_value = "demo_data.mat")]
    pub file: String,

    /// Algorithm to select and apply (hybrid, gaussian, statistical, ml-cnn, ml-lstm)
    #[arg(long)]
    pub algorithm: Option<Algorithm>,

    /// Simulated time to run the headless session for
    #[arg(long, default_value = "40s")]
    pub run_for: humantime::Duration,

    /// JSON file with scripted commands: [{"after": "2s", "command": {"kind": "start_processing"}}]
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Seed for the simulated detection counts
    #[arg(long)]
    pub seed: Option<u64>,

    /// Interval between processing progress ticks
    #[arg(long, default_value = "100ms")]
    pub processing_tick: humantime::Duration,

    /// Delay before the ADC connection is established
    #[arg(long, default_value = "1s")]
    pub adc_delay: humantime::Duration,

    /// Interval between live-mode events
    #[arg(long, default_value = "1s")]
    pub live_interval: humantime::Duration,

    /// Number of live-mode events before the generator stops
    #[arg(long, default_value_t = 30)]
    pub live_events: u32,

    /// Maximum number of event log entries kept
    #[arg(long, default_value_t = 100)]
    pub log_capacity: usize,

    /// Event log entries older than this are removed by the periodic sweep
    #[arg(long, default_value = "30m")]
    pub log_max_age: humantime::Duration,

    /// Interval of the event log sweep
    #[arg(long, default_value = "5m")]
    pub log_sweep_interval: humantime::Duration,

    /// Directory the export command writes detection_results.csv into
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Write the demo detection CSV to this path and exit
    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

/// One scripted command, applied `after` the previous step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default, with = "humantime_serde")]
    pub after: Duration,
    pub command: Command,
}

/// Final state of a headless session.
#[derive(Debug, Serialize)]
struct SessionReport<'a> {
    snapshot: &'a crate::model::DisplaySnapshot,
    parameters: &'a crate::model::Parameters,
    session: &'a crate::model::Session,
    log: Vec<crate::model::LogEntry>,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    if let Some(p) = args.export_csv.as_deref() {
        crate::export::export_csv(p)?;
        eprintln!("Exported CSV: {}", p.display());
        return Ok(());
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args).await;
        }
    }

    run_headless(args).await
}

fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Build a `SessionConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SessionConfig {
    SessionConfig {
        processing_tick: Duration::from(args.processing_tick),
        adc_connect_delay: Duration::from(args.adc_delay),
        live_interval: Duration::from(args.live_interval),
        live_event_cap: args.live_events,
        log_capacity: args.log_capacity,
        log_max_age: Duration::from(args.log_max_age),
        log_sweep_interval: Duration::from(args.log_sweep_interval),
        export_delay: Duration::from_millis(500),
        export_dir: args.export_dir.clone().unwrap_or_else(default_export_dir),
        seed: args.seed,
    }
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse script {}", path.display()))
}

/// Select the requested source and, for file and ADC sources, start a run
/// once the source is ready.
fn prepare_source(ctl: &mut SessionController, args: &Cli, cfg: &SessionConfig) {
    let Some(source) = args.source else {
        return;
    };
    // Rejections land in the event log, which is part of the report.
    match source {
        DataSource::None => return,
        DataSource::File => {
            let _ = ctl.dispatch(Command::LoadFile {
                file: FileDescriptor::named(args.file.clone()),
            });
        }
        DataSource::Adc => {
            let _ = ctl.dispatch(Command::ConnectAdc);
            ctl.advance(cfg.adc_connect_delay);
        }
        DataSource::Live => {
            let _ = ctl.dispatch(Command::EnableLiveMode);
            return;
        }
    }
    let _ = ctl.dispatch(Command::StartProcessing);
}

/// Run a session on simulated time and print its final state.
async fn run_headless(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let script = match args.script.as_deref() {
        Some(p) => load_script(p)?,
        None => Vec::new(),
    };
    let (out_tx, out_handle) = spawn_output_writer();

    let mut ctl = SessionController::new(cfg.clone(), wall_clock_epoch());
    if let Some(algorithm) = args.algorithm {
        let _ = ctl.dispatch(Command::SelectAlgorithm { algorithm });
        let _ = ctl.dispatch(Command::ApplyAlgorithm);
    }
    prepare_source(&mut ctl, &args, &cfg);

    for step in script {
        ctl.advance(step.after);
        ctl.write_due_export();
        if let Err(e) = ctl.dispatch(step.command) {
            let _ = out_tx.send(OutputLine::Stderr(format!("Command rejected: {e}")));
        }
    }
    ctl.advance(Duration::from(args.run_for));
    ctl.write_due_export();
    tracing::info!(
        elapsed = ?ctl.elapsed(),
        ticks = ctl.processing_ticks(),
        live = ctl.live_running(),
        "headless session finished"
    );

    if args.json {
        let report = SessionReport {
            snapshot: ctl.snapshot(),
            parameters: ctl.parameters(),
            session: ctl.session(),
            log: ctl.log().to_vec(),
        };
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(ctl.snapshot(), ctl.log());
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    if let Some(path) = ctl.last_export() {
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", path.display())));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
