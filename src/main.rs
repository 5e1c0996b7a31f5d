mod cli;
mod engine;
mod error;
mod event_log;
mod export;
mod model;
mod orchestrator;
mod parameters;
mod scheduler;
mod status;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr; the TUI owns the terminal, so it gets none.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.json || args.text || args.export_csv.is_some();
    if is_headless || cfg!(not(feature = "tui")) {
        init_tracing();
    }

    cli::run(args).await?;
    // Explicitly exit with code 0 on success for non-TUI modes
    if is_headless {
        std::process::exit(0);
    }
    Ok(())
}
