//! Real-time driver for the terminal UI.

use super::controller::{wall_clock_epoch, SessionController};
use crate::export;
use crate::model::{Algorithm, Command, DisplaySnapshot, LogEntry, Parameters, SessionConfig};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Duration, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct SessionView {
    pub snapshot: DisplaySnapshot,
    pub log: Vec<LogEntry>,
    pub draft: Parameters,
    pub selected_algorithm: Algorithm,
    pub detections: u32,
    pub live_events: Option<u32>,
    pub adc_pending: bool,
}

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Session(Command),
    Quit,
}

/// Drive a session on wall-clock time, applying UI commands as they arrive
/// and publishing a fresh view after every change.
pub(crate) async fn run_controller(
    cfg: SessionConfig,
    view_tx: UnboundedSender<Box<SessionView>>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut ctl = SessionController::new(cfg, wall_clock_epoch());
    let started = tokio::time::Instant::now();
    let mut frame = tokio::time::interval(Duration::from_millis(50));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    // File writes run on the blocking pool and report back here.
    let (export_tx, mut export_rx) = mpsc::unbounded_channel::<Result<PathBuf>>();

    let _ = view_tx.send(Box::new(ctl.view()));
    let mut published = ctl.revision();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Session(cmd)) => {
                        // Timers already due fire before the command sees the session.
                        ctl.advance_to(started.elapsed());
                        // Rejections are already in the event log.
                        let _ = ctl.dispatch(cmd);
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(res) = export_rx.recv() => {
                ctl.finish_export(res);
            }
            _ = frame.tick() => {
                ctl.advance_to(started.elapsed());
            }
            _ = &mut ctrl_c => break,
        }

        if let Some(dir) = ctl.take_export_request() {
            let tx = export_tx.clone();
            tokio::task::spawn_blocking(move || {
                let _ = tx.send(export::export_into(&dir));
            });
        }

        if ctl.revision() != published {
            published = ctl.revision();
            if view_tx.send(Box::new(ctl.view())).is_err() {
                break;
            }
        }
    }

    Ok(())
}
