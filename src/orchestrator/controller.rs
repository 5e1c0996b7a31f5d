//! Session controller.
//!
//! Owns the whole detection session, applies operator commands, routes fired
//! timers to the component that armed them and keeps the display snapshot in
//! step with every transition. Headless runs advance it on virtual time;
//! `driver::run_controller` advances it on the wall clock.

use crate::engine::{DataSourceSession, ProcessingController, SessionCtx, TickOutcome};
use crate::error::SessionError;
use crate::event_log::EventLog;
use crate::export;
use crate::model::{
    Algorithm, ChartLayer, Command, DataSource, DisplaySnapshot, Parameters, Session,
    SessionConfig, Severity,
};
use crate::parameters::{describe_applied, describe_reset, ParameterStore};
use crate::scheduler::{Fired, Scheduler, TimerHandle, TimerKind};
use crate::status;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

#[cfg(any(test, feature = "tui"))]
use super::driver::SessionView;

pub struct SessionController {
    cfg: SessionConfig,
    session: Session,
    params: ParameterStore,
    log: EventLog,
    scheduler: Scheduler,
    sources: DataSourceSession,
    processing: ProcessingController,
    rng: StdRng,
    export_pending: Option<TimerHandle>,
    // Export whose delay elapsed; the caller writes the file.
    export_request: Option<PathBuf>,
    last_export: Option<PathBuf>,
    snapshot: DisplaySnapshot,
    revision: u64,
}

impl SessionController {
    pub fn new(cfg: SessionConfig, epoch: OffsetDateTime) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let session = Session::default();
        let params = ParameterStore::default();
        let snapshot = status::project(&session, params.committed());
        let mut ctl = Self {
            session,
            params,
            log: EventLog::new(cfg.log_capacity),
            scheduler: Scheduler::new(epoch),
            sources: DataSourceSession::new(
                cfg.adc_connect_delay,
                cfg.live_interval,
                cfg.live_event_cap,
            ),
            processing: ProcessingController::new(cfg.processing_tick),
            rng,
            export_pending: None,
            export_request: None,
            last_export: None,
            snapshot,
            revision: 0,
            cfg,
        };
        ctl.scheduler
            .schedule_interval(ctl.cfg.log_sweep_interval, TimerKind::LogSweep);
        ctl.append(
            Severity::System,
            "System initialized. Waiting for input data.",
        );
        ctl
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn parameters(&self) -> &Parameters {
        self.params.committed()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn snapshot(&self) -> &DisplaySnapshot {
        &self.snapshot
    }

    /// Bumped on every command and every fired timer.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn elapsed(&self) -> Duration {
        self.scheduler.elapsed()
    }

    pub fn last_export(&self) -> Option<&Path> {
        self.last_export.as_deref()
    }

    pub fn processing_ticks(&self) -> u64 {
        self.processing.ticks_observed()
    }

    pub fn live_running(&self) -> bool {
        self.sources.live_running()
    }

    /// Apply one operator command. A rejected command has already been
    /// written to the event log when this returns.
    pub fn dispatch(&mut self, cmd: Command) -> Result<(), SessionError> {
        tracing::debug!(?cmd, "dispatch");
        let res = self.apply(cmd);
        if let Err(e) = &res {
            tracing::warn!(error = %e, "command rejected");
            self.append(e.severity(), e.to_string());
        }
        self.revision += 1;
        self.refresh();
        res
    }

    pub fn advance(&mut self, dt: Duration) {
        let until = self.scheduler.elapsed() + dt;
        self.advance_to(until);
    }

    /// Fire every timer due up to `until` (time since the session started),
    /// one at a time and in deadline order.
    pub fn advance_to(&mut self, until: Duration) {
        while let Some(fired) = self.scheduler.pop_due(until) {
            self.on_timer(fired);
            self.revision += 1;
            self.refresh();
        }
        self.scheduler.settle_at(until);
    }

    fn apply(&mut self, cmd: Command) -> Result<(), SessionError> {
        let mut ctx = SessionCtx {
            session: &mut self.session,
            scheduler: &mut self.scheduler,
            log: &mut self.log,
        };
        match cmd {
            Command::LoadFile { file } => self.sources.select_file(&mut ctx, file),
            Command::ConnectAdc => self.sources.connect_adc(&mut ctx),
            Command::EnableLiveMode => self.sources.enable_live_mode(&mut ctx),
            Command::SelectAlgorithm { algorithm } => {
                ctx.session.algorithm = algorithm;
                ctx.log(
                    Severity::System,
                    format!("Selected algorithm: {}", algorithm.display_name()),
                );
                Ok(())
            }
            Command::ApplyAlgorithm => {
                let algorithm: Algorithm = ctx.session.algorithm;
                ctx.session.applied_algorithm = algorithm;
                ctx.log(
                    Severity::Success,
                    format!("Applied algorithm: {}", algorithm.display_name()),
                );
                if ctx.session.data_source != DataSource::None {
                    self.processing.start(&mut ctx)?;
                }
                Ok(())
            }
            Command::SetParameterDraft { field, value } => {
                self.params.set_draft(field, value)?;
                tracing::debug!(%field, value, "parameter draft updated");
                Ok(())
            }
            Command::ApplyParameters => {
                let applied = self.params.commit()?;
                ctx.log(Severity::Success, describe_applied(&applied));
                Ok(())
            }
            Command::ResetParameters => {
                let defaults = self.params.reset_to_defaults();
                ctx.log(Severity::System, describe_reset(&defaults));
                Ok(())
            }
            Command::StartProcessing => self.processing.start(&mut ctx),
            Command::StopProcessing => {
                self.processing.stop(&mut ctx);
                Ok(())
            }
            Command::ClearLog => {
                let now = ctx.scheduler.now();
                ctx.log.clear(now);
                Ok(())
            }
            Command::Export => {
                if self.export_pending.is_none() {
                    ctx.log(Severity::System, "Data export started...");
                    self.export_pending = Some(
                        ctx.scheduler
                            .schedule_once(self.cfg.export_delay, TimerKind::ExportReady),
                    );
                }
                Ok(())
            }
            Command::SetLayerVisible { layer, visible } => {
                let view = &mut ctx.session.view;
                match layer {
                    ChartLayer::RawSignal => view.show_raw = visible,
                    ChartLayer::Processed => view.show_processed = visible,
                    ChartLayer::Detections => view.show_detections = visible,
                }
                ctx.log(Severity::System, "Visualization settings updated");
                Ok(())
            }
            Command::ZoomIn => {
                ctx.session.view.zoom = ctx.session.view.zoom.saturating_add(1);
                ctx.log(Severity::System, "Zoomed in on chart");
                Ok(())
            }
            Command::ZoomOut => {
                ctx.session.view.zoom = ctx.session.view.zoom.saturating_sub(1);
                ctx.log(Severity::System, "Zoomed out of chart");
                Ok(())
            }
            Command::ResetView => {
                ctx.session.view.zoom = 0;
                ctx.log(Severity::System, "Chart view reset");
                Ok(())
            }
        }
    }

    fn on_timer(&mut self, fired: Fired) {
        let mut ctx = SessionCtx {
            session: &mut self.session,
            scheduler: &mut self.scheduler,
            log: &mut self.log,
        };
        match fired.kind {
            TimerKind::ProcessingTick => {
                let outcome = self.processing.on_tick(fired.handle, &mut ctx, &mut self.rng);
                if let TickOutcome::Completed { detections } = outcome {
                    tracing::debug!(detections, "refreshing display after run");
                }
            }
            TimerKind::AdcConnect => self.sources.on_adc_connected(fired.handle, &mut ctx),
            TimerKind::LiveSample => self.sources.on_live_sample(fired.handle, &mut ctx),
            TimerKind::LogSweep => {
                let now = ctx.scheduler.now();
                let removed = ctx.log.evict_older_than(now, self.cfg.log_max_age);
                tracing::debug!(removed, "event log sweep");
            }
            TimerKind::ExportReady => {
                if self.export_pending != Some(fired.handle) {
                    return;
                }
                self.export_pending = None;
                self.export_request = Some(self.cfg.export_dir.clone());
            }
        }
    }

    /// Directory of an export whose delay has elapsed but whose file has not
    /// been written yet. The caller writes it and reports via `finish_export`.
    pub fn take_export_request(&mut self) -> Option<PathBuf> {
        self.export_request.take()
    }

    /// Log the outcome of an export write.
    pub fn finish_export(&mut self, res: Result<PathBuf>) {
        match res {
            Ok(path) => {
                self.append(
                    Severity::Success,
                    format!("Data exported to \"{}\"", export::EXPORT_FILE_NAME),
                );
                tracing::info!(path = %path.display(), "demo CSV exported");
                self.last_export = Some(path);
            }
            Err(e) => self.append(Severity::Error, format!("Export failed: {e:#}")),
        }
        self.revision += 1;
        self.refresh();
    }

    /// Write any due export on the calling thread.
    pub fn write_due_export(&mut self) {
        if let Some(dir) = self.take_export_request() {
            let res = export::export_into(&dir);
            self.finish_export(res);
        }
    }

    fn append(&mut self, severity: Severity, message: impl Into<String>) {
        let now = self.scheduler.now();
        self.log.append(now, severity, message);
    }

    fn refresh(&mut self) {
        self.snapshot = status::project(&self.session, self.params.committed());
    }

    /// Everything the terminal UI renders for one frame.
    #[cfg(any(test, feature = "tui"))]
    pub fn view(&self) -> SessionView {
        SessionView {
            snapshot: self.snapshot.clone(),
            log: self.log.to_vec(),
            draft: *self.params.draft(),
            selected_algorithm: self.session.algorithm,
            detections: self.session.detection_count,
            live_events: self.sources.live_emitted(),
            adc_pending: self.sources.adc_pending(),
        }
    }
}

/// Wall-clock start of a session: local time when the offset is known.
pub fn wall_clock_epoch() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
