use super::SessionCtx;
use crate::error::{AcquisitionError, SessionError};
use crate::model::{DataSource, FileDescriptor, LoadedFile, Severity};
use crate::scheduler::{TimerHandle, TimerKind};
use std::time::Duration;

/// Live events between two operator-visible log lines.
const LIVE_LOG_EVERY: u32 = 5;

struct LiveGenerator {
    timer: TimerHandle,
    emitted: u32,
}

/// Acquisition mode selection: file, ADC (delayed connect) or live generator.
pub struct DataSourceSession {
    adc_delay: Duration,
    live_interval: Duration,
    live_cap: u32,
    adc_pending: Option<TimerHandle>,
    // Another source was chosen after the pending connect was issued.
    adc_superseded: bool,
    live: Option<LiveGenerator>,
}

impl DataSourceSession {
    pub fn new(adc_delay: Duration, live_interval: Duration, live_cap: u32) -> Self {
        Self {
            adc_delay,
            live_interval,
            live_cap: live_cap.max(1),
            adc_pending: None,
            adc_superseded: false,
            live: None,
        }
    }

    #[cfg(any(test, feature = "tui"))]
    pub fn adc_pending(&self) -> bool {
        self.adc_pending.is_some()
    }

    pub fn live_running(&self) -> bool {
        self.live.is_some()
    }

    #[cfg(any(test, feature = "tui"))]
    pub fn live_emitted(&self) -> Option<u32> {
        self.live.as_ref().map(|g| g.emitted)
    }

    pub fn select_file(
        &mut self,
        ctx: &mut SessionCtx<'_>,
        file: FileDescriptor,
    ) -> Result<(), SessionError> {
        ensure_unlocked(ctx)?;
        if file.name.trim().is_empty() {
            return Err(AcquisitionError::EmptyFileName.into());
        }

        ctx.log(Severity::System, format!("Selected file: {}", file.summary()));
        let name = file.name.clone();
        let loaded_at = ctx.scheduler.now();
        ctx.session.loaded_file = Some(LoadedFile {
            descriptor: file,
            loaded_at,
        });
        self.switch_to(ctx, DataSource::File);
        tracing::info!(file = %name, "file source selected");
        ctx.log(
            Severity::Success,
            format!("File \"{name}\" loaded successfully"),
        );
        Ok(())
    }

    /// Begin the delayed ADC handshake. A second call while one is pending
    /// does not rearm the timer. The session switches to the ADC on
    /// resolution unless another source was chosen in the meantime.
    pub fn connect_adc(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError> {
        ensure_unlocked(ctx)?;
        if self.adc_pending.is_some() {
            // Asking again makes the ADC the latest choice.
            self.adc_superseded = false;
            tracing::debug!("ADC connection already pending");
            return Ok(());
        }
        ctx.log(Severity::System, "Connecting to ADC...");
        self.adc_superseded = false;
        self.adc_pending = Some(
            ctx.scheduler
                .schedule_once(self.adc_delay, TimerKind::AdcConnect),
        );
        Ok(())
    }

    pub fn on_adc_connected(&mut self, handle: TimerHandle, ctx: &mut SessionCtx<'_>) {
        if self.adc_pending != Some(handle) {
            return;
        }
        self.adc_pending = None;
        ctx.session.connected = true;

        if std::mem::take(&mut self.adc_superseded) {
            tracing::info!(source = ?ctx.session.data_source, "ADC connected in background");
            ctx.log(
                Severity::System,
                format!(
                    "Connected to ADC. Keeping the current data source ({})",
                    ctx.session.data_source.label()
                ),
            );
            return;
        }
        if ctx.session.processing() {
            // The run keeps its source; the link stays up for later.
            ctx.log(
                Severity::Warning,
                "ADC connected, but the data source is locked while processing",
            );
            return;
        }
        self.switch_to(ctx, DataSource::Adc);
        tracing::info!("ADC connected");
        ctx.log(
            Severity::Success,
            "Connected to ADC. Ready to receive data.",
        );
    }

    pub fn enable_live_mode(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError> {
        ensure_unlocked(ctx)?;
        self.switch_to(ctx, DataSource::Live);
        ctx.log(
            Severity::System,
            "Live mode enabled. Waiting for real-time data...",
        );
        if self.live.is_none() {
            let timer = ctx
                .scheduler
                .schedule_interval(self.live_interval, TimerKind::LiveSample);
            self.live = Some(LiveGenerator { timer, emitted: 0 });
            ctx.log(Severity::System, "Started receiving real-time data...");
        }
        Ok(())
    }

    pub fn on_live_sample(&mut self, handle: TimerHandle, ctx: &mut SessionCtx<'_>) {
        let cap = self.live_cap;
        let Some(generator) = self.live.as_mut().filter(|g| g.timer == handle) else {
            return;
        };

        // A foreground run owns the detection count while it is active.
        if !ctx.session.processing() && ctx.session.data_source == DataSource::Live {
            generator.emitted += 1;
            let n = generator.emitted;
            ctx.session.detection_count = n;
            if n % LIVE_LOG_EVERY == 0 {
                ctx.log(
                    Severity::Success,
                    format!("Detected event #{n} in real time"),
                );
            }
        }

        if generator.emitted >= cap {
            let timer = generator.timer;
            self.live = None;
            ctx.scheduler.cancel(timer);
            tracing::info!(events = cap, "live generator finished");
            ctx.log(
                Severity::System,
                "Live data reception finished (demo mode)",
            );
        }
    }

    /// Point the session at `source`, tearing down the live generator when
    /// leaving live mode.
    fn switch_to(&mut self, ctx: &mut SessionCtx<'_>, source: DataSource) {
        if source != DataSource::Adc && self.adc_pending.is_some() {
            self.adc_superseded = true;
        }
        if source != DataSource::Live {
            if let Some(generator) = self.live.take() {
                ctx.scheduler.cancel(generator.timer);
                ctx.log(Severity::System, "Live data reception stopped");
            }
        }
        ctx.session.data_source = source;
    }
}

fn ensure_unlocked(ctx: &SessionCtx<'_>) -> Result<(), SessionError> {
    if ctx.session.processing() {
        Err(SessionError::SourceLockedWhileProcessing)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;
    use crate::model::{ProcessingRun, Session};
    use crate::scheduler::Scheduler;
    use time::OffsetDateTime;

    struct State {
        session: Session,
        scheduler: Scheduler,
        log: EventLog,
    }

    impl State {
        fn new() -> Self {
            Self {
                session: Session::default(),
                scheduler: Scheduler::new(OffsetDateTime::UNIX_EPOCH),
                log: EventLog::new(100),
            }
        }

        fn ctx(&mut self) -> SessionCtx<'_> {
            SessionCtx {
                session: &mut self.session,
                scheduler: &mut self.scheduler,
                log: &mut self.log,
            }
        }
    }

    fn sources() -> DataSourceSession {
        DataSourceSession::new(Duration::from_secs(1), Duration::from_secs(1), 30)
    }

    fn run_for(st: &mut State, ds: &mut DataSourceSession, d: Duration) {
        let until = st.scheduler.elapsed() + d;
        while let Some(f) = st.scheduler.pop_due(until) {
            match f.kind {
                TimerKind::AdcConnect => ds.on_adc_connected(f.handle, &mut st.ctx()),
                TimerKind::LiveSample => ds.on_live_sample(f.handle, &mut st.ctx()),
                other => panic!("unexpected timer {other:?}"),
            }
        }
        st.scheduler.settle_at(until);
    }

    fn lock(st: &mut State) {
        st.session.data_source = DataSource::File;
        st.session.run = Some(ProcessingRun {
            progress_percent: 0,
            started_at: OffsetDateTime::UNIX_EPOCH,
        });
    }

    #[test]
    fn file_selection_records_metadata() {
        let mut st = State::new();
        let mut ds = sources();
        let file = FileDescriptor {
            name: "shot_41234.mat".into(),
            size_bytes: 2048,
            mime_type: None,
            modified: None,
        };
        ds.select_file(&mut st.ctx(), file).unwrap();
        assert_eq!(st.session.data_source, DataSource::File);
        let loaded = st.session.loaded_file.as_ref().unwrap();
        assert_eq!(loaded.descriptor.summary(), "shot_41234.mat · 2.00 KB · Unknown format");
        assert_eq!(st.log.latest().unwrap().severity, Severity::Success);
    }

    #[test]
    fn empty_file_name_is_rejected() {
        let mut st = State::new();
        let mut ds = sources();
        let err = ds
            .select_file(&mut st.ctx(), FileDescriptor::named("  "))
            .unwrap_err();
        assert_eq!(err, SessionError::Acquisition(AcquisitionError::EmptyFileName));
        assert_eq!(st.session.data_source, DataSource::None);
    }

    #[test]
    fn selection_is_locked_while_processing() {
        let mut st = State::new();
        let mut ds = sources();
        lock(&mut st);
        let locked = Err(SessionError::SourceLockedWhileProcessing);
        assert_eq!(ds.select_file(&mut st.ctx(), FileDescriptor::named("a.mat")), locked);
        assert_eq!(ds.connect_adc(&mut st.ctx()), locked);
        assert_eq!(ds.enable_live_mode(&mut st.ctx()), locked);
        assert_eq!(st.session.data_source, DataSource::File);
        assert_eq!(st.scheduler.pending_count(), 0);
    }

    #[test]
    fn adc_connects_after_delay_and_ignores_duplicates() {
        let mut st = State::new();
        let mut ds = sources();
        ds.connect_adc(&mut st.ctx()).unwrap();
        ds.connect_adc(&mut st.ctx()).unwrap();
        assert_eq!(st.scheduler.pending_count(), 1);
        assert!(!st.session.connected);
        assert_eq!(st.session.data_source, DataSource::None);

        run_for(&mut st, &mut ds, Duration::from_millis(999));
        assert!(!st.session.connected);
        run_for(&mut st, &mut ds, Duration::from_millis(1));
        assert!(st.session.connected);
        assert_eq!(st.session.data_source, DataSource::Adc);
        assert!(!ds.adc_pending());
    }

    #[test]
    fn adc_resolution_during_a_run_keeps_the_source() {
        let mut st = State::new();
        let mut ds = sources();
        ds.connect_adc(&mut st.ctx()).unwrap();
        lock(&mut st);
        run_for(&mut st, &mut ds, Duration::from_secs(2));
        assert!(st.session.connected);
        assert_eq!(st.session.data_source, DataSource::File);
        assert_eq!(st.log.latest().unwrap().severity, Severity::Warning);
    }

    #[test]
    fn later_choice_wins_over_a_pending_adc_connect() {
        let mut st = State::new();
        let mut ds = sources();
        ds.connect_adc(&mut st.ctx()).unwrap();
        run_for(&mut st, &mut ds, Duration::from_millis(200));
        ds.enable_live_mode(&mut st.ctx()).unwrap();
        run_for(&mut st, &mut ds, Duration::from_millis(900));

        assert!(st.session.connected);
        assert!(!ds.adc_pending());
        assert_eq!(st.session.data_source, DataSource::Live);
        assert!(ds.live_running());
        assert_eq!(
            st.log.latest().map(|e| e.message.as_str()),
            Some("Connected to ADC. Keeping the current data source (Live mode)")
        );

        run_for(&mut st, &mut ds, Duration::from_secs(40));
        assert_eq!(st.session.detection_count, 30);
    }

    #[test]
    fn reconnecting_after_a_superseded_connect_switches_to_adc() {
        let mut st = State::new();
        let mut ds = sources();
        ds.connect_adc(&mut st.ctx()).unwrap();
        ds.select_file(&mut st.ctx(), FileDescriptor::named("a.mat"))
            .unwrap();
        run_for(&mut st, &mut ds, Duration::from_secs(2));
        assert_eq!(st.session.data_source, DataSource::File);

        ds.connect_adc(&mut st.ctx()).unwrap();
        run_for(&mut st, &mut ds, Duration::from_secs(2));
        assert_eq!(st.session.data_source, DataSource::Adc);
    }

    #[test]
    fn live_generator_stops_at_cap() {
        let mut st = State::new();
        let mut ds = sources();
        ds.enable_live_mode(&mut st.ctx()).unwrap();
        run_for(&mut st, &mut ds, Duration::from_secs(35));
        assert_eq!(st.session.detection_count, 30);
        assert!(!ds.live_running());
        assert_eq!(st.scheduler.pending_count(), 0);
        assert_eq!(
            st.log.latest().map(|e| e.message.as_str()),
            Some("Live data reception finished (demo mode)")
        );
        let milestones = st
            .log
            .iter()
            .filter(|e| e.message.contains("in real time"))
            .count();
        assert_eq!(milestones, 6);
    }

    #[test]
    fn live_generator_pauses_during_a_run() {
        let mut st = State::new();
        let mut ds = sources();
        ds.enable_live_mode(&mut st.ctx()).unwrap();
        run_for(&mut st, &mut ds, Duration::from_secs(3));
        assert_eq!(ds.live_emitted(), Some(3));

        st.session.run = Some(ProcessingRun {
            progress_percent: 0,
            started_at: OffsetDateTime::UNIX_EPOCH,
        });
        run_for(&mut st, &mut ds, Duration::from_secs(5));
        assert_eq!(ds.live_emitted(), Some(3));
        assert_eq!(st.session.detection_count, 3);
    }

    #[test]
    fn leaving_live_mode_tears_down_the_generator() {
        let mut st = State::new();
        let mut ds = sources();
        ds.enable_live_mode(&mut st.ctx()).unwrap();
        ds.select_file(&mut st.ctx(), FileDescriptor::named("b.mat"))
            .unwrap();
        assert!(!ds.live_running());
        assert_eq!(st.scheduler.pending_count(), 0);
    }
}
