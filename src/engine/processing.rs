use super::SessionCtx;
use crate::error::SessionError;
use crate::model::{DataSource, ProcessingRun, Severity};
use crate::scheduler::{TimerHandle, TimerKind};
use rand::Rng;
use std::ops::Range;
use std::time::Duration;

/// Progress added per tick, in percent.
const PROGRESS_STEP: u8 = 10;
/// Detection counts reported by a finished run.
pub const DETECTION_RANGE: Range<u32> = 10..30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Progress(u8),
    Completed { detections: u32 },
}

/// Drives a simulated detection run: Idle -> Running -> Idle.
pub struct ProcessingController {
    tick: Duration,
    timer: Option<TimerHandle>,
    ticks_observed: u64,
}

impl ProcessingController {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            timer: None,
            ticks_observed: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Total progress ticks handled over the controller's lifetime.
    pub fn ticks_observed(&self) -> u64 {
        self.ticks_observed
    }

    pub fn start(&mut self, ctx: &mut SessionCtx<'_>) -> Result<(), SessionError> {
        if self.is_running() {
            tracing::debug!("start ignored: run already in progress");
            return Ok(());
        }
        if ctx.session.data_source == DataSource::None {
            return Err(SessionError::NoDataSource);
        }

        let now = ctx.scheduler.now();
        ctx.session.run = Some(ProcessingRun {
            progress_percent: 0,
            started_at: now,
        });
        ctx.session.last_process_time = Some(now);
        self.timer = Some(
            ctx.scheduler
                .schedule_interval(self.tick, TimerKind::ProcessingTick),
        );
        tracing::info!(source = ?ctx.session.data_source, "processing started");
        ctx.log(Severity::System, "Data processing started...");
        Ok(())
    }

    pub fn on_tick<R: Rng>(
        &mut self,
        handle: TimerHandle,
        ctx: &mut SessionCtx<'_>,
        rng: &mut R,
    ) -> TickOutcome {
        if self.timer != Some(handle) {
            // A tick for a run that no longer exists.
            return TickOutcome::Ignored;
        }
        let Some(run) = ctx.session.run.as_mut() else {
            return TickOutcome::Ignored;
        };
        self.ticks_observed += 1;
        run.progress_percent = run.progress_percent.saturating_add(PROGRESS_STEP).min(100);
        let progress = run.progress_percent;
        if progress < 100 {
            return TickOutcome::Progress(progress);
        }

        self.finish(ctx);
        let detections = rng.gen_range(DETECTION_RANGE);
        ctx.session.detection_count = detections;
        tracing::info!(detections, "processing completed");
        ctx.log(
            Severity::Success,
            format!("Processing finished. Detected {detections} events"),
        );
        TickOutcome::Completed { detections }
    }

    /// Stop the active run. Returns false when already idle.
    pub fn stop(&mut self, ctx: &mut SessionCtx<'_>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.finish(ctx);
        tracing::info!("processing stopped");
        ctx.log(Severity::System, "Data processing stopped");
        true
    }

    fn finish(&mut self, ctx: &mut SessionCtx<'_>) {
        if let Some(handle) = self.timer.take() {
            ctx.scheduler.cancel(handle);
        }
        ctx.session.run = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;
    use crate::model::Session;
    use crate::scheduler::Scheduler;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use time::OffsetDateTime;

    struct State {
        session: Session,
        scheduler: Scheduler,
        log: EventLog,
    }

    impl State {
        fn ctx(&mut self) -> SessionCtx<'_> {
            SessionCtx {
                session: &mut self.session,
                scheduler: &mut self.scheduler,
                log: &mut self.log,
            }
        }
    }

    struct Rig {
        st: State,
        pc: ProcessingController,
        rng: StdRng,
    }

    impl Rig {
        fn new(source: DataSource) -> Self {
            Self {
                st: State {
                    session: Session {
                        data_source: source,
                        ..Default::default()
                    },
                    scheduler: Scheduler::new(OffsetDateTime::UNIX_EPOCH),
                    log: EventLog::new(100),
                },
                pc: ProcessingController::new(Duration::from_millis(100)),
                rng: StdRng::seed_from_u64(7),
            }
        }

        fn start(&mut self) -> Result<(), SessionError> {
            self.pc.start(&mut self.st.ctx())
        }

        fn run_for(&mut self, d: Duration) -> Vec<TickOutcome> {
            let until = self.st.scheduler.elapsed() + d;
            let mut out = Vec::new();
            while let Some(f) = self.st.scheduler.pop_due(until) {
                out.push(self.pc.on_tick(f.handle, &mut self.st.ctx(), &mut self.rng));
            }
            self.st.scheduler.settle_at(until);
            out
        }
    }

    #[test]
    fn start_without_source_is_rejected() {
        let mut rig = Rig::new(DataSource::None);
        assert_eq!(rig.start(), Err(SessionError::NoDataSource));
        assert!(!rig.st.session.processing());
        assert_eq!(rig.st.scheduler.pending_count(), 0);
        assert!(rig.st.log.is_empty());
    }

    #[test]
    fn ten_ticks_complete_a_run() {
        let mut rig = Rig::new(DataSource::File);
        rig.start().unwrap();
        assert!(rig.st.session.processing());
        assert_eq!(
            rig.st.session.last_process_time,
            Some(OffsetDateTime::UNIX_EPOCH)
        );

        let outcomes = rig.run_for(Duration::from_secs(5));
        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes[0], TickOutcome::Progress(10));
        let TickOutcome::Completed { detections } = outcomes[9] else {
            panic!("expected completion, got {:?}", outcomes[9]);
        };
        assert!(DETECTION_RANGE.contains(&detections));
        assert_eq!(rig.st.session.detection_count, detections);
        assert!(!rig.st.session.processing());
        assert!(!rig.pc.is_running());
    }

    #[test]
    fn stop_cancels_further_ticks() {
        let mut rig = Rig::new(DataSource::Adc);
        rig.start().unwrap();
        assert_eq!(rig.run_for(Duration::from_millis(350)).len(), 3);

        assert!(rig.pc.stop(&mut rig.st.ctx()));
        assert!(!rig.pc.stop(&mut rig.st.ctx()));

        let before = rig.pc.ticks_observed();
        assert!(rig.run_for(Duration::from_secs(10)).is_empty());
        assert_eq!(rig.pc.ticks_observed(), before);
        assert_eq!(rig.st.session.detection_count, 0);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let mut rig = Rig::new(DataSource::Live);
        rig.start().unwrap();
        rig.run_for(Duration::from_millis(200));
        rig.start().unwrap();
        assert_eq!(rig.st.session.run.map(|r| r.progress_percent), Some(20));
        assert_eq!(rig.st.scheduler.pending_count(), 1);
    }
}
