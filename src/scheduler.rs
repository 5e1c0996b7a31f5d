//! Virtual-time timer queue.
//!
//! Every delayed or recurring behavior in a session is a timer registered
//! here. Time only moves when the owner pops due timers, which keeps the
//! whole session deterministic under test and lets the runtime driver map
//! wall-clock time onto it.

use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ProcessingTick,
    AdcConnect,
    LiveSample,
    LogSweep,
    ExportReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: TimerKind,
    period: Option<Duration>,
}

pub struct Scheduler {
    epoch: OffsetDateTime,
    elapsed: Duration,
    next_id: u64,
    // Keyed by (due, id) so equal deadlines fire in scheduling order.
    queue: BTreeMap<(Duration, u64), Pending>,
}

impl Scheduler {
    pub fn new(epoch: OffsetDateTime) -> Self {
        Self {
            epoch,
            elapsed: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.epoch + self.elapsed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn schedule_once(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        self.insert(delay, kind, None)
    }

    /// Schedule a recurring timer. A zero period is bumped to 1 ms so the
    /// queue always makes progress.
    pub fn schedule_interval(&mut self, period: Duration, kind: TimerKind) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        self.insert(period, kind, Some(period))
    }

    fn insert(&mut self, delay: Duration, kind: TimerKind, period: Option<Duration>) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue
            .insert((self.elapsed + delay, id), Pending { kind, period });
        TimerHandle(id)
    }

    /// Remove a timer. Returns false if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let key = self.queue.keys().find(|(_, id)| *id == handle.0).copied();
        match key {
            Some(k) => self.queue.remove(&k).is_some(),
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.keys().any(|(_, id)| *id == handle.0)
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Pop the earliest timer due at or before `until`, moving virtual time
    /// to its deadline. Interval timers are re-armed before they are returned
    /// so the callback may cancel them.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired> {
        let (&(due, id), _) = self.queue.first_key_value()?;
        if due > until {
            return None;
        }
        let pending = self.queue.remove(&(due, id))?;
        self.elapsed = self.elapsed.max(due);
        if let Some(period) = pending.period {
            self.queue.insert((due + period, id), pending);
        }
        Some(Fired {
            handle: TimerHandle(id),
            kind: pending.kind,
        })
    }

    /// Move virtual time forward without firing anything. Callers drain
    /// `pop_due` first; time never moves backwards.
    pub fn settle_at(&mut self, until: Duration) {
        self.elapsed = self.elapsed.max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler {
        Scheduler::new(OffsetDateTime::UNIX_EPOCH)
    }

    fn drain(s: &mut Scheduler, until: Duration) -> Vec<TimerKind> {
        let mut out = Vec::new();
        while let Some(f) = s.pop_due(until) {
            out.push(f.kind);
        }
        s.settle_at(until);
        out
    }

    #[test]
    fn once_fires_a_single_time() {
        let mut s = scheduler();
        let h = s.schedule_once(Duration::from_secs(1), TimerKind::AdcConnect);
        assert!(drain(&mut s, Duration::from_millis(999)).is_empty());
        assert_eq!(drain(&mut s, Duration::from_secs(5)), vec![TimerKind::AdcConnect]);
        assert!(!s.is_pending(h));
        assert_eq!(s.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn interval_rearms_until_cancelled() {
        let mut s = scheduler();
        let h = s.schedule_interval(Duration::from_millis(100), TimerKind::ProcessingTick);
        assert_eq!(drain(&mut s, Duration::from_millis(350)).len(), 3);
        assert!(s.cancel(h));
        assert!(drain(&mut s, Duration::from_secs(10)).is_empty());
        assert!(!s.cancel(h));
    }

    #[test]
    fn equal_deadlines_fire_in_scheduling_order() {
        let mut s = scheduler();
        s.schedule_once(Duration::from_secs(1), TimerKind::ExportReady);
        s.schedule_once(Duration::from_secs(1), TimerKind::AdcConnect);
        assert_eq!(
            drain(&mut s, Duration::from_secs(1)),
            vec![TimerKind::ExportReady, TimerKind::AdcConnect]
        );
    }

    #[test]
    fn cancel_from_inside_a_callback_stops_later_fires() {
        let mut s = scheduler();
        let tick = s.schedule_interval(Duration::from_millis(100), TimerKind::ProcessingTick);
        let mut seen = 0;
        while let Some(f) = s.pop_due(Duration::from_secs(1)) {
            seen += 1;
            if seen == 2 {
                s.cancel(f.handle);
            }
        }
        assert_eq!(seen, 2);
        assert!(!s.is_pending(tick));
    }

    #[test]
    fn now_tracks_virtual_time() {
        let mut s = scheduler();
        s.settle_at(Duration::from_secs(90));
        assert_eq!(s.now(), OffsetDateTime::UNIX_EPOCH + Duration::from_secs(90));
    }
}
