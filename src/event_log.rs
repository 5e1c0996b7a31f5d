//! Operator-visible event log.
//!
//! Entries are kept newest-first. Two eviction paths compose: a capacity
//! trim after every append and an age sweep driven by the session's
//! periodic timer.

use crate::model::{LogEntry, Severity};
use std::collections::VecDeque;
use std::time::Duration;
use time::OffsetDateTime;

pub const CLEARED_MESSAGE: &str = "Log cleared";

pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            next_seq: 0,
        }
    }

    pub fn append(&mut self, now: OffsetDateTime, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::error!(target: "event_log", "{message}"),
            Severity::Warning => tracing::warn!(target: "event_log", "{message}"),
            Severity::System | Severity::Success => {
                tracing::info!(target: "event_log", ?severity, "{message}")
            }
        }
        let entry = LogEntry {
            seq: self.next_seq,
            timestamp: now,
            severity,
            message,
        };
        self.next_seq += 1;
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Reset to a single synthetic entry; an empty log is never shown.
    pub fn clear(&mut self, now: OffsetDateTime) {
        self.entries.clear();
        self.append(now, Severity::System, CLEARED_MESSAGE);
    }

    /// Drop entries strictly older than `max_age`. Returns how many were removed.
    pub fn evict_older_than(&mut self, now: OffsetDateTime, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            let age = now - e.timestamp;
            age <= max_age
        });
        before - self.entries.len()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn newest_entry_is_first() {
        let mut log = EventLog::new(100);
        log.append(t0(), Severity::System, "first");
        log.append(t0(), Severity::Success, "second");
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert!(log.iter().next().map(|e| e.seq) > log.iter().nth(1).map(|e| e.seq));
    }

    #[test]
    fn capacity_drops_the_oldest() {
        let mut log = EventLog::new(100);
        for i in 0..250 {
            log.append(t0(), Severity::System, format!("msg {i}"));
            assert!(log.len() <= 100);
        }
        assert_eq!(log.len(), 100);
        assert_eq!(log.latest().map(|e| e.message.as_str()), Some("msg 249"));
        assert_eq!(log.iter().last().map(|e| e.message.as_str()), Some("msg 150"));
    }

    #[test]
    fn clear_leaves_one_marker_entry() {
        let mut log = EventLog::new(100);
        log.append(t0(), Severity::Error, "boom");
        log.append(t0(), Severity::Warning, "hmm");
        log.clear(t0());
        assert_eq!(log.len(), 1);
        let e = log.latest().expect("marker entry");
        assert_eq!(e.message, CLEARED_MESSAGE);
        assert_eq!(e.severity, Severity::System);
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let mut log = EventLog::new(100);
        let max_age = Duration::from_secs(30 * 60);
        log.append(t0(), Severity::System, "old");
        log.append(t0() + Duration::from_secs(10 * 60), Severity::System, "edge");
        log.append(t0() + Duration::from_secs(20 * 60), Severity::System, "young");

        let now = t0() + Duration::from_secs(40 * 60);
        assert_eq!(log.evict_older_than(now, max_age), 1);
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["young", "edge"]);
    }

    #[test]
    fn sweep_on_empty_log_is_harmless() {
        let mut log = EventLog::new(10);
        assert_eq!(log.evict_older_than(t0(), Duration::ZERO), 0);
        assert!(log.is_empty());
    }
}
