//! Text summary builder for CLI output.
//!
//! This module formats the display snapshot and the event log as
//! human-readable lines for text mode.

use crate::event_log::EventLog;
use crate::model::DisplaySnapshot;
use crate::status::format_clock;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary: status block, parameters, then the log oldest-first
/// so it reads top to bottom.
pub(crate) fn build_text_summary(snapshot: &DisplaySnapshot, log: &EventLog) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Data source: {}", snapshot.data_source));
    if let Some(file) = snapshot.loaded_file.as_deref() {
        lines.push(format!("File: {file}"));
    }
    lines.push(format!("Algorithm: {}", snapshot.algorithm));
    lines.push(format!("Last processed: {}", snapshot.last_process_time));
    lines.push(snapshot.detection_count.clone());
    if let Some(p) = snapshot.progress_percent {
        lines.push(format!("Processing: {p}%"));
    }
    for (field, value) in snapshot.parameter_values() {
        lines.push(format!("{}: {value}", field.title()));
    }
    lines.push(String::new());
    if log.is_empty() {
        lines.push("Event log: empty".into());
    } else {
        lines.push(format!("Event log ({} entries):", log.len()));
    }

    let mut entries: Vec<_> = log.iter().collect();
    entries.reverse();
    for e in entries {
        lines.push(format!(
            "[{}] {} {}",
            format_clock(e.timestamp),
            e.severity.icon(),
            e.message
        ));
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Parameters, Session, Severity};
    use time::OffsetDateTime;

    #[test]
    fn log_reads_oldest_first() {
        let mut log = EventLog::new(10);
        log.append(OffsetDateTime::UNIX_EPOCH, Severity::System, "first");
        log.append(OffsetDateTime::UNIX_EPOCH, Severity::Error, "second");
        let snap = crate::status::project(&Session::default(), &Parameters::default());
        let summary = build_text_summary(&snap, &log);

        assert_eq!(summary.lines[0], "Data source: Not connected");
        assert!(summary.lines.iter().any(|l| l == "Threshold: 3.5 σ"));
        let tail: Vec<_> = summary.lines.iter().rev().take(2).collect();
        assert_eq!(tail[0], "[00:00:00] ❌ second");
        assert_eq!(tail[1], "[00:00:00] 🔧 first");
    }
}
