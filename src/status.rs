//! Pure projection from session state to what the panel displays.

use crate::model::{DataSource, DisplaySnapshot, ParameterField, Parameters, Session};
use time::macros::format_description;
use time::OffsetDateTime;

const NEVER: &str = "--";

pub fn project(session: &Session, params: &Parameters) -> DisplaySnapshot {
    let has_source = session.data_source != DataSource::None;
    let processing = session.processing();

    DisplaySnapshot {
        data_source: session.data_source.label().to_string(),
        algorithm: session.applied_algorithm.display_name().to_string(),
        last_process_time: session
            .last_process_time
            .map(format_clock)
            .unwrap_or_else(|| NEVER.to_string()),
        detection_count: format!("Detected: {} events", session.detection_count),
        start_enabled: has_source && !processing,
        stop_enabled: processing,
        progress_percent: session.run.map(|r| r.progress_percent),
        connected: session.connected,
        loaded_file: session.loaded_file.as_ref().map(|f| f.descriptor.summary()),
        kernel_width: params.label(ParameterField::KernelWidthMs),
        threshold: params.label(ParameterField::ThresholdSigma),
        min_duration: params.label(ParameterField::MinDurationMs),
        max_duration: params.label(ParameterField::MaxDurationMs),
        view: session.view,
    }
}

/// 24-hour wall-clock time in the timestamp's own offset.
pub fn format_clock(t: OffsetDateTime) -> String {
    t.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| NEVER.to_string())
}
