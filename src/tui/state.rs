use crate::model::{Algorithm, ParameterField, Parameters};
use crate::orchestrator::SessionView;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

/// Tabs in display order.
pub const TABS: [&str; 3] = ["Dashboard", "Event log", "Help"];

#[derive(Default)]
pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub view: Option<SessionView>,

    // Detection count sampled on every view update, for the sparkline.
    pub detection_series: Vec<u64>,

    pub selected_field: usize,
    pub log_scroll: usize,
    // Some(buffer) while the operator types a file name.
    pub file_prompt: Option<String>,
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

impl UiState {
    pub fn push_series(series: &mut Vec<u64>, v: u64) {
        const MAX: usize = 120;
        series.push(v);
        if series.len() > MAX {
            let _ = series.drain(0..(series.len() - MAX));
        }
    }

    pub fn apply_view(&mut self, view: SessionView) {
        Self::push_series(&mut self.detection_series, u64::from(view.detections));
        let max_scroll = view.log.len().saturating_sub(1);
        self.log_scroll = self.log_scroll.min(max_scroll);
        self.view = Some(view);
    }

    pub fn field(&self) -> ParameterField {
        ParameterField::ALL[self.selected_field % ParameterField::ALL.len()]
    }

    pub fn draft(&self) -> Parameters {
        self.view.as_ref().map(|v| v.draft).unwrap_or_default()
    }

    pub fn selected_algorithm(&self) -> Algorithm {
        self.view
            .as_ref()
            .map(|v| v.selected_algorithm)
            .unwrap_or_default()
    }

    /// Value after moving the focused slider by `steps`, rounded to the
    /// slider's resolution.
    pub fn stepped_draft(&self, steps: i32) -> f64 {
        let field = self.field();
        let step = field.step();
        let next = self.draft().get(field) + step * steps as f64;
        (next / step).round() * step
    }

    /// Plain-text rendering of the log, oldest first, for the clipboard.
    pub fn log_text(&self) -> String {
        let Some(view) = self.view.as_ref() else {
            return String::new();
        };
        view.log
            .iter()
            .rev()
            .map(|e| {
                format!(
                    "{} {} {}",
                    crate::status::format_clock(e.timestamp),
                    e.severity.icon(),
                    e.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn next_algorithm(current: Algorithm) -> Algorithm {
    let idx = Algorithm::ALL
        .iter()
        .position(|a| *a == current)
        .unwrap_or(0);
    Algorithm::ALL[(idx + 1) % Algorithm::ALL.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_is_bounded() {
        let mut s = Vec::new();
        for i in 0..500 {
            UiState::push_series(&mut s, i);
        }
        assert_eq!(s.len(), 120);
        assert_eq!(s.first(), Some(&380));
    }

    #[test]
    fn slider_steps_round_to_resolution() {
        let mut state = UiState::default();
        state.selected_field = 1;
        assert_eq!(state.field(), ParameterField::ThresholdSigma);
        assert!((state.stepped_draft(5) - 4.0).abs() < 1e-9);
        assert!((state.stepped_draft(-1) - 3.4).abs() < 1e-9);
    }

    #[test]
    fn algorithms_cycle() {
        assert_eq!(next_algorithm(Algorithm::Hybrid), Algorithm::Gaussian);
        assert_eq!(next_algorithm(Algorithm::LstmModel), Algorithm::Hybrid);
    }
}
