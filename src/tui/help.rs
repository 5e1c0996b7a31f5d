use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(keys: &[&str], action: &str) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    let mut width = 0;
    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" / "));
            width += 3;
        }
        spans.push(Span::styled(
            k.to_string(),
            Style::default().fg(Color::Magenta),
        ));
        width += k.chars().count();
    }
    let pad = 14usize.saturating_sub(width).max(1);
    spans.push(Span::raw(format!("{}{action}", " ".repeat(pad))));
    Line::from(spans)
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let lines = vec![
        Line::from("Data source:"),
        key_line(&["f"], "Load a file (type the name, Enter)"),
        key_line(&["a"], "Connect to ADC"),
        key_line(&["l"], "Enable live mode"),
        Line::from(""),
        Line::from("Processing:"),
        key_line(&["s"], "Start processing"),
        key_line(&["x"], "Stop processing"),
        key_line(&["m"], "Cycle detection algorithm"),
        key_line(&["Enter"], "Apply selected algorithm"),
        Line::from(""),
        Line::from("Parameters (dashboard):"),
        key_line(&["↑/↓", "j/k"], "Focus parameter"),
        key_line(&["←/→", "-/+"], "Adjust focused parameter"),
        key_line(&["p"], "Apply parameters"),
        key_line(&["d"], "Reset to defaults"),
        Line::from(""),
        Line::from("Chart:"),
        key_line(&["1", "2", "3"], "Toggle raw / processed / detections"),
        key_line(&["z", "Z"], "Zoom in / out"),
        key_line(&["0"], "Reset view"),
        Line::from(""),
        Line::from("Log and results:"),
        key_line(&["c"], "Clear event log"),
        key_line(&["y"], "Copy event log to clipboard"),
        key_line(&["e"], "Export detection_results.csv"),
        Line::from(""),
        key_line(&["tab"], "Switch tabs"),
        key_line(&["?"], "Show this help"),
        key_line(&["q", "Ctrl-C"], "Quit"),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_column_is_aligned() {
        let a: String = key_line(&["s"], "Start")
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        let b: String = key_line(&["q", "Ctrl-C"], "Quit")
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(a.find("Start"), b.find("Quit"));
    }
}
