mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::model::{ChartLayer, Command, FileDescriptor, ParameterField, Severity};
use crate::orchestrator::{self, SessionView, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline, Tabs},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use export::copy_to_clipboard;
use help::draw_help;
use state::{next_algorithm, push_wrapped_status_kv, UiState, TABS};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = crate::cli::build_config(&args);
    let (view_tx, view_rx) = mpsc::unbounded_channel::<Box<SessionView>>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(view_rx, cmd_tx));

    let res = orchestrator::run_controller(cfg, view_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    mut view_rx: UnboundedReceiver<Box<SessionView>>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Only the newest view matters; older ones are dropped unseen.
        let mut disconnected = false;
        loop {
            match view_rx.try_recv() {
                Ok(view) => state.apply_view(*view),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(10)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(k)) = event::read() else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }

        if state.file_prompt.is_some() {
            handle_prompt_key(&mut state, &cmd_tx, k.code);
            continue;
        }

        let send = |cmd: Command| {
            let _ = cmd_tx.send(UiCommand::Session(cmd));
        };

        match (k.modifiers, k.code) {
            (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                let _ = cmd_tx.send(UiCommand::Quit);
                break Ok(());
            }
            (_, KeyCode::Char('f')) => {
                state.file_prompt = Some(String::new());
                state.info = "File name (Enter to load, Esc to cancel)".into();
            }
            (_, KeyCode::Char('a')) => send(Command::ConnectAdc),
            (_, KeyCode::Char('l')) => send(Command::EnableLiveMode),
            (_, KeyCode::Char('m')) => send(Command::SelectAlgorithm {
                algorithm: next_algorithm(state.selected_algorithm()),
            }),
            (_, KeyCode::Enter) => send(Command::ApplyAlgorithm),
            (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                if state.tab == 1 {
                    state.log_scroll = state.log_scroll.saturating_sub(1);
                } else {
                    let n = ParameterField::ALL.len();
                    state.selected_field = (state.selected_field + n - 1) % n;
                }
            }
            (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                if state.tab == 1 {
                    let max = state.view.as_ref().map_or(0, |v| v.log.len().saturating_sub(1));
                    state.log_scroll = (state.log_scroll + 1).min(max);
                } else {
                    state.selected_field = (state.selected_field + 1) % ParameterField::ALL.len();
                }
            }
            (_, KeyCode::Left) | (_, KeyCode::Char('-')) => send(Command::SetParameterDraft {
                field: state.field(),
                value: state.stepped_draft(-1),
            }),
            (_, KeyCode::Right) | (_, KeyCode::Char('+')) | (_, KeyCode::Char('=')) => {
                send(Command::SetParameterDraft {
                    field: state.field(),
                    value: state.stepped_draft(1),
                })
            }
            (_, KeyCode::Char('p')) => send(Command::ApplyParameters),
            (_, KeyCode::Char('d')) => send(Command::ResetParameters),
            (_, KeyCode::Char('s')) => send(Command::StartProcessing),
            (_, KeyCode::Char('x')) => send(Command::StopProcessing),
            (_, KeyCode::Char('c')) => send(Command::ClearLog),
            (_, KeyCode::Char('e')) => {
                send(Command::Export);
                state.info = "Preparing detection_results.csv…".into();
            }
            (_, KeyCode::Char(c @ ('1' | '2' | '3'))) => {
                if let Some(view) = state.view.as_ref() {
                    let chart = view.snapshot.view;
                    let (layer, visible) = match c {
                        '1' => (ChartLayer::RawSignal, !chart.show_raw),
                        '2' => (ChartLayer::Processed, !chart.show_processed),
                        _ => (ChartLayer::Detections, !chart.show_detections),
                    };
                    send(Command::SetLayerVisible { layer, visible });
                }
            }
            (_, KeyCode::Char('z')) => send(Command::ZoomIn),
            (_, KeyCode::Char('Z')) => send(Command::ZoomOut),
            (_, KeyCode::Char('0')) => send(Command::ResetView),
            (_, KeyCode::Char('y')) => {
                let text = state.log_text();
                state.info = match copy_to_clipboard(&text) {
                    Ok(()) => "✓ Copied event log to clipboard".into(),
                    Err(e) => format!("Clipboard copy failed: {e:#}"),
                };
            }
            (_, KeyCode::Tab) => {
                state.tab = (state.tab + 1) % TABS.len();
                if state.tab == 1 {
                    state.log_scroll = 0;
                }
            }
            (_, KeyCode::Char('?')) => {
                state.tab = 2;
            }
            _ => {}
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn handle_prompt_key(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, code: KeyCode) {
    let Some(buf) = state.file_prompt.as_mut() else {
        return;
    };
    match code {
        KeyCode::Enter => {
            let name = buf.trim().to_string();
            state.file_prompt = None;
            state.info.clear();
            // An empty name still goes through so the rejection is logged.
            let _ = cmd_tx.send(UiCommand::Session(Command::LoadFile {
                file: describe_file(&name),
            }));
        }
        KeyCode::Esc => {
            state.file_prompt = None;
            state.info = "File selection cancelled".into();
        }
        KeyCode::Backspace => {
            buf.pop();
        }
        KeyCode::Char(c) => buf.push(c),
        _ => {}
    }
}

/// Describe a file from disk when it exists, otherwise by name only.
fn describe_file(name: &str) -> FileDescriptor {
    let mut desc = FileDescriptor::named(name);
    if let Ok(meta) = std::fs::metadata(name) {
        desc.size_bytes = meta.len();
        desc.modified = meta.modified().ok().map(time::OffsetDateTime::from);
    }
    desc
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let tabs = Tabs::new(TABS.to_vec())
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("sawtooth-detector"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_dashboard(chunks[1], f, state),
        1 => draw_log(chunks[1], f, state, true),
        _ => draw_help(chunks[1], f),
    }

    let footer = match state.file_prompt.as_deref() {
        Some(buf) => Line::from(vec![
            Span::styled("File: ", Style::default().fg(Color::Gray)),
            Span::raw(buf.to_string()),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
        ]),
        None if !state.info.is_empty() => Line::from(state.info.clone()),
        None => Line::from(Span::styled(
            "q quit · f file · a ADC · l live · s start · x stop · ? help",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(
        Paragraph::new(footer).block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let Some(view) = state.view.as_ref() else {
        f.render_widget(
            Paragraph::new("Waiting for session…")
                .block(Block::default().borders(Borders::ALL).title("Status")),
            area,
        );
        return;
    };

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(0),
        ])
        .split(cols[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(0),
        ])
        .split(cols[1]);

    draw_status(left[0], f, view);
    draw_parameters(left[1], f, state, view);
    draw_chart_view(left[2], f, view);

    let snap = &view.snapshot;
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Processing"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::from(snap.progress_percent.unwrap_or(0)))
        .label(match snap.progress_percent {
            Some(p) => format!("{p}%"),
            None => "idle".into(),
        });
    f.render_widget(gauge, right[0]);

    let spark = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(snap.detection_count.clone()),
        )
        .style(Style::default().fg(Color::Green))
        .data(&state.detection_series);
    f.render_widget(spark, right[1]);

    draw_log(right[2], f, state, false);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, view: &SessionView) {
    let snap = &view.snapshot;
    let mut lines = Vec::new();
    let connection = if snap.connected {
        "connected"
    } else if view.adc_pending {
        "connecting…"
    } else {
        "disconnected"
    };
    push_wrapped_status_kv(&mut lines, "Data source", &snap.data_source, area.width);
    push_wrapped_status_kv(&mut lines, "Connection", connection, area.width);
    if let Some(file) = snap.loaded_file.as_deref() {
        push_wrapped_status_kv(&mut lines, "File", file, area.width);
    }
    push_wrapped_status_kv(&mut lines, "Algorithm", &snap.algorithm, area.width);
    if view.selected_algorithm.display_name() != snap.algorithm {
        push_wrapped_status_kv(
            &mut lines,
            "Selected",
            &format!("{} (Enter to apply)", view.selected_algorithm.display_name()),
            area.width,
        );
    }
    push_wrapped_status_kv(&mut lines, "Last processed", &snap.last_process_time, area.width);
    if let Some(n) = view.live_events {
        push_wrapped_status_kv(&mut lines, "Live events", &n.to_string(), area.width);
    }
    let controls = match (snap.start_enabled, snap.stop_enabled) {
        (true, _) => "start available",
        (_, true) => "running",
        _ => "no data source",
    };
    push_wrapped_status_kv(&mut lines, "Controls", controls, area.width);

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}

fn draw_parameters(area: Rect, f: &mut ratatui::Frame, state: &UiState, view: &SessionView) {
    let snap = &view.snapshot;
    let mut lines = Vec::new();
    for (i, (field, applied)) in snap.parameter_values().into_iter().enumerate() {
        let draft = view.draft.label(field);
        let focused = i == state.selected_field % ParameterField::ALL.len();
        let marker = if focused { "▶ " } else { "  " };
        let title_style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![
            Span::raw(marker),
            Span::styled(format!("{:<20}", field.title()), title_style),
            Span::raw(applied.to_string()),
        ];
        if draft != applied {
            spans.push(Span::styled(
                format!("  → {draft}"),
                Style::default().fg(Color::Magenta),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        "←/→ adjust · p apply · d defaults",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Parameters")),
        area,
    );
}

fn draw_chart_view(area: Rect, f: &mut ratatui::Frame, view: &SessionView) {
    let chart = view.snapshot.view;
    let flag = |on: bool| if on { "on" } else { "off" };
    let lines = vec![
        Line::from(format!("1 Raw signal   {}", flag(chart.show_raw))),
        Line::from(format!("2 Processed    {}", flag(chart.show_processed))),
        Line::from(format!("3 Detections   {}", flag(chart.show_detections))),
        Line::from(format!("Zoom           {:+}", chart.zoom)),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Chart")),
        area,
    );
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::System => Style::default().fg(Color::Gray),
        Severity::Success => Style::default().fg(Color::Green),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Error => Style::default().fg(Color::Red),
    }
}

fn draw_log(area: Rect, f: &mut ratatui::Frame, state: &UiState, scrollable: bool) {
    let entries = state.view.as_ref().map(|v| v.log.as_slice()).unwrap_or(&[]);
    let lines: Vec<Line> = entries
        .iter()
        .map(|e| {
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", crate::status::format_clock(e.timestamp)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{} {}", e.severity.icon(), e.message),
                    severity_style(e.severity),
                ),
            ])
        })
        .collect();

    let title = if scrollable {
        format!("Event log ({}) · ↑/↓ scroll · c clear · y copy", entries.len())
    } else {
        "Event log".to_string()
    };
    let scroll = if scrollable { state.log_scroll } else { 0 };
    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
    f.render_widget(p, area);
}
