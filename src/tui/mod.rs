//! Ratatui terminal frontend
//!
//! Lanes scroll downward toward a judgment line near the bottom of the
//! screen. A beat's row is proportional to how far ahead of the song time
//! it is, with the preview length spanning the lane height above the line.

mod input;

pub use input::{map_key, TerminalInput};

use crate::game::{Frame, Phase, Renderer};
use crate::judge::{Judgement, SessionSummary};
use crate::layer::Layer;
use crate::{format_song_time, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame as TuiFrame, Terminal,
};
use std::io::{self, stdout, Stdout};

/// Minimum terminal size for the frontend
pub const MIN_COLS: u16 = 40;
/// Minimum terminal rows for the frontend
pub const MIN_ROWS: u16 = 16;

/// Rows kept below the judgment line for late beats and shadows
const BELOW_LINE_ROWS: u16 = 2;

/// Check if the terminal is large enough
pub fn terminal_supports_tui() -> bool {
    if let Ok((cols, rows)) = crossterm::terminal::size() {
        cols >= MIN_COLS && rows >= MIN_ROWS
    } else {
        false
    }
}

/// Restore terminal to normal state. Safe to call more than once.
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Raw mode + alternate screen, undone on drop
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen)?;

        // Restore the terminal before the panic message is printed
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            restore_terminal();
            original_hook(panic_info);
        }));
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Draws the session on a ratatui terminal
pub struct TuiRenderer<B: Backend> {
    terminal: Terminal<B>,
    title: String,
    _guard: Option<TerminalGuard>,
}

impl TuiRenderer<CrosstermBackend<Stdout>> {
    /// Take over the process terminal until the renderer is dropped
    pub fn enter(title: impl Into<String>) -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        Ok(TuiRenderer {
            terminal,
            title: title.into(),
            _guard: Some(guard),
        })
    }
}

impl<B: Backend> TuiRenderer<B> {
    /// Renderer over any backend, leaving terminal modes alone
    pub fn with_backend(backend: B, title: impl Into<String>) -> Result<Self> {
        Ok(TuiRenderer {
            terminal: Terminal::new(backend)?,
            title: title.into(),
            _guard: None,
        })
    }

    /// Underlying terminal
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend> Renderer for TuiRenderer<B> {
    fn draw(&mut self, frame: &Frame<'_>) -> Result<()> {
        let title = &self.title;
        self.terminal.draw(|f| match (frame.phase, frame.summary) {
            (Phase::Results, Some(summary)) => draw_results(f, title, summary),
            _ => draw_playing(f, title, frame),
        })?;
        Ok(())
    }
}

fn lane_color(layer: &Layer) -> Color {
    let (r, g, b) = layer.color();
    Color::Rgb(r, g, b)
}

/// Row of a beat `offset` seconds ahead of the line, if it is on screen
fn beat_row(offset: f64, line_row: u16, height: u16, preview_length: f64) -> Option<u16> {
    if line_row == 0 || preview_length <= 0.0 {
        return None;
    }
    let rows_per_second = f64::from(line_row) / preview_length;
    let row = (f64::from(line_row) - offset * rows_per_second).round();
    (row >= 0.0 && row < f64::from(height)).then_some(row as u16)
}

fn draw_playing(f: &mut TuiFrame, title: &str, frame: &Frame<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Lanes
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, chunks[0], title, frame);
    draw_lanes(f, chunks[1], frame);
    draw_footer(f, chunks[2], frame);
}

fn draw_header(f: &mut TuiFrame, area: Rect, title: &str, frame: &Frame<'_>) {
    let judge = frame.judge;
    let status = if frame.paused { "PAUSED" } else { "" };
    let time = match frame.duration {
        Some(duration) => format!(
            "{} / {}",
            format_song_time(frame.song_time),
            format_song_time(duration)
        ),
        None => format_song_time(frame.song_time),
    };
    let label = format!(
        "{time}  score {}  combo {} (x{:.1})  {:.1}%  {status}",
        judge.score(),
        judge.combo(),
        judge.multiplier(),
        judge.accuracy()
    );

    let ratio = frame
        .duration
        .map_or(0.0, |d| (frame.song_time / d).clamp(0.0, 1.0));
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {title} ")),
        )
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_lanes(f: &mut TuiFrame, area: Rect, frame: &Frame<'_>) {
    let lanes: Vec<&Layer> = frame.judge.layers().iter().collect();
    if lanes.is_empty() {
        return;
    }
    let constraints = vec![Constraint::Ratio(1, lanes.len() as u32); lanes.len()];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let preview = frame.judge.settings().preview_length;
    for (layer, column) in lanes.into_iter().zip(columns.iter()) {
        let color = lane_color(layer);
        let key = layer.key().map_or_else(|| "-".to_string(), |k| k.to_string());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {} [{}] {} ", layer.id(), key, layer.remaining()));
        let inner = block.inner(*column);
        f.render_widget(block, *column);
        if inner.height <= BELOW_LINE_ROWS || inner.width == 0 {
            continue;
        }

        let height = inner.height;
        let line_row = height - BELOW_LINE_ROWS - 1;
        let width = usize::from(inner.width);
        let mut rows: Vec<Line> = (0..height)
            .map(|row| {
                if row == line_row {
                    Line::from(Span::styled("─".repeat(width), Style::default().fg(Color::White)))
                } else {
                    Line::from(" ".repeat(width))
                }
            })
            .collect();

        for shadow in frame.judge.shadows(layer.id()) {
            let offset = shadow.time - frame.song_time;
            if let Some(row) = beat_row(offset, line_row, height, preview) {
                rows[usize::from(row)] =
                    Line::from(Span::styled("░".repeat(width), Style::default().fg(Color::DarkGray)));
            }
        }

        for beat in frame.judge.visible_beats(layer.id(), frame.song_time) {
            if let Some(row) = beat_row(beat.offset, line_row, height, preview) {
                let style = if beat.hittable {
                    Style::default().fg(color).bold()
                } else {
                    Style::default().fg(color)
                };
                rows[usize::from(row)] = Line::from(Span::styled("█".repeat(width), style));
            }
        }

        f.render_widget(Paragraph::new(rows), inner);
    }
}

fn draw_footer(f: &mut TuiFrame, area: Rect, frame: &Frame<'_>) {
    let feedback = match frame.judge.feedback() {
        Some(feedback) => {
            let (r, g, b) = feedback.judgement.color();
            Span::styled(
                format!("{:<9}", feedback.judgement.label()),
                Style::default().fg(Color::Rgb(r, g, b)).bold(),
            )
        }
        None => Span::raw(" ".repeat(9)),
    };
    let line = Line::from(vec![
        Span::raw(" "),
        feedback,
        Span::styled(
            format!(
                "  Esc pause  Ctrl+C quit  drift {:+.4}s",
                frame.average_drift
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let footer = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn draw_results(f: &mut TuiFrame, title: &str, summary: &SessionSummary) {
    let counts = summary.counts;
    let tier = |label: &str, count: u32, (r, g, b): (u8, u8, u8)| {
        Line::from(Span::styled(
            format!("{label}: {count}"),
            Style::default().fg(Color::Rgb(r, g, b)),
        ))
    };
    let lines = vec![
        Line::from(""),
        tier("perfect", counts.perfect, Judgement::Perfect.color()),
        tier("great", counts.great, Judgement::Great.color()),
        tier("ok", counts.ok, Judgement::Ok.color()),
        tier("missed", counts.missed, Judgement::Miss.color()),
        Line::from(""),
        Line::from(format!("accuracy: {:.1}%", summary.accuracy)),
        Line::from(format!("max combo: {}", summary.max_combo)),
        Line::from(""),
        Line::from(Span::styled(
            format!("final score: {}", summary.score),
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "press any key",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title}: results "));
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block),
        f.area(),
    );
}
