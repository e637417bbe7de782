//! Terminal front-end: keyboard in, board out, one [`App::tick`] per frame.
//!
//! The loop never waits on the voice worker. Each frame drains pending key
//! events with a zero-timeout poll, takes whatever utterances are queued,
//! ticks the state machine, draws, then sleeps until the next tick boundary.

use crate::app::{App, ExitReason, Flow, InputEvent, RoundResult, Screen};
use crate::game::{Direction as Heading, Point, SnakeGame};
use crate::queue::CommandConsumer;
use crate::terminal_restore::TerminalRestoreGuard;
use crate::voice::{VoiceStatsSnapshot, VoiceWorker, WorkerPhase};
use crate::log_debug;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const BORDER_COLOR: Color = Color::Rgb(90, 200, 120);
const TITLE_COLOR: Color = Color::Rgb(140, 240, 160);
const SNAKE_COLOR: Color = Color::Rgb(70, 180, 90);
const HEAD_COLOR: Color = Color::Rgb(170, 255, 170);
const FOOD_COLOR: Color = Color::Rgb(255, 90, 90);
const STATUS_COLOR: Color = Color::Rgb(160, 160, 150);
const HINT_COLOR: Color = Color::Rgb(255, 220, 100);

/// Each grid cell is drawn two columns wide so it looks square.
const CELL_COLUMNS: u16 = 2;

/// Frame pacing for the two screens.
#[derive(Copy, Clone, Debug)]
pub struct Pacing {
    pub playing: Duration,
    pub menu: Duration,
}

/// What the status line says about voice control.
pub enum VoiceLine {
    /// `--no-voice`.
    Disabled,
    /// No microphone or recognizer could be set up.
    Unavailable,
    Live {
        stats: VoiceStatsSnapshot,
        level_db: Option<f32>,
    },
}

impl VoiceLine {
    pub fn from_worker(worker: Option<&VoiceWorker>, requested: bool) -> Self {
        match worker {
            Some(worker) => VoiceLine::Live {
                stats: worker.stats(),
                level_db: worker.level_db(),
            },
            None if requested => VoiceLine::Unavailable,
            None => VoiceLine::Disabled,
        }
    }
}

/// Fixed-rate scheduler: each tick is due one interval after the previous
/// one was due, so time spent drawing does not push the schedule back.
#[derive(Debug)]
pub struct TickClock {
    interval: Duration,
    next: Instant,
}

impl TickClock {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Switch rate (menu vs playing); the new rate counts from `now`.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        if interval != self.interval {
            self.interval = interval;
            self.next = now + interval;
        }
    }

    /// How long to sleep before the tick that is due next. Falling more than
    /// a whole interval behind restarts the schedule instead of bursting.
    pub fn wait_time(&mut self, now: Instant) -> Duration {
        let wait = self.next.saturating_duration_since(now);
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
        wait
    }
}

/// Take over the terminal, run until the state machine exits, then restore it.
pub fn run_app(
    app: &mut App,
    commands: &CommandConsumer<String>,
    voice: Option<&VoiceWorker>,
    voice_requested: bool,
    pacing: Pacing,
) -> Result<ExitReason> {
    let mut stdout = io::stdout();
    let terminal_guard = TerminalRestoreGuard::enter(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app_loop(&mut terminal, app, commands, voice, voice_requested, pacing);

    drop(terminal);
    terminal_guard.restore();
    result
}

fn app_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    commands: &CommandConsumer<String>,
    voice: Option<&VoiceWorker>,
    voice_requested: bool,
    pacing: Pacing,
) -> Result<ExitReason> {
    let mut clock = TickClock::new(interval_for(app, pacing), Instant::now());
    loop {
        let inputs = drain_input_events()?;
        let utterances = commands.try_pop_all();
        let flow = app.tick(&inputs, utterances);

        let voice_line = VoiceLine::from_worker(voice, voice_requested);
        terminal.draw(|frame| draw(frame, app, &voice_line))?;

        if let Flow::Exit(reason) = flow {
            log_debug(&format!("game loop exiting: {}", reason.label()));
            return Ok(reason);
        }

        clock.set_interval(interval_for(app, pacing), Instant::now());
        thread::sleep(clock.wait_time(Instant::now()));
    }
}

fn interval_for(app: &App, pacing: Pacing) -> Duration {
    if app.is_playing() {
        pacing.playing
    } else {
        pacing.menu
    }
}

/// Read every key event that is already waiting, without blocking.
fn drain_input_events() -> Result<Vec<InputEvent>> {
    let mut inputs = Vec::new();
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            if let Some(input) = map_key(key) {
                inputs.push(input);
            }
        }
    }
    Ok(inputs)
}

pub fn map_key(key: KeyEvent) -> Option<InputEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return (key.code == KeyCode::Char('c')).then_some(InputEvent::Close);
    }
    match key.code {
        KeyCode::Left => Some(InputEvent::Steer(Heading::Left)),
        KeyCode::Right => Some(InputEvent::Steer(Heading::Right)),
        KeyCode::Up => Some(InputEvent::Steer(Heading::Up)),
        KeyCode::Down => Some(InputEvent::Steer(Heading::Down)),
        KeyCode::Char(' ') | KeyCode::Enter => Some(InputEvent::Start),
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(InputEvent::Close),
        _ => None,
    }
}

pub fn draw(frame: &mut Frame<'_>, app: &App, voice: &VoiceLine) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.size());

    match app.screen() {
        Screen::Menu => draw_menu(frame, chunks[0], app.last_round()),
        Screen::Playing(game) => draw_board(frame, chunks[0], game),
    }

    let status = fit_to_width(&status_text(app, voice), usize::from(chunks[1].width));
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(STATUS_COLOR)),
        chunks[1],
    );
}

fn titled_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_COLOR))
        .title(Span::styled(
            title,
            Style::default().fg(TITLE_COLOR).add_modifier(Modifier::BOLD),
        ))
}

fn draw_menu(frame: &mut Frame<'_>, area: Rect, last_round: Option<RoundResult>) {
    let hint = Style::default().fg(HINT_COLOR).add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "V O X S N A K E",
            Style::default().fg(TITLE_COLOR).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("Say "),
            Span::styled("\"start\"", hint),
            Span::raw(" or press "),
            Span::styled("Space", hint),
            Span::raw(" to play"),
        ]),
        Line::from(vec![
            Span::raw("Steer with "),
            Span::styled("\"left\" \"right\" \"up\" \"down\"", hint),
            Span::raw(" or the arrow keys"),
        ]),
        Line::from(vec![
            Span::raw("Say "),
            Span::styled("\"quit\"", hint),
            Span::raw(" or press "),
            Span::styled("Esc", hint),
            Span::raw(" to leave"),
        ]),
    ];
    if let Some(round) = last_round {
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "Last round: score {} ({})",
            round.score,
            round.collision.label()
        )));
    }

    let menu = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .block(titled_block(" VoxSnake ".to_string()));
    frame.render_widget(menu, area);
}

/// What occupies one board cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellKind {
    Empty,
    Body,
    Head,
    Food,
}

/// Row-major cell map of the board.
pub fn board_cells(game: &SnakeGame) -> Vec<Vec<CellKind>> {
    let grid = game.grid();
    let mut cells = vec![vec![CellKind::Empty; usize::from(grid.width())]; usize::from(grid.height())];
    let mut mark = |point: Point, kind: CellKind| {
        if grid.contains(point) {
            cells[point.y as usize][point.x as usize] = kind;
        }
    };
    mark(game.food(), CellKind::Food);
    for cell in game.body() {
        mark(cell, CellKind::Body);
    }
    mark(game.head(), CellKind::Head);
    cells
}

fn cell_span(kind: CellKind) -> Span<'static> {
    match kind {
        CellKind::Empty => Span::raw("  "),
        CellKind::Body => Span::styled("██", Style::default().fg(SNAKE_COLOR)),
        CellKind::Head => Span::styled("██", Style::default().fg(HEAD_COLOR)),
        CellKind::Food => Span::styled("()", Style::default().fg(FOOD_COLOR)),
    }
}

fn draw_board(frame: &mut Frame<'_>, area: Rect, game: &SnakeGame) {
    let grid = game.grid();
    let needed_width = grid.width() * CELL_COLUMNS + 2;
    let needed_height = grid.height() + 2;
    if area.width < needed_width || area.height < needed_height {
        let message = format!(
            "Terminal too small for a {}x{} board: need {needed_width}x{} characters.",
            grid.width(),
            grid.height(),
            needed_height + 1
        );
        frame.render_widget(
            Paragraph::new(message).style(Style::default().fg(HINT_COLOR)),
            area,
        );
        return;
    }

    let rows: Vec<Line> = board_cells(game)
        .into_iter()
        .map(|row| Line::from(row.into_iter().map(cell_span).collect::<Vec<_>>()))
        .collect();
    let board_area = Rect {
        x: area.x + (area.width - needed_width) / 2,
        y: area.y + (area.height - needed_height) / 2,
        width: needed_width,
        height: needed_height,
    };
    let board = Paragraph::new(Text::from(rows))
        .block(titled_block(format!(" Score: {} ", game.score())));
    frame.render_widget(board, board_area);
}

pub fn status_text(app: &App, voice: &VoiceLine) -> String {
    let mut parts = Vec::new();
    if let Some(game) = app.game() {
        parts.push(format!("Score: {}", game.score()));
        parts.push(format!("heading: {}", game.direction().label()));
    }
    parts.push(match voice {
        VoiceLine::Disabled => "voice: off".to_string(),
        VoiceLine::Unavailable => "voice: unavailable".to_string(),
        VoiceLine::Live { stats, level_db } => {
            let mut text = format!("voice: {} (heard {}", stats.phase.label(), stats.heard);
            if stats.service_errors + stats.device_errors > 0 {
                text.push_str(&format!(
                    ", errors {}",
                    stats.service_errors + stats.device_errors
                ));
            }
            text.push(')');
            if let (WorkerPhase::Listening, Some(level)) = (stats.phase, level_db) {
                text.push_str(&format!(" mic {level:.0} dB"));
            }
            if let Some(last) = &stats.last_heard {
                text.push_str(&format!(" \"{last}\""));
            }
            text
        }
    });
    if let Some(command) = app.last_command() {
        parts.push(format!("last command: {}", command.label()));
    }
    parts.push("Esc quits".to_string());
    parts.join(" | ")
}

/// Cut `text` to at most `width` terminal columns, marking the cut with an ellipsis.
pub fn fit_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > budget {
            break;
        }
        used += ch_width;
        out.push(ch);
    }
    if width > 0 {
        out.push('…');
    }
    out
}
