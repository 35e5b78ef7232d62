pub mod charting;
pub mod screen;

use chrono::Local;
use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget, Wrap},
};
use time_humanize::HumanTime;
use unicode_width::UnicodeWidthStr;

use crate::app::View;
use crate::metrics::CharState;
use crate::session::{Session, Status};
use crate::sync::SyncStatus;
use crate::util::signed;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn legend(keys: &[&str]) -> Paragraph<'static> {
    Paragraph::new(Span::styled(
        keys.iter().join(" / "),
        Style::default().add_modifier(Modifier::ITALIC),
    ))
}

impl Widget for &View<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(self.state).render(self, area, buf);
    }
}

/// Short sync indicator: pending count or all synced
pub fn sync_label(sync: &SyncStatus) -> String {
    let online = match sync.online {
        Some(false) => " (offline)",
        _ => "",
    };
    if sync.pending == 0 {
        format!("all results synced{online}")
    } else {
        format!("{} pending sync{online}", sync.pending)
    }
}

fn prompt_spans(session: &Session) -> Vec<Span<'static>> {
    let green = bold().fg(Color::Green);
    let red = bold().fg(Color::Red);
    let cursor = dim_bold().add_modifier(Modifier::UNDERLINED);

    let mut typed = session.typed().chars();
    let mut cursor_placed = false;
    session
        .target()
        .chars()
        .zip(session.char_states())
        .map(|(expected, state)| match state {
            CharState::Correct => {
                typed.next();
                Span::styled(expected.to_string(), green)
            }
            CharState::Incorrect => {
                let shown = match typed.next() {
                    Some(' ') | None => '·',
                    Some(c) => c,
                };
                Span::styled(shown.to_string(), red)
            }
            CharState::Pending if !cursor_placed => {
                cursor_placed = true;
                Span::styled(expected.to_string(), cursor)
            }
            CharState::Pending => Span::styled(expected.to_string(), dim_bold()),
        })
        .collect()
}

pub fn render_typing(view: &View<'_>, area: Rect, buf: &mut Buffer) {
    let Some(session) = view.session else {
        return;
    };

    if session.status() == Status::Idle {
        let message = match session.load_error() {
            Some(error) => error.to_string(),
            None if session.is_loading() => "loading sentence...".to_string(),
            None => "no sentence loaded".to_string(),
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(1),
            ])
            .split(area);
        Paragraph::new(Span::styled(
            message,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);
        legend(&["(r)etry", "(tab) difficulty", "(h)istory", "(esc)ape"])
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
        return;
    }

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_width = session.target().width() as u16;
    let prompt_lines = if prompt_width <= max_chars_per_line {
        1
    } else {
        prompt_width.div_ceil(max_chars_per_line) + 1
    };
    let padding = area.height.saturating_sub(prompt_lines + 6) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(padding),
            Constraint::Length(2), // countdown
            Constraint::Length(prompt_lines),
            Constraint::Length(2), // live metrics
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let header = format!(
        "{} | {} | {}",
        view.difficulty,
        session.settings().participant,
        sync_label(&view.sync)
    );
    Paragraph::new(Span::styled(header, Style::default().fg(Color::Gray)))
        .alignment(Alignment::Right)
        .render(chunks[0], buf);

    let countdown = session.countdown();
    let timer_text = match session.status() {
        Status::Loaded | Status::Armed => format!("{}s - start typing", countdown.total_secs()),
        _ => format!("{}", countdown.remaining_secs()),
    };
    Paragraph::new(Span::styled(timer_text, dim_bold()))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(Line::from(prompt_spans(session)))
        .alignment(if prompt_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    if session.status() == Status::Active {
        let snap = session.snapshot();
        Paragraph::new(Span::styled(
            format!("{} wpm   {}% acc", snap.wpm, snap.accuracy),
            Style::default().fg(Color::Cyan),
        ))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
    }

    legend(&["(enter) submit", "(←) new sentence", "(tab) difficulty", "(esc)ape"])
        .render(chunks[6], buf);
}

pub fn render_results(view: &View<'_>, area: Rect, buf: &mut Buffer) {
    let Some(summary) = view.summary else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // vs best
            Constraint::Length(1), // sync state
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let (coords, total_secs, sd) = match view.session {
        Some(session) => (
            session.sampler().coords(),
            session.countdown().total_secs(),
            session.sampler().consistency().map_or(0.0, |(_, sd)| sd),
        ),
        None => (Vec::new(), summary.result.elapsed_seconds, 0.0),
    };
    let (max_t, max_wpm) = charting::chart_bounds(&coords, total_secs);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&coords)];
    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, max_t])
                .labels(vec![
                    Span::styled("1", bold()),
                    Span::styled(charting::format_label(max_t), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, max_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(charting::format_label(max_wpm), bold()),
                ]),
        )
        .render(chunks[0], buf);

    let result = &summary.result;
    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {}s   {sd:.2} sd",
            result.wpm, result.accuracy, result.elapsed_seconds
        ),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let best_line = if summary.previous_best == Default::default() {
        "first result for this difficulty".to_string()
    } else {
        let (wpm, acc) = summary.delta;
        let mut line = format!("{} wpm / {}% vs best", signed(wpm), signed(acc));
        if summary.new_best {
            line.push_str("  new best!");
        }
        line
    };
    Paragraph::new(Span::styled(
        best_line,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let saved = if summary.queued {
        format!("saved locally, {}", sync_label(&view.sync))
    } else {
        "could not save result locally".to_string()
    };
    Paragraph::new(Span::styled(saved, Style::default().fg(Color::Gray)))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    legend(&["(r)etry", "(tab) difficulty", "(h)istory", "(esc)ape"]).render(chunks[5], buf);
}

pub fn render_history(view: &View<'_>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("recent results | {}", sync_label(&view.sync)),
        bold(),
    ))
    .render(chunks[0], buf);

    let now = Local::now();
    let rows = view.history.iter().map(|row| {
        let age = now.signed_duration_since(row.result.created_at).num_seconds();
        let (status, style) = if row.is_synced() {
            ("synced", Style::default().fg(Color::Green))
        } else {
            ("pending", Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM))
        };
        Row::new(vec![
            Cell::from(HumanTime::from_seconds(-age).to_string()),
            Cell::from(row.result.difficulty.to_string()),
            Cell::from(row.result.wpm.to_string()),
            Cell::from(format!("{}%", row.result.accuracy)),
            Cell::from(format!("{}s", row.result.elapsed_seconds)),
            Cell::from(status),
        ])
        .style(style)
    });

    Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["when", "level", "wpm", "acc", "time", "status"])
            .style(bold().add_modifier(Modifier::UNDERLINED)),
    )
    .render(chunks[1], buf);

    legend(&["(b)ack", "(r)etry", "(esc)ape"]).render(chunks[2], buf);
}
