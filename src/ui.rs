use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::session::Session;
use crate::stats::{Rank, SessionStats};
use crate::streak::StreakCounter;
use crate::symbol::{Symbol, SymbolClass};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Typing,
    Results,
}

/// Everything the renderer pulls for one frame. The core never pushes;
/// this view is rebuilt from the session on every draw.
pub struct FrameView<'a> {
    pub session: &'a Session,
    pub stats: SessionStats,
    pub streak: StreakCounter,
    pub screen: Screen,
    pub saved_hint: Option<&'a str>,
    pub auto_next_armed: bool,
}

/// What to print for one symbol. Newlines render as a return marker at
/// the cursor, tabs spill into spaces, and a mistyped whitespace shows a
/// middle dot so the error has a visible body.
pub fn display_glyph(symbol: &Symbol, cursor: usize) -> String {
    let active = cursor == symbol.index;
    match symbol.expected {
        '\n' => {
            if active {
                return "↵".into();
            }
            match symbol.classify() {
                SymbolClass::Pending | SymbolClass::Correct => " ".into(),
                SymbolClass::Wrong => match symbol.typed {
                    Some('\n') | None => " ".into(),
                    Some(c) => c.to_string(),
                },
            }
        }
        '\t' => match symbol.classify() {
            SymbolClass::Pending | SymbolClass::Correct => "    ".into(),
            SymbolClass::Wrong => match symbol.typed {
                Some('\n') | Some('\t') | None => "    ".into(),
                Some(c) => format!("{c}   "),
            },
        },
        expected => match symbol.classify() {
            SymbolClass::Pending | SymbolClass::Correct => expected.to_string(),
            SymbolClass::Wrong => match symbol.typed {
                Some(' ') | Some('\n') | Some('\t') | None => "·".into(),
                Some(c) => c.to_string(),
            },
        },
    }
}

fn style_for(symbol: &Symbol, cursor: usize) -> Style {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut style = match symbol.classify() {
        SymbolClass::Pending => Style::default().add_modifier(Modifier::DIM),
        SymbolClass::Correct => {
            if symbol.fixed {
                // corrected after a backspace; strict accuracy still counts it
                bold.fg(Color::Rgb(255, 165, 0))
            } else {
                bold.fg(Color::Green)
            }
        }
        SymbolClass::Wrong => bold.fg(Color::Red),
    };
    if symbol.index == cursor {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Styled snippet lines, split at newline symbols.
pub fn code_lines(session: &Session) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut spans: Vec<Span> = Vec::new();
    for symbol in &session.symbols {
        spans.push(Span::styled(
            display_glyph(symbol, session.cursor),
            style_for(symbol, session.cursor),
        ));
        if symbol.expected == '\n' {
            lines.push(Line::from(std::mem::take(&mut spans)));
        }
    }
    lines.push(Line::from(spans));
    lines
}

pub fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

pub fn metrics_summary(stats: &SessionStats) -> String {
    format!(
        "{} · {} cpm · {}% acc · {} errs · {}/{}",
        format_time(stats.elapsed_ms),
        stats.cpm,
        stats.accuracy_pct(),
        stats.wrong,
        stats.entered,
        stats.total,
    )
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w,
        height: h,
    }
}

impl Widget for &FrameView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Typing => render_typing(self, area, buf),
            Screen::Results => render_results(self, area, buf),
        }
    }
}

fn render_typing(view: &FrameView, area: Rect, buf: &mut Buffer) {
    let dim_italic = Style::default()
        .add_modifier(Modifier::DIM)
        .add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title + metrics
            Constraint::Length(1), // resume hint
            Constraint::Min(1),    // snippet
            Constraint::Length(1), // key hints
        ])
        .split(area);

    let streak_style = if view.streak.at_milestone() {
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let metrics = Line::from(vec![
        Span::styled(
            view.session.task.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" · {} · ", metrics_summary(&view.stats))),
        Span::styled(format!("streak {}", view.streak.current), streak_style),
    ]);
    Paragraph::new(metrics)
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    if let Some(hint) = view.saved_hint {
        Paragraph::new(Span::styled(hint.to_string(), dim_italic))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }

    let lines = code_lines(view.session);
    let code_width = lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|s| s.content.as_ref().width())
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0) as u16;
    let code_area = centered(chunks[2], code_width, lines.len() as u16);
    Paragraph::new(lines).render(code_area, buf);

    Paragraph::new(Span::styled(
        "esc quit · ctrl-r restart · ctrl-x reset · ctrl-n next task",
        dim_italic,
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn render_results(view: &FrameView, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim_italic = Style::default()
        .add_modifier(Modifier::DIM)
        .add_modifier(Modifier::ITALIC);

    let stats = &view.stats;
    let rank = Rank::for_stats(stats);

    let mut lines = vec![
        Line::from(Span::styled("Task complete!", bold.fg(Color::Green))),
        Line::default(),
        Line::from(format!("time      {}", format_time(stats.elapsed_ms))),
        Line::from(format!("speed     {} cpm", stats.cpm)),
        Line::from(format!("accuracy  {}%", stats.accuracy_pct())),
        Line::from(format!("errors    {}", stats.wrong)),
        Line::from(format!("streak    {}", view.streak.best)),
        Line::default(),
        Line::from(Span::styled(
            format!("rank: {rank}"),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::ITALIC),
        )),
        Line::default(),
        Line::from(Span::styled(
            "(r)etry · (n)ext · (e)xport · esc quit",
            dim_italic,
        )),
    ];
    if view.auto_next_armed {
        lines.push(Line::from(Span::styled(
            "advancing to the next task…",
            dim_italic,
        )));
    }

    let height = lines.len() as u16;
    let target = centered(area, area.width.saturating_sub(HORIZONTAL_MARGIN * 2), height);
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(target, buf);
}
