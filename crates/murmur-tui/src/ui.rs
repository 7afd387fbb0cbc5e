use murmur_core::{Message, Severity};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::app::App;

const CURSOR: &str = "▌";

pub fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Transcript
            Constraint::Length(3), // Input
            Constraint::Length(1), // Footer
        ])
        .split(f.size());

    draw_header(f, app, chunks[0]);
    draw_transcript(f, app, chunks[1]);
    draw_input(f, app, chunks[2]);
    draw_footer(f, app, chunks[3]);
    draw_toasts(f, app);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let activity = if app.is_busy() {
        Span::styled(
            format!("  {} Waiting for reply...", app.spinner()),
            Style::default().fg(Color::Yellow),
        )
    } else if app.is_revealing() {
        Span::styled(
            format!("  {} Typing...", app.spinner()),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::raw("")
    };

    let header_text = Line::from(vec![
        Span::styled(
            format!(" {}", app.ui.title),
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Cyan),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("Session {}", app.snapshot.session_id),
            Style::default().fg(Color::Gray),
        ),
        activity,
    ]);

    let header = Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn draw_transcript(f: &mut Frame, app: &mut App, area: Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let visible_height = area.height.saturating_sub(2) as usize;

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.snapshot.messages {
        lines.extend(format_message(msg, inner_width));
    }

    app.set_scroll_limit(lines.len().saturating_sub(visible_height));
    let start = visible_range_start(lines.len(), visible_height, app.scroll_offset);
    let visible: Vec<Line> = lines.into_iter().skip(start).take(visible_height).collect();

    let transcript = Paragraph::new(visible).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Conversation")
            .border_style(Style::default().fg(Color::Blue)),
    );

    f.render_widget(transcript, area);
}

/// First transcript line to show when scrolled `offset` lines up from the bottom
fn visible_range_start(total: usize, height: usize, offset: usize) -> usize {
    let bottom = total.saturating_sub(height);
    bottom.saturating_sub(offset)
}

fn format_message(msg: &Message, width: usize) -> Vec<Line<'static>> {
    let (style, alignment) = if msg.is_user() {
        (Style::default().fg(Color::Cyan), Alignment::Right)
    } else {
        (Style::default().fg(Color::Green), Alignment::Left)
    };

    // Leave room for the reveal cursor on the last line.
    let body_width = width.saturating_sub(1).max(1);
    let wrapped = wrap_text(&msg.text, body_width);
    let last = wrapped.len().saturating_sub(1);

    let mut lines = Vec::with_capacity(wrapped.len() + 2);
    for (idx, segment) in wrapped.into_iter().enumerate() {
        let mut spans = vec![Span::styled(segment, style)];
        if msg.revealing && idx == last {
            spans.push(Span::styled(CURSOR, Style::default().fg(Color::Green)));
        }
        lines.push(Line::from(spans).alignment(alignment));
    }

    lines.push(
        Line::from(Span::styled(
            msg.time_label(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(alignment),
    );
    lines.push(Line::from(""));

    lines
}

/// Break `text` into display lines no wider than `width` columns.
///
/// Explicit newlines are kept. An empty input still yields one empty line so
/// a placeholder has somewhere to draw the cursor.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;

        for ch in raw_line.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push(ch);
            current_width += w;
        }
        out.push(current);
    }

    out
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let input_text = if app.is_busy() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "Waiting for the assistant...",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])
    } else if app.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                app.ui.placeholder.clone(),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(app.input.as_str(), Style::default().fg(Color::White)),
            Span::styled(CURSOR, Style::default().fg(Color::Green)),
        ])
    };

    let border = if app.is_busy() { Color::DarkGray } else { Color::Blue };
    let input = Paragraph::new(input_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Message")
                .border_style(Style::default().fg(border)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(input, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let help_text = if app.is_busy() {
        "[Ctrl+N] New  [Esc] Quit"
    } else {
        "[Enter] Send  [Ctrl+N] New  [Up/Down] Scroll  [Esc] Quit"
    };

    let footer = Paragraph::new(format!(" {} | {}", app.ui.footer, help_text))
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::REVERSED),
        );

    f.render_widget(footer, area);
}

fn draw_toasts(f: &mut Frame, app: &App) {
    let screen = f.size();
    let width = screen.width.min(48);
    let mut y = screen.y + 1;

    for toast in app.toasts.iter().rev() {
        if y + 4 > screen.bottom() {
            break;
        }
        let area = Rect::new(screen.right().saturating_sub(width + 1), y, width, 4);
        let color = match toast.notice.severity {
            Severity::Error => Color::Red,
            Severity::Info => Color::Cyan,
        };

        let popup = Paragraph::new(toast.notice.body.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(toast.notice.title.as_str())
                    .border_style(Style::default().fg(color)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(popup, area);
        y += 4;
    }
}
