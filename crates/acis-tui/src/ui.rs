use std::sync::OnceLock;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use tui_banner::Banner;

use acis_core::onboarding::OnboardingState;

use crate::app::{App, MessageRole};

/// Cached banner, rendered once since it never changes.
struct BannerCache {
    lines: Vec<String>,
    /// Widest line in the banner (character count).
    width: u16,
    height: u16,
}

fn cached_banner() -> &'static BannerCache {
    static CACHE: OnceLock<BannerCache> = OnceLock::new();
    CACHE.get_or_init(|| {
        let text = Banner::new("ACIS")
            .map(|b| b.style(tui_banner::Style::NeonCyber).render())
            .unwrap_or_else(|_| String::from("ACIS"));
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let width = lines
            .iter()
            .map(|l| l.chars().count() as u16)
            .max()
            .unwrap_or(4);
        let height = lines.len() as u16;
        BannerCache {
            lines,
            width,
            height,
        }
    })
}

/// Draw the TUI layout.
pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let banner = cached_banner();

    // Full art when it fits with room for the chat, a one-line title otherwise
    let min_body_rows: u16 = 10;
    let banner_height = if area.height < min_body_rows + 3 {
        0
    } else if area.width >= banner.width + 2 && area.height >= banner.height + 1 + min_body_rows {
        banner.height + 1
    } else {
        2
    };

    let mut constraints = Vec::with_capacity(4);
    if banner_height > 0 {
        constraints.push(Constraint::Length(banner_height));
    }
    constraints.extend([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(3),
    ]);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let offset = if banner_height > 0 {
        draw_banner(f, chunks[0], banner_height);
        1
    } else {
        0
    };

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[offset]);

    draw_messages(f, app, body[0]);
    draw_progress(f, &app.state, body[1]);
    draw_status_bar(f, app, chunks[offset + 1]);
    draw_input(f, app, chunks[offset + 2]);
}

fn draw_banner(f: &mut Frame, area: Rect, banner_height: u16) {
    let banner = cached_banner();

    let lines: Vec<Line> = if banner_height > 2 && area.width >= banner.width {
        banner
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan))))
            .collect()
    } else {
        vec![Line::from(vec![
            Span::styled(
                " ACIS",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  Onboarding Assistant",
                Style::default().fg(Color::DarkGray),
            ),
        ])]
    };

    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(widget, area);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for msg in &app.messages {
        let (prefix, style) = match msg.role {
            MessageRole::User => (
                "> ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            MessageRole::Assistant => ("", Style::default().fg(Color::White)),
            MessageRole::Error => (
                "[error] ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            MessageRole::System => ("[system] ", Style::default().fg(Color::DarkGray)),
        };

        for text_line in msg.text.lines() {
            lines.push(Line::from(vec![
                Span::styled(prefix, style),
                Span::styled(text_line.to_string(), style),
            ]));
        }
        lines.push(Line::from(""));
    }

    let visible_height = area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();
    let scroll = total_lines
        .saturating_sub(visible_height)
        .saturating_sub(app.scroll_offset);

    let messages = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Chat "))
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    f.render_widget(messages, area);
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn field(label: &str, value: Option<&str>) -> Line<'static> {
    let (value, style) = match value {
        Some(v) => (v.to_string(), Style::default().fg(Color::White)),
        None => ("Not set".to_string(), Style::default().fg(Color::DarkGray)),
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, style),
    ])
}

fn list(label: &str, items: &Option<Vec<String>>, missing: &str) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("{}:", label),
        Style::default().fg(Color::Gray),
    ))];
    match items {
        Some(items) if !items.is_empty() => {
            for item in items {
                lines.push(Line::from(format!("  - {}", item)));
            }
        }
        _ => lines.push(Line::from(Span::styled(
            format!("  {}", missing),
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines
}

/// Lines of the progress panel.
pub fn progress_lines(state: &OnboardingState) -> Vec<Line<'static>> {
    let mut lines = vec![heading("Basic Information")];
    lines.push(field("Store ID", state.store_id.as_ref().map(|s| s.as_str())));
    lines.push(field("Team", state.team_name.as_deref()));
    lines.push(field("Profile", state.profile_name.as_deref()));
    lines.push(field("Step", Some(state.step.label())));

    lines.push(Line::from(""));
    lines.push(heading("B2B Information"));
    lines.extend(list("Available Profiles", &state.b2b_profiles, "Not fetched"));
    lines.extend(list("Available Identities", &state.b2b_identities, "Not fetched"));

    lines.push(Line::from(""));
    lines.push(heading("Your Selections"));
    lines.extend(list("Profiles", &state.selected_profiles, "None yet"));
    lines.extend(list("Identities", &state.selected_identities, "None yet"));

    if let Some(id) = &state.onboarding_id {
        lines.push(Line::from(""));
        lines.push(field("Onboarding ID", Some(id)));
    }

    if state.is_completed() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " ONBOARDING COMPLETE ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines
}

fn draw_progress(f: &mut Frame, state: &OnboardingState, area: Rect) {
    let panel = Paragraph::new(progress_lines(state))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Onboarding Progress "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let status_text = if app.pending {
        let spinner = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let idx = (app.tick_count / 2) % spinner.len();
        format!(" {} Waiting for the assistant...", spinner[idx])
    } else {
        format!(
            " Session: {} | Step: {} | /reset /state /clear /quit",
            app.session_id,
            app.state.step.label()
        )
    };

    let bg = if app.state.is_completed() {
        Color::Green
    } else {
        Color::DarkGray
    };
    let status = Paragraph::new(status_text).style(Style::default().bg(bg).fg(Color::White));
    f.render_widget(status, area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.state.is_completed() {
        " Commands only "
    } else {
        " Message "
    };
    let input = Paragraph::new(app.input.buffer.as_str())
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::White));

    f.render_widget(input, area);

    let cursor_x = area.x + 1 + app.input.cursor as u16;
    let cursor_y = area.y + 1;
    f.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(2)), cursor_y));
}
