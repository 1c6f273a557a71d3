use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::agent::{AgentIcon, AgentRegistry};
use crate::app::{AgentSelection, App, OverlayState, Screen};
use crate::definitions::HitAreas;

mod chat;
mod markdown;
mod quick_ask;
mod theme;
use theme::*;

const APP_TITLE: &str = "AI Chat";
const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 12;
const CARD_HEIGHT: u16 = 5;

fn cell_width(text: &str) -> u16 {
    UnicodeWidthStr::width(text).min(u16::MAX as usize) as u16
}

/// 取得焦點的框線。
fn focused_border() -> Style {
    Style::default()
        .fg(BORDER_FOCUS)
        .add_modifier(Modifier::BOLD)
}

pub fn render(f: &mut Frame<'_>, app: &mut App) {
    app.hit_areas.clear();
    let size = f.size();
    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
        let block = Paragraph::new(format!(
            "Terminal too small. Resize to at least {MIN_WIDTH}x{MIN_HEIGHT}."
        ))
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(APP_TITLE)
                .borders(Borders::ALL)
                .style(Style::default().fg(FG_PRIMARY).bg(MENU_BG)),
        )
        .style(Style::default().fg(FG_PRIMARY).bg(BG_PRIMARY));
        f.render_widget(block, size);
        return;
    }

    let base = Block::default().style(Style::default().bg(BG_PRIMARY));
    f.render_widget(base, size);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(size);
    let navbar_area = vertical[0];
    let main_area = vertical[1];
    let footer_area = vertical[2];

    render_navbar(f, app, navbar_area);

    let show_cursor = app.overlay.is_none();
    let App {
        screen,
        registry,
        hit_areas,
        highlighter,
        frame,
        ..
    } = app;
    match screen {
        Screen::Selection(selection) => {
            render_selection(f, selection, registry, hit_areas, main_area)
        }
        Screen::Chat(view) => chat::render_chat(
            f,
            view,
            hit_areas,
            highlighter,
            *frame,
            show_cursor,
            main_area,
        ),
    }

    render_footer(f, app, footer_area);

    if let Some(overlay) = app.overlay.as_ref() {
        match overlay {
            OverlayState::QuickAsk(state) => {
                quick_ask::render_quick_ask_overlay(f, state, &app.highlighter)
            }
            OverlayState::About => render_about_overlay(f, app),
        }
    }
}

fn render_navbar(f: &mut Frame<'_>, app: &App, area: Rect) {
    f.render_widget(Clear, area);
    let mut spans = vec![Span::styled(
        format!(" {APP_TITLE} "),
        Style::default()
            .fg(BAR_TEXT)
            .bg(BAR_HIGHLIGHT_BG)
            .add_modifier(Modifier::BOLD),
    )];
    if let Screen::Chat(view) = &app.screen {
        let agent = view.controller.agent();
        spans.push(Span::styled(
            format!(" {} {}", icon_glyph(agent.icon), agent.display_name),
            Style::default().fg(BAR_TEXT).bg(BAR_BG),
        ));
    }
    let bar = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Left)
        .style(Style::default().fg(BAR_TEXT).bg(BAR_BG));
    f.render_widget(bar, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    f.render_widget(Clear, area);
    let copyright = if area.width >= 90 {
        format!("F1 About · Ctrl+K Quick Ask · Ctrl+Q Quit │ © {APP_TITLE} ")
    } else {
        format!("© {APP_TITLE} ")
    };
    let right_width = cell_width(&copyright).min(area.width);
    let left = Rect {
        width: area.width.saturating_sub(right_width),
        ..area
    };
    let right = Rect {
        x: left.x.saturating_add(left.width),
        width: right_width,
        ..area
    };

    let style = Style::default().fg(BAR_TEXT).bg(BAR_BG);
    f.render_widget(
        Paragraph::new(format!(" {}", app.status_message)).style(style),
        left,
    );
    f.render_widget(
        Paragraph::new(copyright)
            .alignment(Alignment::Right)
            .style(style),
        right,
    );
}

/// 依寬度決定每列幾張卡片。
fn grid_columns(width: u16) -> usize {
    match width {
        w if w >= 96 => 3,
        w if w >= 64 => 2,
        _ => 1,
    }
}

fn render_selection(
    f: &mut Frame<'_>,
    selection: &mut AgentSelection,
    registry: &AgentRegistry,
    hit_areas: &mut HitAreas,
    area: Rect,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(CARD_HEIGHT),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            "Select an AI Agent",
            Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        sections[1],
    );
    f.render_widget(
        Paragraph::new(Span::styled(
            "←/→/↑/↓ move · Enter choose · 1-9 quick pick · q quit",
            Style::default().fg(FG_DIM),
        ))
        .alignment(Alignment::Center),
        sections[2],
    );

    let grid = sections[4];
    let columns = grid_columns(grid.width);
    selection.columns = columns;
    let card_width = grid.width / columns as u16;
    let visible_rows = (grid.height / CARD_HEIGHT).max(1) as usize;
    let selected_row = selection.selected / columns;
    let first_row = selected_row.saturating_sub(visible_rows - 1);

    for (index, agent) in registry.agents().iter().enumerate() {
        let row = index / columns;
        let column = index % columns;
        if row < first_row || row >= first_row + visible_rows {
            hit_areas.agent_cards.push(Rect::default());
            continue;
        }
        let rect = Rect {
            x: grid.x + column as u16 * card_width,
            y: grid.y + (row - first_row) as u16 * CARD_HEIGHT,
            width: card_width,
            height: CARD_HEIGHT,
        };
        hit_areas.agent_cards.push(rect);

        let highlighted = index == selection.selected;
        let border = if highlighted {
            focused_border()
        } else {
            Style::default().fg(BORDER_IDLE)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Span::styled(format!(" {} ", index + 1), Style::default().fg(FG_DIM)))
            .style(Style::default().bg(BG_PANEL));
        let name_style = if highlighted {
            Style::default()
                .fg(BG_PRIMARY)
                .bg(PANEL_HIGHLIGHT_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
        };
        let lines = vec![
            Line::from(Span::styled(
                icon_glyph(agent.icon),
                Style::default().fg(ASSISTANT_LABEL),
            )),
            Line::from(Span::styled(format!(" {} ", agent.display_name), name_style)),
            Line::from(Span::styled(agent.id.clone(), Style::default().fg(FG_DIM))),
        ];
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(block),
            rect,
        );
    }
}

fn render_about_overlay(f: &mut Frame<'_>, app: &App) {
    let area = centered_rect(50, 40, f.size());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(
            " About ",
            Style::default().fg(BAR_TEXT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MENU_BORDER))
        .style(Style::default().bg(MENU_BG));

    let key_status = if app.client.has_credentials() {
        format!("API key: loaded from {}", app.provider.api_key_env)
    } else {
        format!("API key: {} is not set", app.provider.api_key_env)
    };
    let text = vec![
        Line::from(Span::styled(
            format!("{APP_TITLE} {}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(MENU_TEXT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Chat with a persona of your choice.",
            Style::default().fg(MENU_TEXT),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!("Provider: {} ({})", app.client.name(), app.client.model()),
            Style::default().fg(MENU_TEXT),
        )),
        Line::from(Span::styled(key_status, Style::default().fg(MENU_TEXT))),
        Line::from(Span::styled(
            format!("Agents: {}", app.registry.len()),
            Style::default().fg(MENU_TEXT),
        )),
        Line::default(),
        Line::from(Span::styled("Esc / Enter close", Style::default().fg(FG_DIM))),
    ];
    f.render_widget(
        Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: true }),
        area,
    );
}

/// 人設圖示對應的終端機字元。
pub(crate) fn icon_glyph(icon: AgentIcon) -> &'static str {
    match icon {
        AgentIcon::Code => "</>",
        AgentIcon::PenTool => "✎",
        AgentIcon::Languages => "文A",
        AgentIcon::Bot => "◉",
    }
}

/// 逐字元依顯示寬度切行，與 `Composer::cursor_display_position` 的換行方式一致。
fn char_wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
        if current_width + ch_width > width && !current.is_empty() {
            result.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    result.push(current);
    result
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1])[1]
}
