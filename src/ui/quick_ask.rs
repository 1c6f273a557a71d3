use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::markdown::render_markdown;
use super::theme::*;
use super::{centered_rect, char_wrap};
use crate::app::{Composer, QuickAskState};
use crate::definitions::QuickAskField;
use crate::syntax::SyntaxHighlighter;

pub(super) fn render_quick_ask_overlay(
    f: &mut Frame<'_>,
    state: &QuickAskState,
    highlighter: &SyntaxHighlighter,
) {
    let area = centered_rect(70, 80, f.size());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(
            " Quick Ask ",
            Style::default().fg(BAR_TEXT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MENU_BORDER))
        .style(Style::default().bg(MENU_BG));
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(inner);

    render_label(f, "OpenAI API Key", chunks[0]);
    let masked = "•".repeat(state.api_key.buffer().chars().count());
    render_field(
        f,
        state,
        QuickAskField::ApiKey,
        &masked,
        "sk-...",
        chunks[1],
    );
    render_label(f, "Prompt", chunks[3]);
    render_field(
        f,
        state,
        QuickAskField::Prompt,
        state.prompt.buffer(),
        "Ask anything...",
        chunks[4],
    );

    let (button, button_style) = if state.is_sending() {
        ("Sending...", Style::default().fg(FG_DIM).bg(MENU_BG))
    } else {
        (
            "[ Send ⏎ ]",
            Style::default()
                .fg(MENU_HIGHLIGHT_TEXT)
                .bg(MENU_HIGHLIGHT_BG)
                .add_modifier(Modifier::BOLD),
        )
    };
    let hint = Span::styled(
        "  Tab switch field · Esc close",
        Style::default().fg(FG_DIM).bg(MENU_BG),
    );
    f.render_widget(
        Paragraph::new(Line::from(vec![Span::styled(button, button_style), hint]))
            .style(Style::default().bg(MENU_BG)),
        chunks[6],
    );

    if let Some(error) = state.error.as_ref() {
        f.render_widget(
            Paragraph::new(error.as_str()).style(Style::default().fg(ERROR_TEXT).bg(MENU_BG)),
            chunks[7],
        );
    }

    if let Some(response) = state.response.as_ref() {
        let response_area = chunks[8];
        let width = response_area.width.max(1) as usize;
        let mut lines = vec![Line::from(Span::styled(
            "Response:",
            Style::default().fg(MENU_TEXT).add_modifier(Modifier::BOLD),
        ))];
        lines.extend(render_markdown(response, width, highlighter));
        f.render_widget(
            Paragraph::new(lines).style(Style::default().fg(MENU_TEXT).bg(MENU_BG)),
            response_area,
        );
    }
}

fn render_label(f: &mut Frame<'_>, label: &str, area: Rect) {
    f.render_widget(
        Paragraph::new(label).style(Style::default().fg(MENU_TEXT).bg(MENU_BG)),
        area,
    );
}

/// 單行輸入欄位；過長時只顯示游標所在的那一段。
fn render_field(
    f: &mut Frame<'_>,
    state: &QuickAskState,
    field: QuickAskField,
    shown: &str,
    placeholder: &str,
    area: Rect,
) {
    let active = state.field == field;
    let marker = if active { "> " } else { "  " };
    let marker_style = Style::default().fg(BORDER_FOCUS).bg(MENU_BG);
    let width = area.width.saturating_sub(2).max(1) as usize;

    let composer: &Composer = match field {
        QuickAskField::ApiKey => &state.api_key,
        QuickAskField::Prompt => &state.prompt,
    };
    let (cursor_col, cursor_row) = composer.cursor_display_position(width);

    let text = if shown.is_empty() {
        Span::styled(
            placeholder.to_string(),
            Style::default().fg(FG_DIM).bg(MENU_BG),
        )
    } else {
        let segment = char_wrap(shown, width)
            .into_iter()
            .nth(cursor_row as usize)
            .unwrap_or_default();
        Span::styled(segment, Style::default().fg(Color::White).bg(MENU_BG))
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![Span::styled(marker, marker_style), text]))
            .style(Style::default().bg(MENU_BG)),
        area,
    );

    if active && !state.is_sending() {
        let x = area
            .x
            .saturating_add(2)
            .saturating_add(cursor_col.min(width.saturating_sub(1) as u16));
        f.set_cursor(x, area.y);
    }
}
