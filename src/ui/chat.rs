use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::markdown::{render_markdown, wrap_spans};
use super::theme::*;
use super::{char_wrap, focused_border, icon_glyph};
use crate::agent::ChatRole;
use crate::app::{ChatView, DrawerState};
use crate::definitions::{ChatFocus, DrawerItem, HitAreas};
use crate::syntax::SyntaxHighlighter;

const COMPOSER_PLACEHOLDER: &str = "Type a message...";
const DRAWER_WIDTH: u16 = 26;

/// 聊天畫面：標題列、對話紀錄、輸入框，以及開啟時的側邊選單。
pub(super) fn render_chat(
    f: &mut Frame<'_>,
    view: &mut ChatView,
    hit_areas: &mut HitAreas,
    highlighter: &SyntaxHighlighter,
    frame: usize,
    show_cursor: bool,
    area: Rect,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, view, hit_areas, sections[0]);
    render_transcript(f, view, hit_areas, highlighter, frame, sections[1]);
    render_composer(f, view, hit_areas, show_cursor, sections[2]);
    render_notice(f, view, sections[3]);

    if let Some(drawer) = view.drawer {
        let drawer_area = Rect {
            x: area.x,
            y: sections[1].y,
            width: DRAWER_WIDTH.min(area.width),
            height: area.height.saturating_sub(1),
        };
        render_drawer(f, drawer, hit_areas, drawer_area);
    }
}

fn render_header(f: &mut Frame<'_>, view: &ChatView, hit_areas: &mut HitAreas, area: Rect) {
    let agent = view.controller.agent();
    let base = Style::default().fg(BAR_TEXT).bg(BG_PANEL);
    let button = base.add_modifier(Modifier::BOLD);
    let menu_style = if view.drawer.is_some() {
        button.bg(BAR_HIGHLIGHT_BG)
    } else {
        button
    };

    let menu_label = " ☰ ";
    let back_label = " ← ";
    let menu_width = super::cell_width(menu_label);
    let back_width = super::cell_width(back_label);
    hit_areas.menu_button = Rect {
        x: area.x,
        y: area.y,
        width: menu_width.min(area.width),
        height: 1,
    };
    hit_areas.back_button = Rect {
        x: area.x.saturating_add(menu_width),
        y: area.y,
        width: back_width.min(area.width.saturating_sub(menu_width)),
        height: 1,
    };

    let line = Line::from(vec![
        Span::styled(menu_label, menu_style),
        Span::styled(back_label, button),
        Span::styled(" ", base),
        Span::styled(
            icon_glyph(agent.icon),
            Style::default().fg(ASSISTANT_LABEL).bg(BG_PANEL),
        ),
        Span::styled(" ", base),
        Span::styled(agent.display_name.clone(), button),
    ]);
    f.render_widget(Paragraph::new(line).style(base), area);
}

fn render_transcript(
    f: &mut Frame<'_>,
    view: &mut ChatView,
    hit_areas: &mut HitAreas,
    highlighter: &SyntaxHighlighter,
    frame: usize,
    area: Rect,
) {
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_IDLE))
        .title(Span::styled(
            ChatFocus::Transcript.label(),
            Style::default().fg(FG_PRIMARY),
        ))
        .style(Style::default().bg(BG_PRIMARY));
    if view.focus == ChatFocus::Transcript && view.drawer.is_none() {
        block = block.border_style(focused_border());
    }
    let inner = block.inner(area);
    hit_areas.transcript = area;

    let lines = transcript_lines(view, highlighter, frame, inner.width.max(1) as usize);
    view.scroll.sync(lines.len(), inner.height as usize);
    let offset = view.scroll.offset.min(u16::MAX as usize) as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(FG_PRIMARY).bg(BG_PRIMARY))
        .scroll((offset, 0));
    f.render_widget(paragraph, area);
}

/// 將整段對話轉成已折行的行，捲動以行為單位計算。
pub(super) fn transcript_lines(
    view: &ChatView,
    highlighter: &SyntaxHighlighter,
    frame: usize,
    width: usize,
) -> Vec<Line<'static>> {
    let agent = view.controller.agent();
    let conversation = view.controller.conversation();
    let messages = conversation.messages();
    let session = view.controller.session();
    let mut lines: Vec<Line<'static>> = Vec::new();

    if messages.is_empty() {
        lines.push(Line::default());
        lines.push(
            Line::from(Span::styled(
                format!("Start a conversation with {}", agent.display_name),
                Style::default().fg(FG_DIM),
            ))
            .alignment(Alignment::Center),
        );
        return lines;
    }

    let bubble_width = (width * 7 / 10).max(10).min(width);
    let body_width = width.saturating_sub(2).max(1);

    for (index, message) in messages.iter().enumerate() {
        let is_last = index + 1 == messages.len();
        if index > 0 {
            lines.push(Line::default());
        }
        match message.role {
            ChatRole::User => {
                lines.push(right_aligned(
                    vec![Span::styled("You", Style::default().fg(FG_DIM))],
                    width,
                ));
                let bubble = Style::default().fg(USER_BUBBLE_FG).bg(USER_BUBBLE_BG);
                let text = Span::styled(message.content.clone(), bubble);
                for line in wrap_spans(vec![text], bubble_width) {
                    let mut spans = vec![Span::styled(" ", bubble)];
                    spans.extend(line.spans);
                    spans.push(Span::styled(" ", bubble));
                    lines.push(right_aligned(spans, width));
                }
            }
            ChatRole::Assistant => {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{} ", icon_glyph(agent.icon)),
                        Style::default().fg(ASSISTANT_LABEL),
                    ),
                    Span::styled(
                        agent.display_name.clone(),
                        Style::default()
                            .fg(ASSISTANT_LABEL)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
                if is_last && session.is_waiting() && message.content.is_empty() {
                    lines.push(loading_line(frame));
                    continue;
                }
                let body = if conversation.is_failed(index) {
                    let style = Style::default().fg(ERROR_TEXT);
                    let notice = Span::styled(message.content.clone(), style);
                    wrap_spans(vec![notice], body_width)
                } else {
                    render_markdown(&message.content, body_width, highlighter)
                };
                lines.extend(body.into_iter().map(indented));
            }
            ChatRole::System => {}
        }
    }

    let reply_started = matches!(messages.last(), Some(m) if m.role == ChatRole::Assistant);
    if session.is_waiting() && !reply_started {
        lines.push(loading_line(frame));
    }
    lines
}

fn right_aligned(spans: Vec<Span<'static>>, width: usize) -> Line<'static> {
    let used: usize = spans.iter().map(|span| span.width()).sum();
    let mut padded = Vec::with_capacity(spans.len() + 1);
    if width > used {
        padded.push(Span::raw(" ".repeat(width - used)));
    }
    padded.extend(spans);
    Line::from(padded)
}

fn indented(line: Line<'static>) -> Line<'static> {
    let mut spans = Vec::with_capacity(line.spans.len() + 1);
    spans.push(Span::raw("  "));
    spans.extend(line.spans);
    Line::from(spans)
}

/// 等待第一個片段時的三點動畫。
fn loading_line(frame: usize) -> Line<'static> {
    let active = frame % 3;
    let spans = (0..3)
        .map(|dot| {
            let style = if dot == active {
                Style::default()
                    .fg(ASSISTANT_LABEL)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(FG_DIM)
            };
            Span::styled(if dot == 2 { "●" } else { "● " }, style)
        })
        .collect::<Vec<_>>();
    indented(Line::from(spans))
}

fn render_composer(
    f: &mut Frame<'_>,
    view: &ChatView,
    hit_areas: &mut HitAreas,
    show_cursor: bool,
    area: Rect,
) {
    let enabled = view.input_enabled();
    let focused = view.focus == ChatFocus::Composer && view.drawer.is_none();
    let title = if enabled {
        ChatFocus::Composer.label().to_string()
    } else {
        format!("Waiting for {}...", view.controller.agent().display_name)
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_IDLE))
        .title(Span::styled(title, Style::default().fg(FG_PRIMARY)))
        .style(Style::default().bg(BG_PANEL));
    if focused && enabled {
        block = block.border_style(focused_border());
    }
    let inner = block.inner(area);
    hit_areas.composer = area;

    let width = inner.width.max(1) as usize;
    let (cursor_col, cursor_row) = view.composer.cursor_display_position(width);
    let text_style = if enabled {
        Style::default().fg(FG_PRIMARY)
    } else {
        Style::default().fg(FG_DIM)
    };
    let lines: Vec<Line> = if view.composer.is_empty() {
        let placeholder = Span::styled(COMPOSER_PLACEHOLDER, Style::default().fg(FG_DIM));
        vec![Line::from(placeholder)]
    } else {
        char_wrap(view.composer.buffer(), width)
            .into_iter()
            .map(|segment| Line::from(Span::styled(segment, text_style)))
            .collect()
    };
    let visible_rows = inner.height.max(1);
    let scroll = cursor_row.saturating_sub(visible_rows - 1);

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .style(Style::default().bg(BG_PANEL))
            .scroll((scroll, 0)),
        area,
    );

    if show_cursor && focused && enabled && inner.width > 0 && inner.height > 0 {
        let x = inner
            .x
            .saturating_add(cursor_col.min(inner.width.saturating_sub(1)));
        let y = inner
            .y
            .saturating_add((cursor_row - scroll).min(inner.height.saturating_sub(1)));
        f.set_cursor(x, y);
    }
}

fn render_notice(f: &mut Frame<'_>, view: &ChatView, area: Rect) {
    let line = match view.notice.as_deref() {
        Some(notice) => {
            Line::from(Span::styled(notice.to_string(), Style::default().fg(ERROR_TEXT)))
        }
        None => Line::from(Span::styled(
            "Enter send · Tab switch focus · PgUp/PgDn scroll · Ctrl+B menu · Esc back",
            Style::default().fg(FG_DIM),
        )),
    };
    let paragraph = Paragraph::new(line).style(Style::default().bg(BG_PRIMARY));
    f.render_widget(paragraph, area);
}

fn render_drawer(f: &mut Frame<'_>, drawer: DrawerState, hit_areas: &mut HitAreas, area: Rect) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(
            " Menu ",
            Style::default().fg(MENU_TEXT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MENU_BORDER))
        .style(Style::default().bg(MENU_BG));
    let inner = block.inner(area);
    f.render_widget(block, area);
    hit_areas.drawer = Some(area);

    for (index, item) in DrawerItem::ALL.iter().enumerate() {
        let row = inner.y.saturating_add(index as u16 * 2);
        if row >= inner.y.saturating_add(inner.height) {
            break;
        }
        let rect = Rect {
            x: inner.x,
            y: row,
            width: inner.width,
            height: 1,
        };
        let style = if drawer.selected == index {
            Style::default()
                .fg(MENU_HIGHLIGHT_TEXT)
                .bg(MENU_HIGHLIGHT_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MENU_TEXT).bg(MENU_BG)
        };
        let label = Paragraph::new(format!(" {}", item.label())).style(style);
        f.render_widget(label, rect);
        hit_areas.drawer_items.push((*item, rect));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::providers::scripted::{ScriptedClient, ScriptedFailure};
    use crate::agent::{AgentRegistry, ChatController, CompletionError, FAILURE_NOTICE};

    fn text_of(line: &Line<'_>) -> String {
        line.spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect()
    }

    fn view(fragments: &[&str]) -> ChatView {
        let agent = AgentRegistry::builtin().agents()[0].clone();
        ChatView::new(ChatController::new(agent, Arc::new(ScriptedClient::new(fragments))))
    }

    #[test]
    fn empty_chat_shows_an_invitation() {
        let view = view(&[]);
        let lines = transcript_lines(&view, &SyntaxHighlighter::new(), 0, 40);
        assert!(text_of(&lines[1]).starts_with("Start a conversation with"));
    }

    #[tokio::test]
    async fn waiting_placeholder_shows_dots_then_markdown() {
        let mut view = view(&["**Hi**"]);
        view.controller.submit("Hello").unwrap();
        let highlighter = SyntaxHighlighter::new();

        let lines = transcript_lines(&view, &highlighter, 1, 40);
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert!(texts[1].ends_with(" Hello "));
        assert_eq!(texts[1].chars().count(), 40);
        assert_eq!(texts.last().map(String::as_str), Some("  ● ● ●"));

        while view.controller.session().is_loading {
            view.controller.next_update().await;
        }
        let lines = transcript_lines(&view, &highlighter, 1, 40);
        assert_eq!(lines.last().map(text_of).as_deref(), Some("  Hi"));
    }

    #[tokio::test]
    async fn failure_notice_is_shown_as_error() {
        let client = ScriptedClient::new(&["partial"]).failing(ScriptedFailure::AfterFragments(
            CompletionError::Transport("connection reset".into()),
        ));
        let agent = AgentRegistry::builtin().agents()[0].clone();
        let mut view = ChatView::new(ChatController::new(agent, Arc::new(client)));
        view.controller.submit("Hello").unwrap();
        while view.controller.session().is_loading {
            view.controller.next_update().await;
        }

        let lines = transcript_lines(&view, &SyntaxHighlighter::new(), 0, 60);
        let last = lines.last().unwrap();
        assert_eq!(text_of(last), format!("  {FAILURE_NOTICE}"));
        assert_eq!(last.spans[1].style.fg, Some(ERROR_TEXT));
    }

    #[tokio::test]
    async fn reply_matching_notice_text_is_not_styled_as_error() {
        let mut view = view(&[FAILURE_NOTICE]);
        view.controller.submit("Say the error line").unwrap();
        while view.controller.session().is_loading {
            view.controller.next_update().await;
        }

        let lines = transcript_lines(&view, &SyntaxHighlighter::new(), 0, 60);
        let last = lines.last().unwrap();
        assert_eq!(text_of(last), format!("  {FAILURE_NOTICE}"));
        let colors: Vec<_> = last.spans.iter().map(|span| span.style.fg).collect();
        assert!(!colors.contains(&Some(ERROR_TEXT)));
    }
}
