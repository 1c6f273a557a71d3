//! 將助理訊息的 Markdown 轉成 ratatui 的行。
//!
//! 解析使用 `markdown` crate 的 mdast（GFM 選項），程式碼區塊交給
//! `SyntaxHighlighter` 著色。串流中尚未關閉的 code fence 會被當成
//! 延伸到結尾的程式碼區塊，所以每個片段到達後重新解析即可。

use markdown::{ParseOptions, mdast, to_mdast};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::theme::{
    CODE_BLOCK_FG, CODE_GUTTER, FG_DIM, FG_PRIMARY, HEADING, INLINE_CODE_BG, INLINE_CODE_FG, LINK,
    QUOTE_BAR,
};
use crate::syntax::SyntaxHighlighter;

/// 以 `width` 欄寬渲染 Markdown。
pub fn render_markdown(
    text: &str,
    width: usize,
    highlighter: &SyntaxHighlighter,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let normalized = text.replace('\t', "    ");
    let root = match to_mdast(&normalized, &ParseOptions::gfm()) {
        Ok(node) => node,
        Err(_) => return wrap_spans(vec![Span::raw(normalized)], width),
    };
    let nodes = match root {
        mdast::Node::Root(root) => root.children,
        other => vec![other],
    };

    let renderer = Renderer { highlighter };
    renderer.blocks(&nodes, width.max(1))
}

struct Renderer<'a> {
    highlighter: &'a SyntaxHighlighter,
}

impl Renderer<'_> {
    /// 依序渲染區塊，區塊之間以空行分隔。
    fn blocks(&self, nodes: &[mdast::Node], width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for node in nodes {
            let rendered = self.block(node, width);
            if rendered.is_empty() {
                continue;
            }
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.extend(rendered);
        }
        lines
    }

    fn block(&self, node: &mdast::Node, width: usize) -> Vec<Line<'static>> {
        let base = Style::default().fg(FG_PRIMARY);
        match node {
            mdast::Node::Paragraph(paragraph) => {
                wrap_spans(inline_spans(&paragraph.children, base), width)
            }
            mdast::Node::Heading(heading) => {
                let style = Style::default().fg(HEADING).add_modifier(Modifier::BOLD);
                let mut spans = vec![Span::styled(
                    format!("{} ", "#".repeat(heading.depth as usize)),
                    Style::default().fg(FG_DIM),
                )];
                spans.extend(inline_spans(&heading.children, style));
                wrap_spans(spans, width)
            }
            mdast::Node::Code(code) => self.code_block(&code.value, code.lang.as_deref(), width),
            mdast::Node::List(list) => self.list(list, width),
            mdast::Node::Blockquote(quote) => {
                let inner = self.blocks(&quote.children, width.saturating_sub(2).max(1));
                let bar = Span::styled("▎ ", Style::default().fg(QUOTE_BAR));
                inner
                    .into_iter()
                    .map(|line| prefixed(bar.clone(), line, Some(Modifier::ITALIC)))
                    .collect()
            }
            mdast::Node::ThematicBreak(_) => vec![Line::from(Span::styled(
                "─".repeat(width),
                Style::default().fg(FG_DIM),
            ))],
            mdast::Node::Table(table) => self.table(table, width),
            mdast::Node::Html(html) => {
                wrap_spans(vec![Span::styled(html.value.clone(), base)], width)
            }
            other => match other.children() {
                Some(children) => self.blocks(children, width),
                None => Vec::new(),
            },
        }
    }

    fn list(&self, list: &mdast::List, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let start = list.start.unwrap_or(1);
        for (index, node) in list.children.iter().enumerate() {
            let mdast::Node::ListItem(item) = node else {
                continue;
            };
            let marker = if list.ordered {
                format!("{}. ", start + index as u32)
            } else {
                match item.checked {
                    Some(true) => "☑ ".to_string(),
                    Some(false) => "☐ ".to_string(),
                    None => "• ".to_string(),
                }
            };
            let indent = UnicodeWidthStr::width(marker.as_str());
            let body = if list.spread {
                self.blocks(&item.children, width.saturating_sub(indent).max(1))
            } else {
                self.tight_item(&item.children, width.saturating_sub(indent).max(1))
            };
            if list.spread && !lines.is_empty() {
                lines.push(Line::default());
            }

            let marker_span = Span::styled(marker, Style::default().fg(HEADING));
            let pad = Span::raw(" ".repeat(indent));
            if body.is_empty() {
                lines.push(Line::from(marker_span));
                continue;
            }
            for (row, line) in body.into_iter().enumerate() {
                let lead = if row == 0 {
                    marker_span.clone()
                } else {
                    pad.clone()
                };
                lines.push(prefixed(lead, line, None));
            }
        }
        lines
    }

    /// 緊湊清單的項目：子區塊之間不加空行。
    fn tight_item(&self, nodes: &[mdast::Node], width: usize) -> Vec<Line<'static>> {
        nodes
            .iter()
            .flat_map(|node| self.block(node, width))
            .collect()
    }

    fn code_block(&self, code: &str, lang: Option<&str>, width: usize) -> Vec<Line<'static>> {
        let gutter = Span::styled("│ ", Style::default().fg(CODE_GUTTER));
        let inner_width = width.saturating_sub(2).max(1);
        let mut lines = Vec::new();

        if let Some(lang) = lang.filter(|lang| !lang.trim().is_empty()) {
            lines.push(Line::from(vec![
                Span::styled("╭ ", Style::default().fg(CODE_GUTTER)),
                Span::styled(lang.trim().to_string(), Style::default().fg(FG_DIM)),
            ]));
        }

        let highlighted = self.highlighter.highlight(code, lang);
        let rows: Vec<Vec<(Style, String)>> = match highlighted {
            Some(rows) => rows
                .into_iter()
                .map(|segments| {
                    segments
                        .into_iter()
                        .map(|(color, text)| (Style::default().fg(color), text))
                        .collect()
                })
                .collect(),
            None => code
                .lines()
                .map(|line| vec![(Style::default().fg(CODE_BLOCK_FG), line.to_string())])
                .collect(),
        };

        for row in rows {
            for segment_line in hard_wrap(row, inner_width) {
                let mut spans = vec![gutter.clone()];
                spans.extend(segment_line);
                lines.push(Line::from(spans));
            }
        }
        if lines.is_empty() {
            lines.push(Line::from(gutter));
        }
        lines
    }

    fn table(&self, table: &mdast::Table, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for (index, row) in table.children.iter().enumerate() {
            let mdast::Node::TableRow(row) = row else {
                continue;
            };
            let cells: Vec<String> = row
                .children
                .iter()
                .map(|cell| plain_text(cell.children().map(Vec::as_slice).unwrap_or_default()))
                .collect();
            let style = if index == 0 {
                Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(FG_PRIMARY)
            };
            lines.extend(wrap_spans(vec![Span::styled(cells.join(" │ "), style)], width));
        }
        lines
    }
}

/// 收集行內節點為帶樣式的片段。軟換行視為空白，硬換行保留為 `\n`。
fn inline_spans(nodes: &[mdast::Node], style: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    collect_inline(nodes, style, &mut spans);
    spans
}

fn collect_inline(nodes: &[mdast::Node], style: Style, out: &mut Vec<Span<'static>>) {
    for node in nodes {
        match node {
            mdast::Node::Text(text) => out.push(Span::styled(text.value.replace('\n', " "), style)),
            mdast::Node::Strong(strong) => {
                collect_inline(&strong.children, style.add_modifier(Modifier::BOLD), out)
            }
            mdast::Node::Emphasis(emphasis) => collect_inline(
                &emphasis.children,
                style.add_modifier(Modifier::ITALIC),
                out,
            ),
            mdast::Node::Delete(delete) => collect_inline(
                &delete.children,
                style.add_modifier(Modifier::CROSSED_OUT),
                out,
            ),
            mdast::Node::InlineCode(code) => out.push(Span::styled(
                code.value.clone(),
                Style::default().fg(INLINE_CODE_FG).bg(INLINE_CODE_BG),
            )),
            mdast::Node::Link(link) => {
                let link_style = style.fg(LINK).add_modifier(Modifier::UNDERLINED);
                collect_inline(&link.children, link_style, out);
                if plain_text(&link.children) != link.url {
                    out.push(Span::styled(format!(" ({})", link.url), Style::default().fg(FG_DIM)));
                }
            }
            mdast::Node::Break(_) => out.push(Span::styled("\n", style)),
            mdast::Node::Image(image) => out.push(Span::styled(
                format!("[image: {}]", image.alt),
                Style::default().fg(FG_DIM),
            )),
            mdast::Node::Html(html) => out.push(Span::styled(html.value.clone(), style)),
            other => {
                if let Some(children) = other.children() {
                    collect_inline(children, style, out);
                }
            }
        }
    }
}

fn plain_text(nodes: &[mdast::Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            mdast::Node::Text(text) => out.push_str(&text.value),
            mdast::Node::InlineCode(code) => out.push_str(&code.value),
            mdast::Node::Image(image) => out.push_str(&image.alt),
            other => {
                if let Some(children) = other.children() {
                    out.push_str(&plain_text(children));
                }
            }
        }
    }
    out
}

fn prefixed(lead: Span<'static>, line: Line<'static>, modifier: Option<Modifier>) -> Line<'static> {
    let mut spans = Vec::with_capacity(line.spans.len() + 1);
    spans.push(lead);
    spans.extend(line.spans.into_iter().map(|span| match modifier {
        Some(modifier) => {
            let style = span.style.add_modifier(modifier);
            Span::styled(span.content, style)
        }
        None => span,
    }));
    Line::from(spans)
}

/// 依欄寬折行，盡量在空白處斷開；單字比欄寬還長時才逐字切開。
pub fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let mut wrapper = Wrapper::new(width.max(1));
    for span in spans {
        let style = span.style;
        let content = span.content.into_owned();
        let mut word = String::new();
        for ch in content.chars() {
            if ch == '\n' {
                wrapper.push_word(&mut word, style);
                wrapper.flush();
            } else if ch.is_whitespace() {
                wrapper.push_word(&mut word, style);
                wrapper.push_space(ch, style);
            } else {
                word.push(ch);
            }
        }
        wrapper.push_word(&mut word, style);
    }
    wrapper.finish()
}

struct Wrapper {
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    current_width: usize,
}

impl Wrapper {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Vec::new(),
            current_width: 0,
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        match self.current.last_mut() {
            Some(last) if last.style == style => last.content.to_mut().push_str(text),
            _ => self.current.push(Span::styled(text.to_string(), style)),
        }
    }

    fn push_space(&mut self, ch: char, style: Style) {
        // 折行後的行首不保留空白。
        if self.current_width == 0 {
            return;
        }
        let width = ch.width().unwrap_or(1).max(1);
        if self.current_width + width > self.width {
            self.flush();
            return;
        }
        self.push_text(" ", style);
        self.current_width += width;
    }

    fn push_word(&mut self, word: &mut String, style: Style) {
        if word.is_empty() {
            return;
        }
        let width = UnicodeWidthStr::width(word.as_str());
        if self.current_width > 0 && self.current_width + width > self.width {
            self.flush();
        }
        if width <= self.width {
            self.push_text(word, style);
            self.current_width += width;
        } else {
            for ch in word.chars() {
                let ch_width = ch.width().unwrap_or(1).max(1);
                if self.current_width > 0 && self.current_width + ch_width > self.width {
                    self.flush();
                }
                self.push_text(ch.encode_utf8(&mut [0; 4]), style);
                self.current_width += ch_width;
            }
        }
        word.clear();
    }

    fn flush(&mut self) {
        if let Some(last) = self.current.last_mut() {
            let trimmed = last.content.trim_end_matches(' ').len();
            last.content.to_mut().truncate(trimmed);
        }
        self.current.retain(|span| !span.content.is_empty());
        let line = Line::from(std::mem::take(&mut self.current));
        self.lines.push(line);
        self.current_width = 0;
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() || self.lines.is_empty() {
            self.flush();
        }
        self.lines
    }
}

/// 逐字切開已著色的程式碼行，不做單字折行。
fn hard_wrap(segments: Vec<(Style, String)>, width: usize) -> Vec<Vec<Span<'static>>> {
    let mut rows = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0usize;
    for (style, text) in segments {
        let mut chunk = String::new();
        for ch in text.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if current_width + ch_width > width && current_width > 0 {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                rows.push(std::mem::take(&mut current));
                current_width = 0;
            }
            chunk.push(ch);
            current_width += ch_width;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }
    rows.push(current);
    rows
}
