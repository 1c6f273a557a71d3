use log::debug;
use ratatui::style::Color;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const THEME_NAME: &str = "base16-ocean.dark";

/// 一行程式碼的著色結果：每段文字與其前景色。
pub type HighlightedLine = Vec<(Color, String)>;

/// 載入 syntect 的預設語法與配色，替訊息中的程式碼區塊著色。
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes
            .remove(THEME_NAME)
            .or_else(|| themes.into_values().next());
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    /// 依語言標記（例如 `python`、`cpp`、`rs`）為程式碼著色。
    ///
    /// 找不到語法或著色失敗時回傳 `None`，呼叫端以純文字顯示。
    pub fn highlight(&self, code: &str, language: Option<&str>) -> Option<Vec<HighlightedLine>> {
        let theme = self.theme.as_ref()?;
        let token = language.map(str::trim).filter(|lang| !lang.is_empty())?;
        let syntax = self.syntax_set.find_syntax_by_token(token)?;

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(code) {
            let ranges = match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => ranges,
                Err(err) => {
                    debug!("Highlighting {token} failed: {err}");
                    return None;
                }
            };
            let segments = ranges
                .into_iter()
                .map(|(style, text)| {
                    let fg = style.foreground;
                    (Color::Rgb(fg.r, fg.g, fg.b), text.trim_end_matches(['\n', '\r']).to_string())
                })
                .filter(|(_, text)| !text.is_empty())
                .collect();
            lines.push(segments);
        }
        Some(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_is_colored() {
        let highlighter = SyntaxHighlighter::new();
        let lines = highlighter
            .highlight("def greet():\n    return \"hi\"\n", Some("python"))
            .unwrap();

        assert_eq!(lines.len(), 2);
        let first: String = lines[0].iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(first, "def greet():");
        let colors: std::collections::HashSet<_> =
            lines[0].iter().map(|(color, _)| *color).collect();
        assert!(colors.len() > 1);
    }

    #[test]
    fn unknown_or_missing_language_falls_back() {
        let highlighter = SyntaxHighlighter::new();
        assert!(highlighter.highlight("x", Some("no-such-lang")).is_none());
        assert!(highlighter.highlight("x", None).is_none());
        assert!(highlighter.highlight("x", Some("  ")).is_none());
    }
}
