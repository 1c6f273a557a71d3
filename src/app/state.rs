//! Defines the core state structures for the application.
//!
//! This module contains the central `App` struct that holds the entire state
//! of the TUI application, the two screens (agent selection and chat), and the
//! reusable `Composer` text input.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::agent::{AgentRegistry, ChatController, CompletionClient};
use crate::config::ProviderConfig;
use crate::definitions::{ChatFocus, DrawerItem, HitAreas};
use crate::syntax::SyntaxHighlighter;

use super::quick_ask::QuickAskState;

/// The main application state.
///
/// This struct holds all the data required to render the UI and manage user
/// interactions. It is the single source of truth for the application's state.
pub struct App {
    // --- Core State ---
    /// Flag to indicate if the application should quit.
    pub should_quit: bool,
    /// The screen currently shown below the navbar.
    pub screen: Screen,
    /// The currently active overlay, if any.
    pub overlay: Option<OverlayState>,
    /// Every persona the user can pick.
    pub registry: AgentRegistry,

    // --- UI & Layout ---
    /// The message currently displayed in the footer.
    pub status_message: String,
    /// Clickable regions recorded by the last render.
    pub hit_areas: HitAreas,
    /// Shared syntect state for code blocks.
    pub(crate) highlighter: SyntaxHighlighter,

    // --- Internal State & Flags ---
    /// The configured tick rate for the application.
    pub(crate) tick_rate: Duration,
    /// Advances every tick; drives the loading animation.
    pub(crate) frame: usize,
    /// Signalled by background requests whenever they produce output.
    pub(crate) wake: Arc<Notify>,

    // --- Provider ---
    /// The completion client shared by every chat.
    pub(crate) client: Arc<dyn CompletionClient>,
    /// Connection settings, reused when Quick Ask builds its own client.
    pub(crate) provider: ProviderConfig,
}

/// The two top-level screens.
pub enum Screen {
    Selection(AgentSelection),
    Chat(Box<ChatView>),
}

/// State for the agent selection grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSelection {
    /// The index of the highlighted agent.
    pub selected: usize,
    /// Number of cards per row in the last render.
    pub columns: usize,
    len: usize,
}

impl AgentSelection {
    pub fn new(len: usize, selected: usize) -> Self {
        Self {
            selected: selected.min(len.saturating_sub(1)),
            columns: 1,
            len,
        }
    }

    /// Moves the highlight by `delta` cards, clamped to the grid.
    pub fn move_selection(&mut self, delta: isize) {
        if self.len == 0 {
            self.selected = 0;
            return;
        }
        let len = self.len as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    /// Moves the highlight up or down by whole rows.
    pub fn move_rows(&mut self, rows: isize) {
        let target = self.selected as isize + rows * self.columns.max(1) as isize;
        if target >= 0 && target < self.len as isize {
            self.selected = target as usize;
        }
    }

    /// Moves forward, wrapping to the first card after the last.
    pub fn cycle(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let len = self.len as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }
}

/// Everything owned by one chat with one agent. Dropped on "back".
pub struct ChatView {
    /// The conversation and its streaming state.
    pub controller: ChatController,
    /// The message input box.
    pub composer: Composer,
    /// Which part of the screen receives keys when the drawer is closed.
    pub focus: ChatFocus,
    /// The side drawer, when open.
    pub drawer: Option<DrawerState>,
    /// Scroll position of the transcript.
    pub scroll: TranscriptScroll,
    /// Inline error shown under the composer.
    pub notice: Option<String>,
}

impl ChatView {
    pub fn new(controller: ChatController) -> Self {
        Self {
            controller,
            composer: Composer::new(),
            focus: ChatFocus::Composer,
            drawer: None,
            scroll: TranscriptScroll::default(),
            notice: None,
        }
    }

    /// The composer accepts input only when no response is in flight.
    pub fn input_enabled(&self) -> bool {
        !self.controller.session().is_loading
    }
}

/// State for the side drawer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawerState {
    pub selected: usize,
}

impl DrawerState {
    /// Moves the highlight, wrapping around the item list.
    pub fn move_selection(&mut self, delta: isize) {
        let len = DrawerItem::ALL.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }

    pub fn selected_item(&self) -> DrawerItem {
        DrawerItem::ALL[self.selected.min(DrawerItem::ALL.len() - 1)]
    }
}

/// Scroll position of the transcript, in wrapped lines.
///
/// While `follow` is set the view sticks to the newest line. Manual scrolling
/// clears it until the bottom is reached again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptScroll {
    pub offset: usize,
    pub follow: bool,
    max_offset: usize,
    page: usize,
}

impl Default for TranscriptScroll {
    fn default() -> Self {
        Self {
            offset: 0,
            follow: true,
            max_offset: 0,
            page: 1,
        }
    }
}

impl TranscriptScroll {
    pub fn follow_tail(&mut self) {
        self.follow = true;
        self.offset = self.max_offset;
    }

    /// Records the content and viewport height of the latest render.
    pub fn sync(&mut self, total_lines: usize, viewport: usize) {
        self.max_offset = total_lines.saturating_sub(viewport);
        self.page = viewport.max(1);
        if self.follow {
            self.offset = self.max_offset;
        } else {
            self.offset = self.offset.min(self.max_offset);
        }
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let next = (self.offset as isize + delta).clamp(0, self.max_offset as isize) as usize;
        self.offset = next;
        self.follow = next >= self.max_offset;
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(self.page_step() as isize));
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.page_step() as isize);
    }

    fn page_step(&self) -> usize {
        (self.page / 2).max(1)
    }
}

/// Represents the state of any active overlay panel.
///
/// Overlays appear on top of the current screen and capture all input.
pub enum OverlayState {
    QuickAsk(QuickAskState),
    About,
}

/// State for a single-line text input.
///
/// Manages the text buffer, cursor position, and submission history.
#[derive(Clone, Default)]
pub struct Composer {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Inserts a character at the current cursor position.
    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' || ch == '\r' {
            return;
        }
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.reset_history_navigation();
    }

    /// Deletes the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.buffer.drain(idx..self.cursor);
            self.cursor = idx;
            self.reset_history_navigation();
        }
    }

    /// Deletes the character at the cursor (delete).
    pub fn delete(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            let end = self.cursor + ch.len_utf8();
            self.buffer.drain(self.cursor..end);
            self.reset_history_navigation();
        }
    }

    /// Moves the cursor one character to the left.
    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    /// Moves the cursor one character to the right.
    pub fn move_right(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    /// Takes the content of the buffer, adds it to history, and clears the buffer.
    pub fn take(&mut self) -> String {
        let content = std::mem::take(&mut self.buffer);
        if !content.trim().is_empty() {
            self.history.push(content.clone());
        }
        self.cursor = 0;
        self.reset_history_navigation();
        content
    }

    /// Navigates to the previous entry in the submission history.
    pub fn history_previous(&mut self) -> bool {
        if self.history.is_empty() {
            return false;
        }
        let target = match self.history_index {
            Some(idx) => idx.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.load_history(target)
    }

    /// Navigates to the next entry in the submission history.
    pub fn history_next(&mut self) -> bool {
        match self.history_index {
            Some(idx) if idx + 1 < self.history.len() => self.load_history(idx + 1),
            Some(_) => {
                self.history_index = None;
                self.buffer.clear();
                self.cursor = 0;
                true
            }
            None => false,
        }
    }

    fn load_history(&mut self, index: usize) -> bool {
        if let Some(entry) = self.history.get(index).cloned() {
            self.buffer = entry;
            self.cursor = self.buffer.len();
            self.history_index = Some(index);
            true
        } else {
            false
        }
    }

    fn reset_history_navigation(&mut self) {
        self.history_index = None;
    }

    /// Calculates the (col, row) position of the cursor when the buffer is
    /// wrapped to `width` columns.
    pub fn cursor_display_position(&self, width: usize) -> (u16, u16) {
        if width == 0 {
            return (0, 0);
        }
        let mut col = 0usize;
        let mut row = 0usize;
        for ch in self.buffer[..self.cursor].chars() {
            let char_width = unicode_width::UnicodeWidthChar::width(ch)
                .unwrap_or(1)
                .max(1);
            if col + char_width > width {
                row += 1;
                col = 0;
            }
            col += char_width;
            if col >= width {
                row += 1;
                col = 0;
            }
        }
        (col as u16, row as u16)
    }
}
