use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{App, OverlayState};

impl App {
    pub(crate) fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Routes a key to whichever overlay is open.
    pub(crate) fn handle_overlay_key(&mut self, key: KeyEvent) {
        match self.overlay.as_mut() {
            Some(OverlayState::About) => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
                ) {
                    self.close_overlay();
                }
            }
            Some(OverlayState::QuickAsk(state)) => match key.code {
                KeyCode::Esc => self.close_overlay(),
                KeyCode::Tab | KeyCode::BackTab => state.field = state.field.next(),
                KeyCode::Enter => self.submit_quick_ask(),
                _ if state.is_sending() => {}
                KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => {}
                KeyCode::Char(ch) => state.active_input().insert_char(ch),
                KeyCode::Backspace => state.active_input().backspace(),
                KeyCode::Delete => state.active_input().delete(),
                KeyCode::Left => state.active_input().move_left(),
                KeyCode::Right => state.active_input().move_right(),
                KeyCode::Home => state.active_input().move_home(),
                KeyCode::End => state.active_input().move_end(),
                _ => {}
            },
            None => {}
        }
    }
}
