use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::state::{App, Screen};
use crate::definitions::ChatFocus;

impl App {
    /// The main entry point for handling keyboard events.
    ///
    /// This function acts as a router, dispatching the key event to the appropriate
    /// handler based on the application's current state.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Quitting works from anywhere, overlays included.
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
        {
            self.should_quit = true;
            return;
        }

        // Overlays capture all other input.
        if self.overlay.is_some() {
            self.handle_overlay_key(key);
            return;
        }

        if self.handle_global_shortcuts(key) {
            return;
        }

        match &self.screen {
            Screen::Selection(_) => self.handle_selection_key(key),
            Screen::Chat(view) if view.drawer.is_some() => self.handle_drawer_key(key),
            Screen::Chat(_) => self.handle_chat_key(key),
        }
    }

    /// Handles global keyboard shortcuts.
    /// Returns `true` if a shortcut was handled, `false` otherwise.
    fn handle_global_shortcuts(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            // Ctrl+K: Quick Ask
            (KeyCode::Char('k'), m) if m.contains(KeyModifiers::CONTROL) => self.open_quick_ask(),
            // F1: About
            (KeyCode::F(1), _) => self.open_about(),
            _ => return false,
        }
        true
    }

    /// Handles key events on the agent selection screen.
    fn handle_selection_key(&mut self, key: KeyEvent) {
        let Screen::Selection(selection) = &mut self.screen else {
            return;
        };
        match key.code {
            KeyCode::Left => selection.move_selection(-1),
            KeyCode::Right => selection.move_selection(1),
            KeyCode::Up => selection.move_rows(-1),
            KeyCode::Down => selection.move_rows(1),
            KeyCode::Tab => selection.cycle(1),
            KeyCode::BackTab => selection.cycle(-1),
            KeyCode::Enter => {
                let index = selection.selected;
                self.select_agent(index);
            }
            KeyCode::Char(ch @ '1'..='9') => {
                let index = (ch as usize) - ('1' as usize);
                if index < self.registry.len() {
                    self.select_agent(index);
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    /// Handles key events while the side drawer is open.
    fn handle_drawer_key(&mut self, key: KeyEvent) {
        let Screen::Chat(view) = &mut self.screen else {
            return;
        };
        let Some(drawer) = view.drawer.as_mut() else {
            return;
        };
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::F(2), _) => view.drawer = None,
            (KeyCode::Char('b'), m) if m.contains(KeyModifiers::CONTROL) => view.drawer = None,
            (KeyCode::Up, _) | (KeyCode::BackTab, _) => drawer.move_selection(-1),
            (KeyCode::Down, _) | (KeyCode::Tab, _) => drawer.move_selection(1),
            (KeyCode::Enter, _) => {
                let item = drawer.selected_item();
                self.activate_drawer_item(item);
            }
            _ => {}
        }
    }

    /// Handles key events on the chat screen.
    fn handle_chat_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('b'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.toggle_drawer();
                return;
            }
            (KeyCode::F(2), _) => {
                self.toggle_drawer();
                return;
            }
            (KeyCode::Esc, _) => {
                self.back_to_selection();
                return;
            }
            _ => {}
        }

        let Screen::Chat(view) = &mut self.screen else {
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                view.focus = view.focus.toggled();
                return;
            }
            KeyCode::PageUp => {
                view.scroll.page_up();
                return;
            }
            KeyCode::PageDown => {
                view.scroll.page_down();
                return;
            }
            _ => {}
        }

        match view.focus {
            ChatFocus::Transcript => match key.code {
                KeyCode::Up => view.scroll.scroll_by(-1),
                KeyCode::Down => view.scroll.scroll_by(1),
                KeyCode::Home => view.scroll.scroll_by(isize::MIN / 2),
                KeyCode::End => view.scroll.follow_tail(),
                KeyCode::Enter => view.focus = ChatFocus::Composer,
                _ => {}
            },
            ChatFocus::Composer => {
                // Disabled while a response is in flight.
                if !view.input_enabled() {
                    return;
                }
                let composer = &mut view.composer;
                match key.code {
                    KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => {}
                    KeyCode::Char(ch) => composer.insert_char(ch),
                    KeyCode::Backspace => composer.backspace(),
                    KeyCode::Delete => composer.delete(),
                    KeyCode::Left => composer.move_left(),
                    KeyCode::Right => composer.move_right(),
                    KeyCode::Home => composer.move_home(),
                    KeyCode::End => composer.move_end(),
                    KeyCode::Up => {
                        composer.history_previous();
                    }
                    KeyCode::Down => {
                        composer.history_next();
                    }
                    KeyCode::Enter => self.submit_chat(),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::agent::AgentRegistry;
    use crate::agent::providers::scripted::ScriptedClient;
    use crate::app::state::OverlayState;
    use crate::config::AppConfig;

    fn app() -> App {
        let client = ScriptedClient::new(&["Sure", "."]);
        let config = AppConfig::default();
        App::new(AgentRegistry::builtin(), Arc::new(client), &config)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, ch: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn chat_agent(app: &App) -> Option<&str> {
        match &app.screen {
            Screen::Chat(view) => Some(view.controller.agent().id.as_str()),
            Screen::Selection(_) => None,
        }
    }

    #[test]
    fn digits_and_arrows_pick_agents() {
        let mut app = app();
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(chat_agent(&app), Some("writer"));

        press(&mut app, KeyCode::Esc);
        assert_eq!(chat_agent(&app), None);

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert_eq!(chat_agent(&app), Some("translator"));
    }

    #[test]
    fn drawer_opens_and_closes() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        ctrl(&mut app, 'b');
        let Screen::Chat(view) = &app.screen else {
            panic!("expected chat");
        };
        assert!(view.drawer.is_some());

        // Keys go to the drawer, not the composer.
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Esc);
        let Screen::Chat(view) = &app.screen else {
            panic!("expected chat");
        };
        assert!(view.drawer.is_none());
        assert!(view.composer.is_empty());

        press(&mut app, KeyCode::F(2));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.overlay, Some(OverlayState::QuickAsk(_))));
    }

    #[tokio::test]
    async fn composer_is_disabled_while_loading() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Hello");
        press(&mut app, KeyCode::Enter);

        type_text(&mut app, "more");
        press(&mut app, KeyCode::Enter);
        let Screen::Chat(view) = &app.screen else {
            panic!("expected chat");
        };
        assert!(view.composer.is_empty());
        assert_eq!(view.controller.conversation().len(), 2);
    }

    #[test]
    fn quit_shortcuts() {
        let mut app = app();
        app.open_about();
        ctrl(&mut app, 'c');
        assert!(app.should_quit);

        let mut app = self::app();
        press(&mut app, KeyCode::Enter);
        ctrl(&mut app, 'q');
        assert!(app.should_quit);
    }

    #[test]
    fn quick_ask_fields_take_input() {
        let mut app = app();
        ctrl(&mut app, 'k');
        type_text(&mut app, "sk-1");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "2+2?");

        let Some(OverlayState::QuickAsk(state)) = &app.overlay else {
            panic!("expected quick ask");
        };
        assert_eq!(state.api_key.buffer(), "sk-1");
        assert_eq!(state.prompt.buffer(), "2+2?");

        press(&mut app, KeyCode::Esc);
        assert!(app.overlay.is_none());
    }
}
