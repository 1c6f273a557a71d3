use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use super::state::{App, Screen};
use crate::definitions::{ChatFocus, contains};

// Implementation block for mouse event handling in the App.
impl App {
    /// The main entry point for handling mouse events.
    ///
    /// Hit-testing uses the regions recorded by the last render.
    pub fn handle_mouse(&mut self, event: MouseEvent) {
        if self.overlay.is_some() {
            return;
        }

        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.handle_mouse_down(event.column, event.row)
            }
            MouseEventKind::ScrollUp => self.handle_mouse_scroll(-3),
            MouseEventKind::ScrollDown => self.handle_mouse_scroll(3),
            _ => {}
        }
    }

    /// Handles left mouse button down events.
    fn handle_mouse_down(&mut self, column: u16, row: u16) {
        let hits = self.hit_areas.clone();
        match &mut self.screen {
            Screen::Selection(_) => {
                if let Some(index) = hits
                    .agent_cards
                    .iter()
                    .position(|card| contains(*card, column, row))
                {
                    self.select_agent(index);
                }
            }
            Screen::Chat(view) => {
                // An open drawer takes the click; anywhere outside it closes it.
                if view.drawer.is_some() {
                    if let Some((item, _)) = hits
                        .drawer_items
                        .iter()
                        .find(|(_, area)| contains(*area, column, row))
                    {
                        self.activate_drawer_item(*item);
                    } else if !hits.drawer.is_some_and(|area| contains(area, column, row)) {
                        view.drawer = None;
                    }
                    return;
                }

                if contains(hits.menu_button, column, row) {
                    self.toggle_drawer();
                } else if contains(hits.back_button, column, row) {
                    self.back_to_selection();
                } else if contains(hits.composer, column, row) {
                    view.focus = ChatFocus::Composer;
                } else if contains(hits.transcript, column, row) {
                    view.focus = ChatFocus::Transcript;
                }
            }
        }
    }

    /// Handles mouse scroll events.
    fn handle_mouse_scroll(&mut self, delta: isize) {
        if let Screen::Chat(view) = &mut self.screen {
            view.scroll.scroll_by(delta);
        }
    }
}
