use super::state::{App, OverlayState, Screen};

// Implementation block for tick-related logic in the App.
impl App {
    /// This function is called on every "tick" of the application loop.
    ///
    /// It advances the loading animation and picks up anything the background
    /// requests produced that a wake-up did not already apply.
    pub(crate) fn on_tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.drain_responses();
    }

    /// Applies stream fragments for the open chat and the Quick Ask reply.
    pub(crate) fn drain_responses(&mut self) {
        if let Screen::Chat(view) = &mut self.screen {
            let update = view.controller.poll();
            if !update.is_empty() {
                self.apply_chat_update(update);
            }
        }

        if let Some(OverlayState::QuickAsk(state)) = self.overlay.as_mut()
            && state.poll()
        {
            self.status_message = match &state.error {
                Some(_) => String::from("Quick Ask failed"),
                None => String::from("Quick Ask response received"),
            };
        }
    }
}
