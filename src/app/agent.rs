use std::sync::Arc;

use log::{debug, info};

use super::quick_ask::QuickAskState;
use super::state::{AgentSelection, App, ChatView, DrawerState, OverlayState, Screen};
use crate::agent::providers::http::OpenAiClient;
use crate::agent::{ChatController, CompletionClient, ControllerUpdate, SubmitError};
use crate::definitions::{ChatFocus, DrawerItem};

impl App {
    /// Opens a fresh chat with the agent at `index`.
    pub(crate) fn select_agent(&mut self, index: usize) {
        let Some(agent) = self.registry.get(index).cloned() else {
            return;
        };
        info!("Starting chat with {} ({})", agent.display_name, agent.id);
        self.status_message = format!("Chatting with {}", agent.display_name);
        let controller =
            ChatController::new(agent, Arc::clone(&self.client)).with_waker(self.waker());
        self.screen = Screen::Chat(Box::new(ChatView::new(controller)));
    }

    /// Leaves the chat. The conversation is discarded with the view.
    pub(crate) fn back_to_selection(&mut self) {
        let selected = match &self.screen {
            Screen::Chat(view) => self
                .registry
                .position(&view.controller.agent().id)
                .unwrap_or(0),
            Screen::Selection(_) => return,
        };
        debug!("Returning to agent selection");
        self.screen = Screen::Selection(AgentSelection::new(self.registry.len(), selected));
        self.status_message = String::from("Select an agent to start chatting");
    }

    /// Submits the composer content of the active chat.
    pub(crate) fn submit_chat(&mut self) {
        let Screen::Chat(view) = &mut self.screen else {
            return;
        };
        match view.controller.submit(view.composer.buffer()) {
            Ok(()) => {
                view.composer.take();
                view.notice = None;
                view.scroll.follow_tail();
                self.status_message =
                    format!("Waiting for {}...", view.controller.agent().display_name);
            }
            Err(SubmitError::MissingCredential) => {
                view.notice = Some(format!(
                    "No API key: set {} before chatting, or use Quick Ask (Ctrl+K)",
                    self.provider.api_key_env
                ));
            }
            Err(SubmitError::EmptyInput) | Err(SubmitError::Busy) => {}
        }
    }

    /// Reacts to what the controller reported after applying stream events.
    pub(crate) fn apply_chat_update(&mut self, update: ControllerUpdate) {
        let Screen::Chat(view) = &mut self.screen else {
            return;
        };
        if update.conversation_changed {
            view.scroll.follow_tail();
        }
        if update.response_finished {
            view.focus = ChatFocus::Composer;
            let name = &view.controller.agent().display_name;
            self.status_message = if update.response_failed {
                format!("{name} could not respond")
            } else {
                format!("{name} replied")
            };
        }
    }

    pub(crate) fn toggle_drawer(&mut self) {
        if let Screen::Chat(view) = &mut self.screen {
            view.drawer = match view.drawer {
                Some(_) => None,
                None => Some(DrawerState::default()),
            };
        }
    }

    pub(crate) fn close_drawer(&mut self) {
        if let Screen::Chat(view) = &mut self.screen {
            view.drawer = None;
        }
    }

    pub(crate) fn activate_drawer_item(&mut self, item: DrawerItem) {
        self.close_drawer();
        match item {
            DrawerItem::ChangeAgent => self.back_to_selection(),
            DrawerItem::QuickAsk => self.open_quick_ask(),
            DrawerItem::About => self.open_about(),
        }
    }

    pub(crate) fn open_quick_ask(&mut self) {
        let state = QuickAskState::new().with_waker(self.waker());
        self.overlay = Some(OverlayState::QuickAsk(state));
    }

    pub(crate) fn open_about(&mut self) {
        self.overlay = Some(OverlayState::About);
    }

    /// Sends the Quick Ask prompt with a client built from the typed key.
    pub(crate) fn submit_quick_ask(&mut self) {
        let Some(OverlayState::QuickAsk(state)) = self.overlay.as_mut() else {
            return;
        };
        let Some(key) = state.ready_key() else {
            return;
        };
        let client: Arc<dyn CompletionClient> =
            Arc::new(OpenAiClient::new(&self.provider, Some(key)));
        state.send(client);
    }
}
