use std::sync::Arc;

use log::debug;
use tokio::sync::Notify;

use super::state::{AgentSelection, App, Screen};
use crate::agent::{AgentRegistry, CompletionClient};
use crate::config::AppConfig;
use crate::definitions::HitAreas;
use crate::syntax::SyntaxHighlighter;

impl App {
    /// Creates the application on the agent selection screen.
    pub fn new(
        registry: AgentRegistry,
        client: Arc<dyn CompletionClient>,
        config: &AppConfig,
    ) -> Self {
        debug!(
            "Initializing App with {} agents, provider {} ({})",
            registry.len(),
            client.name(),
            client.model()
        );
        let status_message = if client.has_credentials() {
            String::from("Select an agent to start chatting")
        } else {
            format!(
                "{} is not set; chats are disabled (Quick Ask: Ctrl+K)",
                config.provider.api_key_env
            )
        };

        Self {
            should_quit: false,
            screen: Screen::Selection(AgentSelection::new(registry.len(), 0)),
            overlay: None,
            registry,
            status_message,
            hit_areas: HitAreas::default(),
            highlighter: SyntaxHighlighter::new(),
            tick_rate: config.ui.tick_rate(),
            frame: 0,
            wake: Arc::new(Notify::new()),
            client,
            provider: config.provider.clone(),
        }
    }

    /// The handle background requests signal when they have output to apply.
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }
}
