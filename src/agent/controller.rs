use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::agent::message::ChatRequest;
use crate::agent::providers::{CompletionClient, CompletionError};
use crate::agent::registry::AgentDescriptor;
use crate::agent::session::{Conversation, StreamingSession};

/// The assistant text shown when a streamed response fails for any reason.
pub const FAILURE_NOTICE: &str = "An error occurred. Please try again.";

/// Events produced by the background streaming task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of assistant text, in arrival order.
    Fragment(String),
    /// The provider closed the stream normally.
    Completed,
    /// The request could not be issued or the stream broke off.
    Failed(CompletionError),
}

/// A `StreamEvent` tagged with the submission that produced it.
#[derive(Debug)]
pub struct SessionEvent {
    session: u64,
    event: StreamEvent,
}

/// Reasons a submission is refused. A refused submission changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyInput,
    #[error("a response is still in progress")]
    Busy,
    #[error("no API key configured")]
    MissingCredential,
}

/// What changed after applying stream events, so the view can react.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControllerUpdate {
    /// The conversation content changed; the view should scroll to the newest entry.
    pub conversation_changed: bool,
    /// The in-flight response completed or failed; the composer should regain focus.
    pub response_finished: bool,
    /// The in-flight response ended with the failure notice.
    pub response_failed: bool,
}

impl ControllerUpdate {
    fn merge(&mut self, other: ControllerUpdate) {
        self.conversation_changed |= other.conversation_changed;
        self.response_finished |= other.response_finished;
        self.response_failed |= other.response_failed;
    }

    pub fn is_empty(&self) -> bool {
        !self.conversation_changed && !self.response_finished
    }
}

/// Drives one chat with one agent persona.
///
/// `ChatController` is responsible for:
/// - Owning the `Conversation` and the `StreamingSession` flags.
/// - Issuing each submission on a spawned task through the shared `CompletionClient`.
/// - Applying the resulting fragments, in order, to the assistant placeholder.
///
/// All mutation happens on the caller's thread through `apply`/`poll`. The
/// spawned task only sends events; dropping the controller drops the receiver,
/// after which the task stops at its next send.
pub struct ChatController {
    agent: AgentDescriptor,
    client: Arc<dyn CompletionClient>,
    conversation: Conversation,
    session: StreamingSession,
    /// Incremented for every accepted submission. Events tagged with an older id are ignored.
    session_id: u64,
    fragments_applied: usize,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    /// Notified after every event the streaming task sends.
    waker: Option<Arc<Notify>>,
}

impl ChatController {
    pub fn new(agent: AgentDescriptor, client: Arc<dyn CompletionClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            agent,
            client,
            conversation: Conversation::default(),
            session: StreamingSession::default(),
            session_id: 0,
            fragments_applied: 0,
            events_tx: tx,
            events_rx: rx,
            waker: None,
        }
    }

    /// Wakes `waker` whenever an event is ready for `poll`.
    pub fn with_waker(mut self, waker: Arc<Notify>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn agent(&self) -> &AgentDescriptor {
        &self.agent
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn session(&self) -> StreamingSession {
        self.session
    }

    /// Submits `input` as the next user message.
    ///
    /// On success the user message and an empty assistant placeholder have
    /// been appended, the session is loading, and the request is in flight.
    /// The caller is expected to clear its input box.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, input: &str) -> Result<(), SubmitError> {
        if self.session.is_loading {
            return Err(SubmitError::Busy);
        }
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if !self.client.has_credentials() {
            warn!(
                "Refusing to submit to {}: no credentials configured",
                self.client.name()
            );
            return Err(SubmitError::MissingCredential);
        }

        self.conversation.push_user(input);
        self.session.begin();
        self.session_id += 1;
        self.fragments_applied = 0;

        let request =
            ChatRequest::with_system(&self.agent.system_prompt, self.conversation.messages());
        info!(
            "Submitting to {} as {} ({} messages, session {})",
            self.client.name(),
            self.agent.id,
            request.messages.len(),
            self.session_id
        );
        spawn_stream(
            Arc::clone(&self.client),
            request,
            self.session_id,
            self.events_tx.clone(),
            self.waker.clone(),
        );

        self.conversation.push_assistant_placeholder();
        Ok(())
    }

    /// Applies one event from the streaming task.
    pub fn apply(&mut self, event: SessionEvent) -> ControllerUpdate {
        let mut update = ControllerUpdate::default();
        if event.session != self.session_id || !self.session.is_loading {
            debug!(
                "Ignoring stale event for session {} (current {})",
                event.session, self.session_id
            );
            return update;
        }

        match event.event {
            StreamEvent::Fragment(text) => {
                if self.session.mark_streaming() {
                    debug!("First fragment received for session {}", self.session_id);
                }
                self.conversation.append_to_last_assistant(&text);
                self.fragments_applied += 1;
                update.conversation_changed = true;
            }
            StreamEvent::Completed => {
                info!(
                    "Response complete for session {} ({} fragments)",
                    self.session_id, self.fragments_applied
                );
                self.session.finish();
                update.response_finished = true;
            }
            StreamEvent::Failed(err) => {
                let discarded = self.conversation.fail_last_assistant(FAILURE_NOTICE);
                warn!(
                    "Response failed for session {}: {:?} (discarded {} chars of partial content)",
                    self.session_id,
                    err,
                    discarded.map(|text| text.chars().count()).unwrap_or(0)
                );
                self.session.finish();
                update.conversation_changed = true;
                update.response_finished = true;
                update.response_failed = true;
            }
        }
        update
    }

    /// Drains every pending event without blocking.
    pub fn poll(&mut self) -> ControllerUpdate {
        let mut update = ControllerUpdate::default();
        while let Ok(event) = self.events_rx.try_recv() {
            update.merge(self.apply(event));
        }
        update
    }

    /// Waits for the next event and applies it.
    pub async fn next_update(&mut self) -> ControllerUpdate {
        match self.events_rx.recv().await {
            Some(event) => self.apply(event),
            None => ControllerUpdate::default(),
        }
    }
}

fn spawn_stream(
    client: Arc<dyn CompletionClient>,
    request: ChatRequest,
    session: u64,
    tx: UnboundedSender<SessionEvent>,
    waker: Option<Arc<Notify>>,
) {
    tokio::spawn(async move {
        let send = |event: StreamEvent| {
            let sent = tx.send(SessionEvent { session, event }).is_ok();
            if sent && let Some(waker) = &waker {
                waker.notify_one();
            }
            sent
        };

        let mut fragments = match client.stream(request).await {
            Ok(stream) => stream,
            Err(err) => {
                send(StreamEvent::Failed(err));
                return;
            }
        };

        while let Some(item) = fragments.next().await {
            let event = match item {
                Ok(text) => StreamEvent::Fragment(text),
                Err(err) => {
                    send(StreamEvent::Failed(err));
                    return;
                }
            };
            if !send(event) {
                debug!("Chat view closed, abandoning stream for session {session}");
                return;
            }
        }
        send(StreamEvent::Completed);
    });
}
