//! 單次提問視窗：使用臨時輸入的 API 金鑰送出一個問題，等待完整回應。

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::Notify;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::agent::{ChatRequest, CompletionClient, CompletionError};
use crate::definitions::QuickAskField;

use super::state::Composer;

/// 沒有輸入金鑰時顯示的提示。
pub const MISSING_KEY_MESSAGE: &str = "Please enter your OpenAI API key";

/// 請求失敗時顯示的提示。
pub const QUICK_ASK_FAILURE: &str =
    "An error occurred while processing your request. Please check your API key and try again.";

type PendingReply = oneshot::Receiver<Result<String, CompletionError>>;

pub struct QuickAskState {
    /// 只存在記憶體中，視窗關閉即丟棄。
    pub api_key: Composer,
    pub prompt: Composer,
    pub field: QuickAskField,
    pub response: Option<String>,
    pub error: Option<String>,
    pending: Option<PendingReply>,
    waker: Option<Arc<Notify>>,
}

impl Default for QuickAskState {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickAskState {
    pub fn new() -> Self {
        Self {
            api_key: Composer::new(),
            prompt: Composer::new(),
            field: QuickAskField::ApiKey,
            response: None,
            error: None,
            pending: None,
            waker: None,
        }
    }

    /// 回應抵達時通知 `waker`。
    pub fn with_waker(mut self, waker: Arc<Notify>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active_input(&mut self) -> &mut Composer {
        match self.field {
            QuickAskField::ApiKey => &mut self.api_key,
            QuickAskField::Prompt => &mut self.prompt,
        }
    }

    /// 檢查是否可以送出，回傳去除空白後的金鑰。
    ///
    /// 金鑰空白時設定錯誤訊息並回傳 `None`。
    pub fn ready_key(&mut self) -> Option<String> {
        if self.is_sending() {
            return None;
        }
        let key = self.api_key.buffer().trim().to_string();
        if key.is_empty() {
            self.error = Some(MISSING_KEY_MESSAGE.to_string());
            return None;
        }
        if self.prompt.buffer().trim().is_empty() {
            self.field = QuickAskField::Prompt;
            return None;
        }
        Some(key)
    }

    /// 在背景任務中送出目前的問題。
    pub fn send(&mut self, client: Arc<dyn CompletionClient>) {
        let prompt = self.prompt.buffer().to_string();
        self.error = None;
        self.response = None;

        let (tx, rx) = oneshot::channel();
        info!(
            "Quick Ask request via {} ({})",
            client.name(),
            client.model()
        );
        let waker = self.waker.clone();
        tokio::spawn(async move {
            let result = client.complete(ChatRequest::single(prompt)).await;
            if tx.send(result).is_ok()
                && let Some(waker) = waker
            {
                waker.notify_one();
            }
        });
        self.pending = Some(rx);
    }

    /// 檢查背景任務是否完成。狀態有變化時回傳 `true`。
    pub fn poll(&mut self) -> bool {
        let Some(rx) = self.pending.as_mut() else {
            return false;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => {
                Err(CompletionError::Transport("request task ended".into()))
            }
        };
        self.pending = None;

        match outcome {
            Ok(text) => self.response = Some(text),
            Err(err) => {
                warn!("Quick Ask failed: {err:?}");
                self.error = Some(QUICK_ASK_FAILURE.to_string());
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::providers::scripted::{ScriptedClient, ScriptedFailure};

    fn filled(key: &str, prompt: &str) -> QuickAskState {
        let mut state = QuickAskState::new();
        for ch in key.chars() {
            state.api_key.insert_char(ch);
        }
        for ch in prompt.chars() {
            state.prompt.insert_char(ch);
        }
        state
    }

    async fn wait(state: &mut QuickAskState) {
        while !state.poll() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn blank_key_is_reported_inline() {
        let mut state = filled("  ", "What is Rust?");
        assert!(state.ready_key().is_none());
        assert_eq!(state.error.as_deref(), Some(MISSING_KEY_MESSAGE));
        assert!(!state.is_sending());
    }

    #[test]
    fn blank_prompt_moves_focus_to_prompt() {
        let mut state = filled("sk-1", "");
        assert!(state.ready_key().is_none());
        assert_eq!(state.field, QuickAskField::Prompt);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn response_is_shown_after_completion() {
        let client = Arc::new(ScriptedClient::new(&["Ownership ", "and borrowing."]));
        let mut state = filled(" sk-1 ", "What is Rust?");

        assert_eq!(state.ready_key().as_deref(), Some("sk-1"));
        state.send(client.clone());
        assert!(state.is_sending());
        wait(&mut state).await;

        assert_eq!(state.response.as_deref(), Some("Ownership and borrowing."));
        assert!(state.error.is_none());
        assert!(!state.is_sending());

        let requests = client.requests();
        assert_eq!(requests, vec![ChatRequest::single("What is Rust?")]);
    }

    #[tokio::test]
    async fn failure_shows_fixed_message() {
        let client = Arc::new(ScriptedClient::new(&[]).failing(ScriptedFailure::OnOpen(
            CompletionError::Provider {
                status: 401,
                body: "invalid key".into(),
            },
        )));
        let mut state = filled("sk-bad", "hello");

        state.send(client);
        wait(&mut state).await;

        assert_eq!(state.error.as_deref(), Some(QUICK_ASK_FAILURE));
        assert!(state.response.is_none());
    }

    #[tokio::test]
    async fn reply_wakes_the_event_loop() {
        let waker = Arc::new(Notify::new());
        let mut state = filled("sk-1", "hello").with_waker(Arc::clone(&waker));

        state.send(Arc::new(ScriptedClient::new(&["hi"])));
        tokio::time::timeout(std::time::Duration::from_secs(5), waker.notified())
            .await
            .expect("reply should wake the loop");

        assert!(state.poll());
        assert_eq!(state.response.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn no_second_request_while_sending() {
        let client = Arc::new(ScriptedClient::new(&["ok"]));
        let mut state = filled("sk-1", "hello");

        state.send(client.clone());
        assert!(state.ready_key().is_none());
        wait(&mut state).await;
        assert_eq!(client.call_count(), 1);
    }
}
