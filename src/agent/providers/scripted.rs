//! 測試用的 `CompletionClient`：依腳本回傳片段，並記錄收到的請求。

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream;

use crate::agent::message::ChatRequest;

use super::{CompletionClient, CompletionError, FragmentStream};

/// 腳本在哪個階段失敗。
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// 開啟串流時就失敗（例如連不上服務）。
    OnOpen(CompletionError),
    /// 送出所有片段之後以錯誤結束。
    AfterFragments(CompletionError),
}

pub struct ScriptedClient {
    fragments: Vec<String>,
    reply: String,
    failure: Option<ScriptedFailure>,
    credentials: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            reply: fragments.concat(),
            failure: None,
            credentials: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, failure: ScriptedFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: ChatRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        self.record(request);
        match &self.failure {
            Some(ScriptedFailure::OnOpen(err)) | Some(ScriptedFailure::AfterFragments(err)) => {
                Err(err.clone())
            }
            None => Ok(self.reply.clone()),
        }
    }

    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, CompletionError> {
        self.record(request);
        let mut items: Vec<Result<String, CompletionError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        match &self.failure {
            Some(ScriptedFailure::OnOpen(err)) => return Err(err.clone()),
            Some(ScriptedFailure::AfterFragments(err)) => items.push(Err(err.clone())),
            None => {}
        }
        Ok(Box::pin(stream::iter(items)))
    }
}
