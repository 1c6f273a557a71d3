//! `providers` 模組負責與聊天補全服務通訊的具體實作。
//!
//! 所有後端都實作 `CompletionClient` trait，控制器只透過這個介面
//! 發出請求，不需要知道底層是 HTTP 還是測試用的腳本。

// --- 子模組宣告 ---

/// `http` 模組：OpenAI 相容的 `/chat/completions` HTTP 後端，支援 SSE 串流。
pub mod http;

/// `scripted` 模組：測試用的後端，依照預先寫好的片段回應。
#[cfg(test)]
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::agent::message::ChatRequest;

/// 串流回應的片段序列。每個項目是一段要附加到助理訊息的文字。
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// 補全請求可能遇到的錯誤。
///
/// 控制器不會依照種類顯示不同的訊息，這些細節只會寫進日誌。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// 尚未設定 API 金鑰，請求不會送出。
    #[error("no API key configured")]
    MissingApiKey,
    /// 連線層錯誤：DNS、TLS、連線中斷等。
    #[error("transport error: {0}")]
    Transport(String),
    /// 服務端回傳非成功狀態碼，或在串流中送出錯誤。
    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    /// 回應內容無法解析。
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Transport(err.to_string())
    }
}

/// 定義了所有補全後端都必須遵守的通用行為介面。
///
/// 後端以 `Arc<dyn CompletionClient>` 的形式在畫面與背景任務之間共享，
/// 因此需要 `Send + Sync`。
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 回傳此後端的名稱，用於 UI 顯示或日誌記錄。
    fn name(&self) -> &str;

    /// 使用的模型名稱。
    fn model(&self) -> &str;

    /// 是否持有可用的憑證。沒有憑證時控制器會直接拒絕送出。
    fn has_credentials(&self) -> bool;

    /// 送出單次請求並等待完整回應。
    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError>;

    /// 送出串流請求，回傳依到達順序產生片段的串流。
    ///
    /// 串流正常結束代表回應完成；串流中的 `Err` 代表中途失敗。
    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, CompletionError>;
}
