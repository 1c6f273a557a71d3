//! 代理對話的核心：人設清單、訊息結構、對話狀態與串流控制器。
//!
//! 畫面層只透過這裡匯出的型別操作對話，不直接接觸 HTTP 細節。

// --- 子模組宣告 ---

/// `controller` 模組：`ChatController`，負責送出請求並把串流片段依序附加到對話。
pub mod controller;

/// `message` 模組：`ChatMessage`、`ChatRole` 與送給後端的 `ChatRequest`。
pub mod message;

/// `providers` 模組：`CompletionClient` trait 與各種後端實作。
pub mod providers;

/// `registry` 模組：可供選擇的代理人設清單。
pub mod registry;

/// `session` 模組：對話訊息列表與串流狀態旗標。
pub mod session;

// --- 公共 API 重新導出 ---

pub use controller::{ChatController, ControllerUpdate, FAILURE_NOTICE, SubmitError};
pub use message::{ChatMessage, ChatRequest, ChatRole};
pub use providers::{CompletionClient, CompletionError};
pub use registry::{AgentDescriptor, AgentIcon, AgentRegistry};
pub use session::{Conversation, StreamingSession};
