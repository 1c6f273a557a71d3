//! OpenAI 相容 chat-completions 端點的請求與回應結構。

#[derive(serde::Serialize)]
pub struct OpenAiMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(serde::Serialize)]
pub struct OpenAiChatPayload<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAiMessage<'a>>,
    pub stream: bool,
}

// --- 非串流回應 ---

#[derive(serde::Deserialize)]
pub struct OpenAiChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiChatChoice>,
}

#[derive(serde::Deserialize)]
pub struct OpenAiChatChoice {
    pub message: OpenAiChatMessage,
}

#[derive(serde::Deserialize)]
pub struct OpenAiChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// --- 串流回應 (SSE chunk) ---

#[derive(serde::Deserialize)]
pub struct OpenAiStreamChunk {
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    pub error: Option<OpenAiErrorBody>,
}

#[derive(serde::Deserialize)]
pub struct OpenAiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiDelta,
}

#[derive(serde::Deserialize, Default)]
pub struct OpenAiDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct OpenAiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}
