use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::agent::message::ChatRequest;
use crate::config::ProviderConfig;

use super::{CompletionClient, CompletionError, FragmentStream};

mod models;
mod sse;

use sse::{SseFrame, SseParser};

/// 非串流回應沒有內容時顯示的文字。
pub const EMPTY_RESPONSE_TEXT: &str = "No response";

/// `CompletionClient` 的 HTTP 實作，對應 OpenAI 相容的 `/chat/completions` 端點。
pub struct OpenAiClient {
    /// 後端設定資訊。
    info: HttpClientInfo,
    /// `reqwest` 的非同步 HTTP 客戶端，內部為 `Arc`，複製成本很低。
    client: Client,
}

#[derive(Clone)]
struct HttpClientInfo {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    headers: BTreeMap<String, String>,
}

impl OpenAiClient {
    /// 根據提供者設定與（可能不存在的）金鑰建立客戶端。
    ///
    /// 金鑰缺少時仍會建立成功，只是 `has_credentials` 會回傳 `false`，
    /// 讓畫面可以在送出前提示使用者。
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Self {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Self {
            info: HttpClientInfo {
                endpoint,
                model: config.model.clone(),
                api_key: api_key.filter(|key| !key.trim().is_empty()),
                headers: config.extra_headers.clone(),
            },
            client: Client::new(),
        }
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<Response, CompletionError> {
        use models::{OpenAiChatPayload, OpenAiMessage};

        let api_key = self
            .info
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;
        let headers = build_headers(api_key, &self.info.headers)?;

        let payload = OpenAiChatPayload {
            model: &self.info.model,
            messages: request
                .messages
                .iter()
                .map(|message| OpenAiMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream,
        };

        debug!(
            "POST {} (model {}, {} messages, stream={})",
            self.info.endpoint,
            self.info.model,
            payload.messages.len(),
            stream
        );
        let response = self
            .client
            .post(&self.info.endpoint)
            .headers(headers)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.info.model
    }

    fn has_credentials(&self) -> bool {
        self.info.api_key.is_some()
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, CompletionError> {
        let response = self.post(&request, false).await?;
        let body = response.text().await?;
        parse_completion(&body)
    }

    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, CompletionError> {
        let response = self.post(&request, true).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(CompletionError::from)
            });
        Ok(fragment_stream(body, status))
    }
}

/// 根據金鑰與額外設定建構 HTTP 標頭。
fn build_headers(
    api_key: &str,
    extra: &BTreeMap<String, String>,
) -> Result<HeaderMap, CompletionError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|err| CompletionError::Transport(format!("invalid API key header: {err}")))?;
    headers.insert(AUTHORIZATION, bearer);
    for (key, value) in extra {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| CompletionError::Transport(format!("invalid header {key}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| CompletionError::Transport(format!("invalid header {key}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// 解析非串流回應，取出 `choices[0].message.content`。
fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let data: models::OpenAiChatResponse = serde_json::from_str(body)
        .map_err(|err| CompletionError::Malformed(err.to_string()))?;
    let content = data
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| EMPTY_RESPONSE_TEXT.to_string());
    Ok(content)
}

struct SseState<S> {
    body: Pin<Box<S>>,
    parser: SseParser,
    pending: VecDeque<Result<String, CompletionError>>,
    status: u16,
    finished: bool,
}

impl<S> SseState<S> {
    fn queue(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            if self.finished {
                break;
            }
            match frame {
                SseFrame::Delta(text) => self.pending.push_back(Ok(text)),
                SseFrame::Done => self.finished = true,
                SseFrame::Error(body) => {
                    self.pending.push_back(Err(CompletionError::Provider {
                        status: self.status,
                        body,
                    }));
                    self.finished = true;
                }
                SseFrame::Malformed(detail) => {
                    self.pending
                        .push_back(Err(CompletionError::Malformed(detail)));
                    self.finished = true;
                }
            }
        }
    }
}

/// 將原始 SSE 位元組串流轉為片段串流。
///
/// `[DONE]` 之後的資料會被忽略；錯誤 frame 或傳輸錯誤會產生一個 `Err` 後結束。
fn fragment_stream<S>(body: S, status: u16) -> FragmentStream
where
    S: Stream<Item = Result<Vec<u8>, CompletionError>> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        parser: SseParser::default(),
        pending: VecDeque::new(),
        status,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.parser.feed(&chunk);
                    state.queue(frames);
                }
                Some(Err(err)) => {
                    state.pending.push_back(Err(err));
                    state.finished = true;
                }
                None => {
                    let rest = state.parser.finish();
                    state.queue(rest.into_iter().collect());
                    state.finished = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, CompletionError>> {
        parts
            .iter()
            .map(|part| Ok(part.as_bytes().to_vec()))
            .collect()
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<String, CompletionError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn stream_yields_fragments_in_order() {
        let body = stream::iter(chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n\ndata: [DONE]\n\n",
        ]));

        let items = collect(fragment_stream(body, 200)).await;
        let texts: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hi", " there", "!"]);
    }

    #[tokio::test]
    async fn data_after_done_is_ignored() {
        let body = stream::iter(chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ]));

        let items = collect(fragment_stream(body, 200)).await;
        assert_eq!(items, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let body = stream::iter(vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n".to_vec()),
            Err(CompletionError::Transport("connection reset".into())),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"tial\"}}]}\n\n".to_vec()),
        ]);

        let items = collect(fragment_stream(body, 200)).await;
        assert_eq!(
            items,
            vec![
                Ok("par".to_string()),
                Err(CompletionError::Transport("connection reset".into())),
            ]
        );
    }

    #[tokio::test]
    async fn provider_error_frame_becomes_failure() {
        let body = stream::iter(chunks(&["data: {\"error\":{\"message\":\"overloaded\"}}\n\n"]));

        let items = collect(fragment_stream(body, 200)).await;
        assert_eq!(
            items,
            vec![Err(CompletionError::Provider {
                status: 200,
                body: "overloaded".into(),
            })]
        );
    }

    #[tokio::test]
    async fn stream_closed_without_done_still_completes() {
        let body = stream::iter(chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}",
        ]));

        let items = collect(fragment_stream(body, 200)).await;
        assert_eq!(items, vec![Ok("end".to_string())]);
    }

    #[test]
    fn completion_content_or_placeholder() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Paris.");

        let empty = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_completion(empty).unwrap(), EMPTY_RESPONSE_TEXT);

        let no_choices = r#"{"choices":[]}"#;
        assert_eq!(parse_completion(no_choices).unwrap(), EMPTY_RESPONSE_TEXT);

        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(CompletionError::Malformed(_))
        ));
    }

    #[test]
    fn headers_carry_bearer_and_extras() {
        let mut extra = BTreeMap::new();
        extra.insert("OpenAI-Organization".to_string(), "org-123".to_string());
        let headers = build_headers("sk-test", &extra).unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer sk-test");
        assert_eq!(headers.get("openai-organization").unwrap(), "org-123");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..ProviderConfig::default()
        };
        let client = OpenAiClient::new(&config, Some("   ".into()));

        assert!(!client.has_credentials());
        let err = client
            .complete(ChatRequest::single("hello"))
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::MissingApiKey);
    }

    /// 在本機埠口接受一次連線，讀完請求後回傳固定的回應。
    ///
    /// 回傳伺服器位址，以及收到的原始請求文字。
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn client_for(base_url: &str) -> OpenAiClient {
        let config = ProviderConfig {
            base_url: base_url.to_string(),
            ..ProviderConfig::default()
        };
        OpenAiClient::new(&config, Some("sk-local".into()))
    }

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn streams_fragments_from_a_live_server() {
        let (base_url, server) = serve_once("200 OK", "text/event-stream", SSE_BODY).await;
        let client = client_for(&base_url);

        let stream = client.stream(ChatRequest::single("Hello")).await.unwrap();
        let items = collect(stream).await;
        let texts: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["Hi", " there", "!"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions HTTP/1.1"));
        let lowered = request.to_ascii_lowercase();
        assert!(lowered.contains("authorization: bearer sk-local"));
        assert!(request.contains("\"stream\":true"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_provider_error() {
        let (base_url, server) = serve_once(
            "401 Unauthorized",
            "application/json",
            r#"{"error":{"message":"invalid key"}}"#,
        )
        .await;
        let client = client_for(&base_url);

        let err = match client.stream(ChatRequest::single("Hello")).await {
            Ok(_) => panic!("a 401 response must not open a stream"),
            Err(err) => err,
        };
        assert_eq!(
            err,
            CompletionError::Provider {
                status: 401,
                body: r#"{"error":{"message":"invalid key"}}"#.into(),
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn complete_reads_a_live_response() {
        let (base_url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#,
        )
        .await;
        let client = client_for(&base_url);

        let text = client
            .complete(ChatRequest::single("Capital of France?"))
            .await
            .unwrap();
        assert_eq!(text, "Paris.");
        assert!(server.await.unwrap().contains("\"stream\":false"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = client_for("http://127.0.0.1:9");

        let stream_err = match client.stream(ChatRequest::single("Hello")).await {
            Ok(_) => panic!("nothing listens on the discard port"),
            Err(err) => err,
        };
        assert!(matches!(stream_err, CompletionError::Transport(_)));

        let complete_err = client
            .complete(ChatRequest::single("Hello"))
            .await
            .unwrap_err();
        assert!(matches!(complete_err, CompletionError::Transport(_)));
    }

    mod controller {
        use std::sync::Arc;

        use super::*;
        use crate::agent::{
            AgentRegistry, ChatController, ChatMessage, FAILURE_NOTICE, StreamingSession,
        };

        async fn chat_once(client: OpenAiClient) -> ChatController {
            let agent = AgentRegistry::builtin().agents()[4].clone();
            let client: Arc<dyn CompletionClient> = Arc::new(client);
            let mut controller = ChatController::new(agent, client);
            controller.submit("Hello").unwrap();
            while controller.session().is_loading {
                controller.next_update().await;
            }
            controller
        }

        #[tokio::test]
        async fn live_stream_fills_the_reply() {
            let (base_url, server) = serve_once("200 OK", "text/event-stream", SSE_BODY).await;

            let controller = chat_once(client_for(&base_url)).await;

            assert_eq!(
                controller.conversation().messages(),
                &[
                    ChatMessage::user("Hello"),
                    ChatMessage::assistant("Hi there!"),
                ]
            );
            assert_eq!(controller.session(), StreamingSession::default());
            let request = server.await.unwrap();
            assert!(request.contains("You are a helpful AI assistant."));
        }

        #[tokio::test]
        async fn rejected_key_ends_with_the_notice() {
            let (base_url, server) = serve_once("401 Unauthorized", "text/plain", "denied").await;

            let controller = chat_once(client_for(&base_url)).await;

            assert_eq!(
                controller.conversation().messages(),
                &[
                    ChatMessage::user("Hello"),
                    ChatMessage::assistant(FAILURE_NOTICE),
                ]
            );
            assert!(controller.conversation().is_failed(1));
            assert_eq!(controller.session(), StreamingSession::default());
            server.await.unwrap();
        }

        #[tokio::test]
        async fn no_connectivity_ends_with_the_notice() {
            let controller = chat_once(client_for("http://127.0.0.1:9")).await;

            assert_eq!(
                controller.conversation().messages(),
                &[
                    ChatMessage::user("Hello"),
                    ChatMessage::assistant(FAILURE_NOTICE),
                ]
            );
            assert!(!controller.session().is_loading);
            assert!(!controller.session().is_streaming);
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = ProviderConfig {
            base_url: "https://example.test/v1/".into(),
            ..ProviderConfig::default()
        };
        let client = OpenAiClient::new(&config, Some("sk".into()));
        assert_eq!(
            client.info.endpoint,
            "https://example.test/v1/chat/completions"
        );
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }
}
