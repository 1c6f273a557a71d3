use super::models::OpenAiStreamChunk;

/// 從 SSE 串流中解析出的單一事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `choices[0].delta.content`，缺少時為空字串。
    Delta(String),
    /// `data: [DONE]`，串流結束。
    Done,
    /// 服務端在串流中回報的錯誤。
    Error(String),
    /// 無法解析的資料列。
    Malformed(String),
}

/// SSE 位元組串流的增量解析器。
///
/// 以位元組為單位緩衝，直到遇到空行 (`\n\n`) 才解碼整個 frame，
/// 因此多位元組 UTF-8 字元被切在兩個 chunk 之間也不會損壞。
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// 餵入任意切割的位元組，回傳目前已完整的 frame。
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        let mut frames = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..split + 2).collect();
            let frame = String::from_utf8_lossy(&raw[..split]);
            if let Some(payload) = extract_data_payload(&frame) {
                frames.push(parse_payload(&payload));
            }
        }

        frames
    }

    /// 串流關閉時取出殘留在緩衝區、沒有以空行結尾的最後一個 frame。
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        let frame = String::from_utf8_lossy(&rest);
        extract_data_payload(&frame).map(|payload| parse_payload(&payload))
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn parse_payload(payload: &str) -> SseFrame {
    if payload == "[DONE]" {
        return SseFrame::Done;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                let message = match error.kind {
                    Some(kind) if !kind.is_empty() => format!("{kind}: {}", error.message),
                    _ => error.message,
                };
                return SseFrame::Error(message);
            }
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default();
            SseFrame::Delta(text)
        }
        Err(err) => SseFrame::Malformed(format!("{err}: {payload}")),
    }
}
