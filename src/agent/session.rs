use super::message::{ChatMessage, ChatRole};

/// 一段對話的完整訊息列表。
///
/// 插入順序就是時間順序，也是畫面上的顯示順序。系統提示不會存在這裡，
/// 只有在組出請求時才會插入。
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    /// 以失敗通知取代的助理訊息索引，遞增排列。
    failed: Vec<usize>,
}

impl Conversation {
    /// 回傳對話中所有訊息的不可變切片。
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// 新增一則空白的助理訊息，之後的串流片段會附加在它後面。
    pub fn push_assistant_placeholder(&mut self) {
        self.messages.push(ChatMessage::assistant(String::new()));
    }

    /// 將片段附加到最後一則助理訊息。
    ///
    /// 最後一則不是助理訊息時不做任何事並回傳 `false`。
    pub fn append_to_last_assistant(&mut self, fragment: &str) -> bool {
        match self.messages.last_mut() {
            Some(message) if message.role == ChatRole::Assistant => {
                message.content.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// 以新內容取代最後一則助理訊息，回傳被取代的舊內容。
    pub fn replace_last_assistant(&mut self, content: &str) -> Option<String> {
        match self.messages.last_mut() {
            Some(message) if message.role == ChatRole::Assistant => {
                Some(std::mem::replace(&mut message.content, content.to_string()))
            }
            _ => None,
        }
    }

    /// 以失敗通知取代最後一則助理訊息，並記下它是失敗的回覆。
    pub fn fail_last_assistant(&mut self, notice: &str) -> Option<String> {
        let discarded = self.replace_last_assistant(notice)?;
        let index = self.messages.len() - 1;
        if self.failed.last() != Some(&index) {
            self.failed.push(index);
        }
        Some(discarded)
    }

    /// 第 `index` 則訊息是否為失敗通知。
    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.binary_search(&index).is_ok()
    }
}

/// 單次送出的串流狀態旗標。
///
/// `is_loading` 從送出開始直到完成或失敗；`is_streaming` 在收到第一個片段時
/// 才變為 `true`。兩者在結束時一起重設。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamingSession {
    pub is_loading: bool,
    pub is_streaming: bool,
}

impl StreamingSession {
    pub fn begin(&mut self) {
        self.is_loading = true;
        self.is_streaming = false;
    }

    /// 標記已開始接收片段。第一次呼叫時回傳 `true`。
    pub fn mark_streaming(&mut self) -> bool {
        let first = !self.is_streaming;
        self.is_streaming = true;
        first
    }

    pub fn finish(&mut self) {
        self.is_loading = false;
        self.is_streaming = false;
    }

    /// 正在等待第一個片段（畫面顯示讀取動畫的時機）。
    pub fn is_waiting(&self) -> bool {
        self.is_loading && !self.is_streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_append_to_placeholder_in_order() {
        let mut conversation = Conversation::default();
        conversation.push_user("Hello");
        conversation.push_assistant_placeholder();

        for fragment in ["Hi", " there", "!"] {
            assert!(conversation.append_to_last_assistant(fragment));
        }

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().content, "Hi there!");
    }

    #[test]
    fn append_requires_assistant_tail() {
        let mut conversation = Conversation::default();
        assert!(!conversation.append_to_last_assistant("x"));

        conversation.push_user("question");
        assert!(!conversation.append_to_last_assistant("x"));
        assert_eq!(conversation.messages()[0].content, "question");
        assert!(conversation.replace_last_assistant("y").is_none());
    }

    #[test]
    fn replace_returns_discarded_content() {
        let mut conversation = Conversation::default();
        conversation.push_user("q");
        conversation.push_assistant_placeholder();
        conversation.append_to_last_assistant("partial");

        let old = conversation.replace_last_assistant("failed");
        assert_eq!(old.as_deref(), Some("partial"));
        assert_eq!(conversation.last().unwrap().content, "failed");
    }

    #[test]
    fn failures_are_tracked_by_position() {
        let mut conversation = Conversation::default();
        conversation.push_user("q");
        conversation.push_assistant_placeholder();
        conversation.append_to_last_assistant("An error occurred. Please try again.");
        assert!(!conversation.is_failed(1));

        conversation.push_user("again");
        conversation.push_assistant_placeholder();
        let discarded = conversation.fail_last_assistant("oops");
        assert_eq!(discarded.as_deref(), Some(""));
        assert!(conversation.is_failed(3));
        assert!(!conversation.is_failed(1));
        assert!(!conversation.is_failed(2));
    }

    #[test]
    fn session_flag_transitions() {
        let mut session = StreamingSession::default();
        assert!(!session.is_waiting());

        session.begin();
        assert!(session.is_loading && session.is_waiting());

        assert!(session.mark_streaming());
        assert!(!session.mark_streaming());
        assert!(session.is_loading && !session.is_waiting());

        session.finish();
        assert_eq!(session, StreamingSession::default());
    }
}
