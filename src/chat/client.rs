use crate::annotate::RawAnnotation;
use crate::chat::sse::{SseEvent, SseParser};
use crate::errors::ChatError;
use crate::settings::ClientSettings;
use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

/// One increment of a bot response: delta text plus any byte-offset
/// annotations delivered alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatDelta {
    pub text: String,
    pub annotations: Vec<RawAnnotation>,
}

/// Wire schema of one `message` event payload.
#[derive(Debug, Deserialize)]
struct ChatPayload {
    #[serde(default)]
    msg: String,
    #[serde(default)]
    extra: ChatExtra,
}

#[derive(Debug, Deserialize, Default)]
struct ChatExtra {
    meta_info: Option<String>,
}

/// `meta_info` decodes to an array of groups; only the first group's items
/// carry word annotations.
#[derive(Debug, Deserialize)]
struct MetaGroup {
    #[serde(default)]
    items: Vec<RawAnnotation>,
}

enum Decoded {
    Delta(ChatDelta),
    Skip,
    Error(String),
}

/// Client for the chat streaming endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl ChatClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    /// Opens the server-sent-event stream for one user query.
    ///
    /// The request carries the raw user text and the session's conversation
    /// id; the server correlates history by the latter.
    pub async fn stream_chat(
        &self,
        query: &str,
        conversation_id: &str,
    ) -> Result<ChatEventStream, ChatError> {
        let url = format!("{}/api/chat", self.settings.effective_base_url());
        debug!("Opening chat stream to {} (conversation {})", url, conversation_id);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("conversation_id", conversation_id)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }

        let bytes = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()));
        Ok(ChatEventStream {
            inner: Box::pin(bytes),
            parser: SseParser::new(),
            queue: VecDeque::new(),
            done: false,
        })
    }
}

/// Pull side of an open chat stream.
pub struct ChatEventStream {
    inner: Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>,
    parser: SseParser,
    queue: VecDeque<SseEvent>,
    done: bool,
}

impl ChatEventStream {
    /// Next delta, `Ok(None)` once the server closes the stream.
    ///
    /// Events that fail schema validation are skipped (and logged), never
    /// surfaced as stream failures; an explicit `error` event or a dropped
    /// transport ends the stream with an error.
    pub async fn next_event(&mut self) -> Result<Option<ChatDelta>, ChatError> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                match decode_event(&event) {
                    Decoded::Delta(delta) => return Ok(Some(delta)),
                    Decoded::Skip => continue,
                    Decoded::Error(message) => {
                        self.done = true;
                        return Err(ChatError::Stream(message));
                    }
                }
            }
            if self.done {
                return Ok(None);
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.queue.extend(self.parser.push(&chunk)),
                Some(Err(e)) => {
                    self.done = true;
                    return Err(ChatError::Transport(e));
                }
                None => {
                    self.done = true;
                    self.queue.extend(self.parser.finish());
                }
            }
        }
    }
}

fn decode_event(event: &SseEvent) -> Decoded {
    match event.event.as_str() {
        "error" => Decoded::Error(event.data.clone()),
        // hertz's SSE writer always names the event; tolerate an unnamed one.
        "message" | "" => decode_payload(&event.data),
        other => {
            debug!("Ignoring unknown SSE event type: {}", other);
            Decoded::Skip
        }
    }
}

fn decode_payload(data: &str) -> Decoded {
    let payload: ChatPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Skipping malformed chat event payload: {}", e);
            return Decoded::Skip;
        }
    };

    let annotations = match payload.extra.meta_info.as_deref() {
        Some(meta_info) => decode_meta_info(meta_info),
        None => Vec::new(),
    };

    if payload.msg.is_empty() && annotations.is_empty() {
        return Decoded::Skip;
    }

    Decoded::Delta(ChatDelta {
        text: payload.msg,
        annotations,
    })
}

fn decode_meta_info(meta_info: &str) -> Vec<RawAnnotation> {
    match serde_json::from_str::<Vec<MetaGroup>>(meta_info) {
        Ok(groups) => groups.into_iter().next().map(|g| g.items).unwrap_or_default(),
        Err(e) => {
            warn!("Skipping malformed meta_info: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_event(data: &str) -> SseEvent {
        SseEvent {
            event: "message".to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_decode_text_only_payload() {
        let decoded = decode_event(&message_event(r#"{"msg":"hello","extra":{}}"#));
        match decoded {
            Decoded::Delta(delta) => {
                assert_eq!(delta.text, "hello");
                assert!(delta.annotations.is_empty());
            }
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_decode_payload_with_meta_info() {
        let meta = r#"[{"type":1,"items":[{"start":0,"end":6,"text":"doubao"}]}]"#;
        let data = serde_json::json!({ "msg": "", "extra": { "meta_info": meta } }).to_string();
        match decode_event(&message_event(&data)) {
            Decoded::Delta(delta) => {
                assert_eq!(delta.annotations.len(), 1);
                assert_eq!(delta.annotations[0].start, 0);
                assert_eq!(delta.annotations[0].end, 6);
                assert_eq!(delta.annotations[0].text, "doubao");
            }
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_decode_missing_extra_defaults() {
        match decode_event(&message_event(r#"{"msg":"x"}"#)) {
            Decoded::Delta(delta) => assert_eq!(delta.text, "x"),
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        assert!(matches!(
            decode_event(&message_event("not json")),
            Decoded::Skip
        ));
    }

    #[test]
    fn test_malformed_meta_info_keeps_text() {
        let data = r#"{"msg":"hi","extra":{"meta_info":"broken"}}"#;
        match decode_event(&message_event(data)) {
            Decoded::Delta(delta) => {
                assert_eq!(delta.text, "hi");
                assert!(delta.annotations.is_empty());
            }
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn test_error_event() {
        let event = SseEvent {
            event: "error".to_string(),
            data: "kitex streaming recv err".to_string(),
        };
        assert!(matches!(decode_event(&event), Decoded::Error(_)));
    }

    #[test]
    fn test_empty_payload_is_skipped() {
        assert!(matches!(
            decode_event(&message_event(r#"{"msg":"","extra":{}}"#)),
            Decoded::Skip
        ));
    }
}
