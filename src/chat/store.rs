use crate::annotate::{project, LinkWord, RawAnnotation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Creator {
    User,
    Bot,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// One chat message. Bot messages accumulate `text` and `link_words` while
/// their stream is live and freeze once `is_done` is set.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub creator: Creator,
    pub kind: MessageKind,
    pub text: String,
    /// Resolved clickable ranges, UTF-16 code-unit indices into `text`.
    pub link_words: Vec<LinkWord>,
    /// Byte-offset annotations whose range is not yet covered by `text`;
    /// retried on each delta, discarded with the stream.
    #[serde(skip)]
    pub pending_annotations: Vec<RawAnnotation>,
    pub is_done: bool,
}

impl Message {
    fn user_text(id: Uuid, text: String) -> Self {
        Self {
            id,
            creator: Creator::User,
            kind: MessageKind::Text,
            text,
            link_words: Vec::new(),
            pending_annotations: Vec::new(),
            is_done: true,
        }
    }

    fn user_image(id: Uuid, base64: String) -> Self {
        Self {
            kind: MessageKind::Image,
            ..Self::user_text(id, base64)
        }
    }

    fn bot_placeholder(id: Uuid) -> Self {
        Self {
            id,
            creator: Creator::Bot,
            kind: MessageKind::Text,
            text: String::new(),
            link_words: Vec::new(),
            pending_annotations: Vec::new(),
            is_done: false,
        }
    }
}

/// Everything that can happen to the conversation state.
///
/// All mutation funnels through [`ChatState::apply`] so each event-loop
/// turn observes one consistent snapshot, replacing the copy-on-write
/// store of the original client with an explicit transition function.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    PushUser { id: Uuid, text: String },
    PushImage { id: Uuid, base64: String },
    /// Appends an empty streaming bot message and marks generation active.
    PushBotPlaceholder { id: Uuid },
    /// One streaming increment for the bot message `id`.
    Delta {
        id: Uuid,
        text: String,
        annotations: Vec<RawAnnotation>,
    },
    /// Terminal transition for the bot message `id` (normal close, error,
    /// or user abort all land here).
    Finish { id: Uuid },
    SetConversationId(String),
}

/// In-memory conversation state: insertion order is display order and
/// `message_links` is append-only for the lifetime of the session.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChatState {
    pub message_links: Vec<Uuid>,
    pub message_map: HashMap<Uuid, Message>,
    pub is_generating: bool,
    pub conversation_id: String,
}

impl ChatState {
    pub fn new(conversation_id: String) -> Self {
        Self {
            conversation_id,
            ..Self::default()
        }
    }

    /// Applies one event. Events addressed to an unknown or already
    /// terminal message are no-ops; that is the guard that keeps a
    /// superseded stream from corrupting a newer message.
    pub fn apply(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::PushUser { id, text } => {
                self.insert(Message::user_text(id, text));
            }
            StoreEvent::PushImage { id, base64 } => {
                self.insert(Message::user_image(id, base64));
            }
            StoreEvent::PushBotPlaceholder { id } => {
                self.insert(Message::bot_placeholder(id));
                self.is_generating = true;
            }
            StoreEvent::Delta {
                id,
                text,
                annotations,
            } => {
                let Some(message) = self.message_map.get_mut(&id) else {
                    return;
                };
                if message.is_done {
                    return;
                }
                // Append first, then project: offsets are cumulative over
                // the full accumulated text, so projecting before the
                // append would under-resolve ranges that reference the
                // just-appended characters.
                message.text.push_str(&text);
                let mut raw = std::mem::take(&mut message.pending_annotations);
                raw.extend(annotations);
                let (resolved, deferred) = project(&message.text, &raw);
                message.link_words.extend(resolved);
                message.pending_annotations = deferred;
            }
            StoreEvent::Finish { id } => {
                // A pure no-op for unknown or already-done messages: a
                // superseded stream's late Finish must not clear
                // `is_generating` while a newer generation is live.
                let Some(message) = self.message_map.get_mut(&id) else {
                    return;
                };
                if message.is_done {
                    return;
                }
                message.is_done = true;
                message.pending_annotations.clear();
                self.is_generating = false;
            }
            StoreEvent::SetConversationId(conversation_id) => {
                self.conversation_id = conversation_id;
            }
        }
    }

    fn insert(&mut self, message: Message) {
        self.message_links.push(message.id);
        self.message_map.insert(message.id, message);
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<&Message> {
        self.message_links
            .iter()
            .filter_map(|id| self.message_map.get(id))
            .collect()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.message_links
            .last()
            .and_then(|id| self.message_map.get(id))
    }
}
