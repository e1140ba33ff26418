use crate::chat::client::{ChatClient, ChatEventStream};
use crate::chat::store::{ChatState, Message, StoreEvent};
use crate::errors::ChatError;
use crate::settings::ClientSettings;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Exclusive ownership of one in-flight bot response.
struct Generation {
    /// Cooperative cancellation flag; once set, the stream task must not
    /// touch state again.
    cancel: Arc<AtomicBool>,
    bot_id: Uuid,
    task: JoinHandle<()>,
}

/// Owns the conversation state and the streaming lifecycle.
///
/// Explicitly constructed and dependency-injected; one instance per
/// conversation session. At most one generation is live at a time: sending
/// while generating cancels the previous stream before a new one starts,
/// and every state mutation from a stream task is guarded by that task's
/// own cancellation flag, so a superseded stream can never corrupt a newer
/// message.
pub struct ChatManager {
    state: Arc<Mutex<ChatState>>,
    client: Arc<ChatClient>,
    active: Arc<Mutex<Option<Generation>>>,
}

impl ChatManager {
    /// Creates a manager with a fresh conversation id.
    pub fn new(settings: ClientSettings) -> Result<Self, ChatError> {
        let client = ChatClient::new(settings)?;
        Ok(Self {
            state: Arc::new(Mutex::new(ChatState::new(Uuid::new_v4().to_string()))),
            client: Arc::new(client),
            active: Arc::new(Mutex::new(None)),
        })
    }

    /// Sends one user message and starts streaming the bot response.
    ///
    /// Cancels any generation still in flight first (no queuing), appends
    /// the user message and an empty bot placeholder, then spawns the
    /// stream task on the ambient tokio runtime. Returns the bot message
    /// id so the caller can follow that message.
    pub fn send_message(&self, text: &str) -> Uuid {
        self.stop_generating();

        let user_id = Uuid::new_v4();
        let bot_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));

        let conversation_id = {
            let mut state = self.state.lock().unwrap();
            state.apply(StoreEvent::PushUser {
                id: user_id,
                text: text.to_string(),
            });
            state.apply(StoreEvent::PushBotPlaceholder { id: bot_id });
            state.conversation_id.clone()
        };

        info!("Starting generation for bot message {}", bot_id);

        let mut slot = self.active.lock().unwrap();
        let task = tokio::spawn(run_stream(
            self.client.clone(),
            self.state.clone(),
            self.active.clone(),
            cancel.clone(),
            bot_id,
            text.to_string(),
            conversation_id,
        ));
        *slot = Some(Generation {
            cancel,
            bot_id,
            task,
        });

        bot_id
    }

    /// Appends a user image message. Does not trigger generation; the
    /// caller decides what, if anything, to send afterwards.
    pub fn send_image(&self, base64_image: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().apply(StoreEvent::PushImage {
            id,
            base64: base64_image.to_string(),
        });
        id
    }

    /// Cancels the in-flight generation, if any. Idempotent.
    ///
    /// The current bot message keeps whatever partial text it has and is
    /// marked done; the stream task observes its flag (and is aborted) and
    /// never mutates state again.
    pub fn stop_generating(&self) {
        let Some(generation) = self.active.lock().unwrap().take() else {
            return;
        };
        debug!("Cancelling generation for bot message {}", generation.bot_id);
        generation.cancel.store(true, Ordering::SeqCst);
        generation.task.abort();
        self.state.lock().unwrap().apply(StoreEvent::Finish {
            id: generation.bot_id,
        });
    }

    /// Overrides the session's conversation id (set once, before sending).
    pub fn set_conversation_id(&self, conversation_id: &str) {
        self.state
            .lock()
            .unwrap()
            .apply(StoreEvent::SetConversationId(conversation_id.to_string()));
    }

    pub fn conversation_id(&self) -> String {
        self.state.lock().unwrap().conversation_id.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.state.lock().unwrap().is_generating
    }

    /// One consistent copy of the whole conversation state.
    pub fn snapshot(&self) -> ChatState {
        self.state.lock().unwrap().clone()
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        state.messages().into_iter().cloned().collect()
    }
}

impl Drop for ChatManager {
    fn drop(&mut self) {
        if let Some(generation) = self.active.lock().unwrap().take() {
            generation.cancel.store(true, Ordering::SeqCst);
            generation.task.abort();
        }
    }
}

/// Pumps one stream into the store until close, error, or cancellation.
async fn run_stream(
    client: Arc<ChatClient>,
    state: Arc<Mutex<ChatState>>,
    active: Arc<Mutex<Option<Generation>>>,
    cancel: Arc<AtomicBool>,
    bot_id: Uuid,
    query: String,
    conversation_id: String,
) {
    let mut stream = match client.stream_chat(&query, &conversation_id).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to open chat stream: {}", e);
            finish(&state, &active, &cancel, bot_id);
            return;
        }
    };

    pump(&mut stream, &state, &cancel, bot_id).await;
    finish(&state, &active, &cancel, bot_id);
}

async fn pump(
    stream: &mut ChatEventStream,
    state: &Arc<Mutex<ChatState>>,
    cancel: &Arc<AtomicBool>,
    bot_id: Uuid,
) {
    loop {
        match stream.next_event().await {
            Ok(Some(delta)) => {
                if cancel.load(Ordering::SeqCst) {
                    debug!("Dropping delta for cancelled message {}", bot_id);
                    return;
                }
                state.lock().unwrap().apply(StoreEvent::Delta {
                    id: bot_id,
                    text: delta.text,
                    annotations: delta.annotations,
                });
            }
            Ok(None) => {
                debug!("Chat stream closed for message {}", bot_id);
                return;
            }
            Err(ChatError::Stream(message)) => {
                error!("Chat stream error event: {}", message);
                return;
            }
            Err(e) => {
                // Transport drop mid-stream: keep the partial text, no retry.
                warn!("Chat stream transport error: {}", e);
                return;
            }
        }
    }
}

/// Terminal transition for the stream task's own message. A cancelled task
/// skips it entirely: `stop_generating` already finished the message and
/// may have started a newer generation this task must not touch.
fn finish(
    state: &Arc<Mutex<ChatState>>,
    active: &Arc<Mutex<Option<Generation>>>,
    cancel: &Arc<AtomicBool>,
    bot_id: Uuid,
) {
    if cancel.load(Ordering::SeqCst) {
        return;
    }
    state.lock().unwrap().apply(StoreEvent::Finish { id: bot_id });
    let mut slot = active.lock().unwrap();
    if slot.as_ref().map(|g| g.bot_id) == Some(bot_id) {
        *slot = None;
    }
}
