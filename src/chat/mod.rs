pub mod client;
pub mod manager;
pub mod sse;
pub mod store;

pub use client::{ChatClient, ChatDelta, ChatEventStream};
pub use manager::ChatManager;
pub use store::{ChatState, Creator, Message, MessageKind, StoreEvent};
