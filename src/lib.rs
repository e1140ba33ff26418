//! Client core for a vocabulary-learning chat assistant.
//!
//! The interesting parts live in three places: a streaming message store
//! ([`chat`]) that owns the send/cancel lifecycle of server-sent bot
//! responses, the UTF-8-byte-offset to UTF-16-index remapping
//! ([`textpos`], [`annotate`]) that turns server-side word annotations
//! into renderable ranges over the accumulated text, and the voice input
//! path ([`audio_toolkit`], [`voice`]) that captures microphone audio,
//! packages it as WAV, and runs it through the recognition endpoint.
//!
//! Everything is explicitly constructed and dependency-injected; the
//! embedding UI owns instance lifetimes and rendering.

pub mod annotate;
pub mod asr;
pub mod audio_toolkit;
pub mod chat;
pub mod errors;
pub mod settings;
pub mod textpos;
pub mod voice;

pub use annotate::{project, LinkWord, RawAnnotation};
pub use asr::{AsrClient, AudioFormat, RecognizeOptions};
pub use chat::{ChatManager, ChatState, Creator, Message, MessageKind};
pub use errors::{AsrError, ChatError};
pub use settings::ClientSettings;
pub use textpos::remap_offsets;
pub use voice::VoiceInput;
