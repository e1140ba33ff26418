/// Failures surfaced by the chat streaming client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("stream error event: {0}")]
    Stream(String),
}

/// Failures surfaced by the speech-recognition round-trip.
///
/// `AudioTooShort` and `NoSpeech` are distinguished from the generic
/// variants so the caller can show a targeted "please speak longer"
/// message instead of a blanket failure.
#[derive(Debug, thiserror::Error)]
pub enum AsrError {
    #[error("recording too short to recognize ({samples} samples)")]
    AudioTooShort { samples: usize },
    #[error("no speech detected (service code {code})")]
    NoSpeech { code: i64 },
    #[error("recognition service error: code {code}: {message}")]
    Service { code: i64, message: String },
    #[error("recognition failed: code {code}: {message}")]
    Recognition { code: i64, message: String },
    #[error("audio capture failed: {0}")]
    Capture(String),
    #[error("wav encoding failed: {0}")]
    Encode(String),
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("asr endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}
