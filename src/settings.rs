use serde::{Deserialize, Serialize};
use std::env;

// Environment variable name for overriding the server base URL
const BASE_URL_ENV: &str = "WORDFLOW_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8889";
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Client-side configuration for the chat and recognition endpoints.
///
/// Constructed once by the embedding application and handed to the
/// managers; there is no global settings instance.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the API service hosting `/api/chat` and `/api/asrrecognize`.
    pub base_url: String,
    /// Capture/encode sample rate in Hz. The recognition service expects 16 kHz.
    pub sample_rate: u32,
    /// Connect timeout for HTTP requests, in seconds. A hung stream after
    /// connect is not timed out by the core; `stop_generating` is the
    /// escape hatch.
    pub connect_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            connect_timeout_secs: 10,
        }
    }
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Effective base URL, trailing slashes trimmed. The environment
    /// variable wins over the configured value so deployments can be
    /// repointed without a config change; checked fresh on each call to
    /// pick up runtime changes.
    pub fn effective_base_url(&self) -> String {
        if let Ok(env_url) = env::var(BASE_URL_ENV) {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                return trimmed.trim_end_matches('/').to_string();
            }
        }
        self.base_url.trim_end_matches('/').to_string()
    }
}
