use crate::errors::AsrError;
use crate::settings::ClientSettings;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

/// Inner service code signalling a successful recognition.
const RECOGNITION_SUCCESS_CODE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Pcm,
}

impl AudioFormat {
    fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognizeOptions {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            format: AudioFormat::Wav,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AsrResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: AsrResult,
}

#[derive(Debug, Deserialize, Default)]
struct AsrResult {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Vec<AsrFragment>,
}

#[derive(Debug, Deserialize)]
struct AsrFragment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    #[allow(dead_code)]
    confidence: f64,
}

/// Client for the speech-recognition endpoint.
pub struct AsrClient {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl AsrClient {
    pub fn new(settings: ClientSettings) -> Result<Self, AsrError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { client, settings })
    }

    /// Submits one encoded audio payload and returns the recognized text.
    ///
    /// The service reports failure on two levels: the outer `code` covers
    /// the request itself, the inner `data.code` the recognition run
    /// (1000 = success). An inner failure with an empty result list is
    /// surfaced as [`AsrError::NoSpeech`] so the caller can prompt the
    /// user to speak longer instead of showing a generic failure.
    pub async fn recognize(
        &self,
        audio: Vec<u8>,
        options: RecognizeOptions,
    ) -> Result<String, AsrError> {
        let url = format!("{}/api/asrrecognize", self.settings.effective_base_url());
        debug!(
            "Submitting {} bytes of {} audio to {}",
            audio.len(),
            options.format.as_str(),
            url
        );

        let response = self
            .client
            .post(&url)
            .query(&[("format", options.format.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AsrError::Status(status));
        }

        let parsed: AsrResponse = response.json().await?;
        interpret_response(parsed)
    }
}

fn interpret_response(response: AsrResponse) -> Result<String, AsrError> {
    if response.code != 0 {
        return Err(AsrError::Service {
            code: response.code,
            message: response.message,
        });
    }
    if response.data.code != RECOGNITION_SUCCESS_CODE {
        if response.data.result.is_empty() {
            warn!(
                "Recognition returned no speech (code {})",
                response.data.code
            );
            return Err(AsrError::NoSpeech {
                code: response.data.code,
            });
        }
        return Err(AsrError::Recognition {
            code: response.data.code,
            message: response.data.message,
        });
    }

    let text: String = response
        .data
        .result
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect();
    debug!("Recognition produced {} chars", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(outer: i64, inner: i64, texts: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "code": outer,
            "message": if outer == 0 { "" } else { "asr service failed" },
            "data": {
                "reqid": "req-1",
                "code": inner,
                "message": "",
                "sequence": 1,
                "result": texts
                    .iter()
                    .map(|t| serde_json::json!({ "text": t, "confidence": 0.97 }))
                    .collect::<Vec<_>>(),
            }
        })
    }

    #[test]
    fn test_success_joins_fragments() {
        let parsed: AsrResponse =
            serde_json::from_value(response(0, 1000, &["hello ", "world"])).unwrap();
        assert_eq!(interpret_response(parsed).unwrap(), "hello world");
    }

    #[test]
    fn test_outer_failure_is_service_error() {
        let parsed: AsrResponse = serde_json::from_value(response(-1, 0, &[])).unwrap();
        assert!(matches!(
            interpret_response(parsed),
            Err(AsrError::Service { code: -1, .. })
        ));
    }

    #[test]
    fn test_inner_failure_without_result_is_no_speech() {
        let parsed: AsrResponse = serde_json::from_value(response(0, 1013, &[])).unwrap();
        assert!(matches!(
            interpret_response(parsed),
            Err(AsrError::NoSpeech { code: 1013 })
        ));
    }

    #[test]
    fn test_inner_failure_with_result_is_recognition_error() {
        let parsed: AsrResponse = serde_json::from_value(response(0, 1002, &["partial"])).unwrap();
        assert!(matches!(
            interpret_response(parsed),
            Err(AsrError::Recognition { code: 1002, .. })
        ));
    }

    #[tokio::test]
    async fn test_recognize_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/asrrecognize"))
            .and(query_param("format", "wav"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response(0, 1000, &["hi"])))
            .mount(&server)
            .await;

        let client = AsrClient::new(ClientSettings::new(server.uri())).unwrap();
        let text = client
            .recognize(vec![0u8; 64], RecognizeOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "hi");
    }
}
