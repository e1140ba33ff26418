use crate::asr::{AsrClient, RecognizeOptions};
use crate::audio_toolkit::{encode_wav, AudioRecorder};
use crate::errors::AsrError;
use crate::settings::ClientSettings;
use log::{debug, info};

/// Minimum capture length worth sending for recognition (500 ms).
const MIN_AUDIO_SECS: f32 = 0.5;

/// Voice input round-trip: record, encode to WAV, recognize.
///
/// Wraps the capture thread and the recognition client behind the three
/// operations a push-to-talk input needs. One instance per input surface;
/// the recorder releases its device resources on every stop/cancel path
/// and when the instance drops.
pub struct VoiceInput {
    recorder: AudioRecorder,
    asr: AsrClient,
    sample_rate: u32,
}

impl VoiceInput {
    pub fn new(settings: ClientSettings) -> Result<Self, AsrError> {
        let sample_rate = settings.sample_rate;
        Ok(Self {
            recorder: AudioRecorder::new(sample_rate),
            asr: AsrClient::new(settings)?,
            sample_rate,
        })
    }

    /// Starts capturing. Fails on permission or device errors, leaving no
    /// partial state; the caller falls back to text input.
    pub fn start_recording(&self) -> Result<(), AsrError> {
        self.recorder
            .start()
            .map_err(|e| AsrError::Capture(e.to_string()))
    }

    /// Stops capturing and runs the recognition round-trip.
    ///
    /// Captures shorter than 500 ms are rejected as [`AsrError::AudioTooShort`]
    /// before any network traffic; there is nothing recognizable in them
    /// and the service would only report no-speech more slowly.
    pub async fn stop_recording(&self) -> Result<String, AsrError> {
        let samples = self
            .recorder
            .stop()
            .map_err(|e| AsrError::Capture(e.to_string()))?;

        let min_samples = (self.sample_rate as f32 * MIN_AUDIO_SECS) as usize;
        if samples.len() < min_samples {
            debug!(
                "Capture too short: {} samples (minimum {})",
                samples.len(),
                min_samples
            );
            return Err(AsrError::AudioTooShort {
                samples: samples.len(),
            });
        }

        let wav = encode_wav(&samples, self.sample_rate)
            .map_err(|e| AsrError::Encode(e.to_string()))?;
        info!(
            "Recognizing {:.1}s of audio ({} bytes)",
            samples.len() as f32 / self.sample_rate as f32,
            wav.len()
        );

        let options = RecognizeOptions {
            sample_rate: self.sample_rate,
            ..RecognizeOptions::default()
        };
        self.asr.recognize(wav, options).await
    }

    /// Discards the capture without submitting anything.
    pub fn cancel_recording(&self) {
        self.recorder.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_start_is_capture_error() {
        let voice = VoiceInput::new(ClientSettings::default()).unwrap();
        assert!(matches!(
            voice.stop_recording().await,
            Err(AsrError::Capture(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_discards_state() {
        let voice = VoiceInput::new(ClientSettings::default()).unwrap();
        voice.cancel_recording();
        assert!(matches!(
            voice.stop_recording().await,
            Err(AsrError::Capture(_))
        ));
    }
}
