pub mod playback;
pub mod recorder;
pub mod resampler;
pub mod wav;

pub use playback::WordAudioPlayer;
pub use recorder::AudioRecorder;
pub use resampler::InputResampler;
pub use wav::{encode_wav, sample_to_i16};
