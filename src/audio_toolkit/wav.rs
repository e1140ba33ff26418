use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Converts one float sample in [-1, 1] to a 16-bit signed integer.
///
/// Clamped first; negative values scale by 0x8000 and non-negative by
/// 0x7FFF so both ends of the range map onto the full integer range
/// without overflow.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 0x8000 as f32) as i16
    } else {
        (s * 0x7FFF as f32) as i16
    }
}

/// Encodes mono float samples as an in-memory WAV payload.
///
/// Canonical 44-byte RIFF/WAVE header (PCM format tag 1, mono, 16 bits per
/// sample, block align 2) followed by little-endian PCM data, which is the
/// exact container the recognition endpoint expects.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut buffer, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample_to_i16(sample))
                .context("Failed to write sample")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(buffer.into_inner())
}
