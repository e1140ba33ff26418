use anyhow::{anyhow, Result};
use rubato::{FftFixedIn, Resampler};

// Input chunk size fed to the FFT resampler
const CHUNK_SIZE: usize = 1024;

/// Converts a mono capture stream from the device rate to the target rate.
///
/// Input arrives in arbitrary-sized slices from the capture callback; the
/// converter buffers them into fixed chunks for `rubato` and appends the
/// converted output to a caller-owned vec. When the device already runs at
/// the target rate the samples pass through untouched.
pub struct InputResampler {
    resampler: Option<FftFixedIn<f32>>,
    in_buf: Vec<f32>,
}

impl InputResampler {
    pub fn new(in_hz: u32, out_hz: u32) -> Result<Self> {
        let resampler = if in_hz == out_hz {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(in_hz as usize, out_hz as usize, CHUNK_SIZE, 1, 1)
                    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?,
            )
        };
        Ok(Self {
            resampler,
            in_buf: Vec::with_capacity(CHUNK_SIZE),
        })
    }

    /// Feeds captured samples, appending whatever full chunks convert.
    pub fn push(&mut self, mut src: &[f32], out: &mut Vec<f32>) {
        let Some(resampler) = self.resampler.as_mut() else {
            out.extend_from_slice(src);
            return;
        };

        while !src.is_empty() {
            let space = CHUNK_SIZE - self.in_buf.len();
            let take = space.min(src.len());
            self.in_buf.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.in_buf.len() == CHUNK_SIZE {
                if let Ok(converted) = resampler.process(&[&self.in_buf[..]], None) {
                    out.extend_from_slice(&converted[0]);
                }
                self.in_buf.clear();
            }
        }
    }

    /// Flushes the trailing partial chunk, zero-padded to chunk size.
    pub fn finish(&mut self, out: &mut Vec<f32>) {
        if let Some(resampler) = self.resampler.as_mut() {
            if !self.in_buf.is_empty() {
                self.in_buf.resize(CHUNK_SIZE, 0.0);
                if let Ok(converted) = resampler.process(&[&self.in_buf[..]], None) {
                    out.extend_from_slice(&converted[0]);
                }
                self.in_buf.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_at_target_rate() {
        let mut resampler = InputResampler::new(16000, 16000).unwrap();
        let mut out = Vec::new();
        resampler.push(&[0.1, 0.2, 0.3], &mut out);
        resampler.finish(&mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_downsample_halves_sample_count() {
        let mut resampler = InputResampler::new(32000, 16000).unwrap();
        let mut out = Vec::new();
        // One second of input in uneven slices.
        let input = vec![0.0f32; 32000];
        for slice in input.chunks(777) {
            resampler.push(slice, &mut out);
        }
        resampler.finish(&mut out);
        // Chunked FFT conversion pads the tail, so allow one chunk of slack.
        let expected = 16000;
        assert!(
            (out.len() as i64 - expected).unsigned_abs() <= CHUNK_SIZE as u64,
            "unexpected output length {}",
            out.len()
        );
    }
}
