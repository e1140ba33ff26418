use crate::audio_toolkit::resampler::InputResampler;
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat};
use log::{debug, error, warn};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

enum Command {
    Start {
        reply: SyncSender<Result<(), String>>,
    },
    Stop {
        reply: SyncSender<Result<Vec<f32>, String>>,
    },
    Cancel,
    Shutdown,
}

/// Microphone capture at a fixed target rate.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated worker
/// thread and this handle talks to it over a channel. Captured audio is
/// downmixed to mono and resampled from the device rate to `target_rate`
/// as it arrives. The worker owns the stream exclusively: every
/// start/stop/cancel path releases it exactly once, and starting while a
/// capture is active forcibly releases the previous one first.
pub struct AudioRecorder {
    tx: Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
}

impl AudioRecorder {
    pub fn new(target_rate: u32) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || run_worker(rx, target_rate));
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Opens the default input device and starts buffering samples.
    pub fn start(&self) -> Result<()> {
        let (reply, response) = mpsc::sync_channel(1);
        self.tx
            .send(Command::Start { reply })
            .map_err(|_| anyhow!("Recorder worker is gone"))?;
        response
            .recv()
            .map_err(|_| anyhow!("Recorder worker is gone"))?
            .map_err(|e| anyhow!(e))
    }

    /// Stops the capture and returns the accumulated mono samples.
    pub fn stop(&self) -> Result<Vec<f32>> {
        let (reply, response) = mpsc::sync_channel(1);
        self.tx
            .send(Command::Stop { reply })
            .map_err(|_| anyhow!("Recorder worker is gone"))?;
        response
            .recv()
            .map_err(|_| anyhow!("Recorder worker is gone"))?
            .map_err(|e| anyhow!(e))
    }

    /// Discards buffered samples and releases the capture stream. No-op
    /// when nothing is recording.
    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Live capture resources; dropping it releases the stream.
struct CaptureSession {
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    resampler: Arc<Mutex<InputResampler>>,
}

impl CaptureSession {
    /// Tears down the stream and returns everything captured, including
    /// the resampler's trailing partial chunk.
    fn finish(self) -> Vec<f32> {
        drop(self.stream);
        let mut samples = std::mem::take(&mut *self.samples.lock().unwrap());
        self.resampler.lock().unwrap().finish(&mut samples);
        samples
    }
}

fn run_worker(rx: Receiver<Command>, target_rate: u32) {
    let mut session: Option<CaptureSession> = None;

    while let Ok(command) = rx.recv() {
        match command {
            Command::Start { reply } => {
                if session.take().is_some() {
                    warn!("Releasing previous capture before starting a new one");
                }
                let result = match open_capture(target_rate) {
                    Ok(new_session) => {
                        session = Some(new_session);
                        Ok(())
                    }
                    Err(e) => {
                        error!("Failed to start recording: {}", e);
                        Err(e.to_string())
                    }
                };
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                let result = match session.take() {
                    Some(active) => {
                        let samples = active.finish();
                        debug!("Capture stopped with {} samples", samples.len());
                        Ok(samples)
                    }
                    None => Err("No active recording".to_string()),
                };
                let _ = reply.send(result);
            }
            Command::Cancel => {
                if session.take().is_some() {
                    debug!("Capture cancelled, samples discarded");
                }
            }
            Command::Shutdown => break,
        }
    }
}

fn open_capture(target_rate: u32) -> Result<CaptureSession> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;
    let config = device.default_input_config()?;
    let channels = config.channels() as usize;
    let device_rate = config.sample_rate().0;
    debug!(
        "Opening capture: {} ch @ {} Hz ({:?}) -> {} Hz mono",
        channels,
        device_rate,
        config.sample_format(),
        target_rate
    );

    let samples = Arc::new(Mutex::new(Vec::new()));
    let resampler = Arc::new(Mutex::new(InputResampler::new(device_rate, target_rate)?));

    let err_fn = |e| error!("Capture stream error: {}", e);
    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let sink = CaptureSink::new(channels, samples.clone(), resampler.clone());
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| sink.write(data),
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let sink = CaptureSink::new(channels, samples.clone(), resampler.clone());
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| sink.write(data),
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let sink = CaptureSink::new(channels, samples.clone(), resampler.clone());
            device.build_input_stream(
                &config.into(),
                move |data: &[u16], _| sink.write(data),
                err_fn,
                None,
            )?
        }
        other => return Err(anyhow!("Unsupported input sample format: {:?}", other)),
    };

    stream.play()?;
    Ok(CaptureSession {
        stream,
        samples,
        resampler,
    })
}

/// Downmixes interleaved device frames to mono and feeds the resampler.
struct CaptureSink {
    channels: usize,
    samples: Arc<Mutex<Vec<f32>>>,
    resampler: Arc<Mutex<InputResampler>>,
}

impl CaptureSink {
    fn new(
        channels: usize,
        samples: Arc<Mutex<Vec<f32>>>,
        resampler: Arc<Mutex<InputResampler>>,
    ) -> Self {
        Self {
            channels,
            samples,
            resampler,
        }
    }

    fn write<T: cpal::SizedSample>(&self, data: &[T])
    where
        f32: FromSample<T>,
    {
        let mut mono = Vec::with_capacity(data.len() / self.channels.max(1));
        for frame in data.chunks(self.channels.max(1)) {
            let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
            mono.push(sum / frame.len() as f32);
        }
        let mut out = self.samples.lock().unwrap();
        self.resampler.lock().unwrap().push(&mono, &mut out);
    }
}
