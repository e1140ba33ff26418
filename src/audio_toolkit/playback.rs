use anyhow::{Context, Result};
use log::{debug, error};
use rodio::{Decoder, OutputStream, Sink};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

type PlayingCallback = Box<dyn Fn(bool) + Send + 'static>;

struct CurrentClip {
    /// Reservation token, unique per `play` call. The clip thread only
    /// touches the slot while its token is still installed.
    token: u64,
    word_id: u64,
    /// `None` while the clip thread is still opening the device.
    sink: Option<Arc<Sink>>,
}

/// Plays word-pronunciation clips, one at a time.
///
/// Starting a clip stops whatever was playing first. Interested parties
/// register a per-word callback and get notified with `true` on start and
/// `false` when the clip ends, errors, or is preempted. Explicitly
/// constructed; create one per conversation view.
#[derive(Default)]
pub struct WordAudioPlayer {
    current: Arc<Mutex<Option<CurrentClip>>>,
    callbacks: Arc<Mutex<HashMap<u64, PlayingCallback>>>,
    next_token: AtomicU64,
}

impl WordAudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_callback(&self, word_id: u64, callback: impl Fn(bool) + Send + 'static) {
        self.callbacks
            .lock()
            .unwrap()
            .insert(word_id, Box::new(callback));
    }

    pub fn unregister_callback(&self, word_id: u64) {
        self.callbacks.lock().unwrap().remove(&word_id);
    }

    /// Decodes and plays one encoded audio clip on a background thread.
    ///
    /// The slot is reserved before the thread spawns, so a second `play`
    /// (or a `stop`) arriving while the device is still opening preempts
    /// this clip instead of racing it into a second live sink. The output
    /// device is opened lazily per clip (pronunciation playback is
    /// occasional); decode or device failures are logged and reported to
    /// the word's callback as stopped rather than propagated.
    pub fn play(&self, word_id: u64, audio: Vec<u8>) {
        self.stop();

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *self.current.lock().unwrap() = Some(CurrentClip {
            token,
            word_id,
            sink: None,
        });

        let current = self.current.clone();
        let callbacks = self.callbacks.clone();
        thread::spawn(move || {
            if let Err(e) = play_clip(token, word_id, audio, &current, &callbacks) {
                error!("Failed to play word audio {}: {}", word_id, e);
                if release_slot(&current, token) {
                    notify(&callbacks, word_id, false);
                }
            }
        });
    }

    /// Stops the current clip, if any, and notifies its callback. A clip
    /// still opening its device counts: its thread finds the reservation
    /// gone and never starts the sink.
    pub fn stop(&self) {
        let clip = self.current.lock().unwrap().take();
        if let Some(clip) = clip {
            debug!("Stopping word audio {}", clip.word_id);
            if let Some(sink) = clip.sink {
                sink.stop();
            }
            notify(&self.callbacks, clip.word_id, false);
        }
    }

    pub fn is_playing(&self, word_id: u64) -> bool {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|clip| {
                clip.word_id == word_id && clip.sink.as_ref().is_some_and(|sink| !sink.empty())
            })
    }
}

fn play_clip(
    token: u64,
    word_id: u64,
    audio: Vec<u8>,
    current: &Arc<Mutex<Option<CurrentClip>>>,
    callbacks: &Arc<Mutex<HashMap<u64, PlayingCallback>>>,
) -> Result<()> {
    let (_stream, handle) = OutputStream::try_default().context("No audio output device")?;
    let sink = Arc::new(Sink::try_new(&handle).context("Failed to create output sink")?);
    let source = Decoder::new(Cursor::new(audio)).context("Failed to decode audio clip")?;

    {
        let mut slot = current.lock().unwrap();
        match slot.as_mut() {
            Some(clip) if clip.token == token => clip.sink = Some(sink.clone()),
            // Preempted while opening the device; whoever took over
            // already notified the callback.
            _ => return Ok(()),
        }
    }
    sink.append(source);
    notify(callbacks, word_id, true);

    // Keeps the output stream alive until the clip finishes or is stopped.
    sink.sleep_until_end();

    if release_slot(current, token) {
        notify(callbacks, word_id, false);
    }
    Ok(())
}

/// Clears the slot if this clip's reservation is still installed. Returns
/// false when a newer clip or an explicit stop already took over.
fn release_slot(current: &Arc<Mutex<Option<CurrentClip>>>, token: u64) -> bool {
    let mut slot = current.lock().unwrap();
    if slot.as_ref().is_some_and(|clip| clip.token == token) {
        *slot = None;
        true
    } else {
        false
    }
}

fn notify(callbacks: &Arc<Mutex<HashMap<u64, PlayingCallback>>>, word_id: u64, playing: bool) {
    if let Some(callback) = callbacks.lock().unwrap().get(&word_id) {
        callback(playing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_playing_initially() {
        let player = WordAudioPlayer::new();
        assert!(!player.is_playing(1));
    }

    #[test]
    fn test_stop_without_clip_is_noop() {
        let player = WordAudioPlayer::new();
        player.stop();
        assert!(!player.is_playing(1));
    }

    #[test]
    fn test_stop_preempts_clip_still_opening_device() {
        let player = WordAudioPlayer::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        player.register_callback(3, move |playing| sink.lock().unwrap().push(playing));

        *player.current.lock().unwrap() = Some(CurrentClip {
            token: 1,
            word_id: 3,
            sink: None,
        });
        assert!(!player.is_playing(3));

        player.stop();
        assert!(player.current.lock().unwrap().is_none());
        assert_eq!(*fired.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_superseded_clip_cannot_release_newer_reservation() {
        let current = Arc::new(Mutex::new(Some(CurrentClip {
            token: 2,
            word_id: 9,
            sink: None,
        })));

        // The older clip's thread finds the newer reservation and backs off.
        assert!(!release_slot(&current, 1));
        assert!(current.lock().unwrap().is_some());

        assert!(release_slot(&current, 2));
        assert!(current.lock().unwrap().is_none());
    }

    #[test]
    fn test_callback_registry() {
        let player = WordAudioPlayer::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        player.register_callback(7, move |playing| sink.lock().unwrap().push(playing));

        notify(&player.callbacks, 7, true);
        notify(&player.callbacks, 7, false);
        player.unregister_callback(7);
        notify(&player.callbacks, 7, true);

        assert_eq!(*fired.lock().unwrap(), vec![true, false]);
    }
}
