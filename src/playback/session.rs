use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::AudioSettings;
use crate::error::PlayerError;

use super::chain::{Chain, SharedChain, VolumeStage};
use super::completion::{Completion, EndedSignal};
use super::decoder::DecoderGateway;
use super::device::{OnComplete, OutputDevice};
use super::format::StreamFormat;

struct SessionState {
    chain: Option<SharedChain>,
    format: StreamFormat,
    playing: bool,
    /// Whether the current chain has been handed to the device since the
    /// last load or stop.
    submitted: bool,
    ended: Completion,
    /// Sample rate the device was last initialised with.
    device_rate: Option<u32>,
    /// Bumped on every load so callbacks of older chains are ignored.
    generation: u64,
    volume: f64,
}

impl SessionState {
    fn release_chain(&mut self) {
        if let Some(chain) = self.chain.take() {
            chain.lock().release();
        }
    }
}

/// The single active audio transport.
///
/// All fields sit behind one mutex. Operations touching in-flight stream state
/// additionally take the chain lock, which the device's render thread also
/// holds while it pulls samples, for as short as possible.
///
/// The render thread never takes the session lock: the completion callback
/// only clears `armed` and fires the signal, and the session notices the
/// ended track the next time it looks at its own state.
pub struct PlaybackSession {
    state: Mutex<SessionState>,
    /// Generation whose completion may still fire; zero when none.
    armed: Arc<AtomicU64>,
    gateway: Arc<dyn DecoderGateway>,
    device: Arc<dyn OutputDevice>,
    buffer: Duration,
    volume_base: f64,
}

impl PlaybackSession {
    pub fn new(
        gateway: Arc<dyn DecoderGateway>,
        device: Arc<dyn OutputDevice>,
        settings: &AudioSettings,
    ) -> Self {
        let state = SessionState {
            chain: None,
            format: StreamFormat::default(),
            playing: false,
            submitted: false,
            ended: Completion::new(),
            device_rate: None,
            generation: 0,
            volume: settings.initial_volume,
        };
        Self {
            state: Mutex::new(state),
            armed: Arc::new(AtomicU64::new(0)),
            gateway,
            device,
            buffer: Duration::from_millis(settings.buffer_ms),
            volume_base: settings.volume_base,
        }
    }

    /// Load a track, leaving it paused at the start.
    pub fn load(&self, path: &Path) -> Result<(), PlayerError> {
        let mut state = self.state.lock();

        self.armed.store(0, Ordering::Release);
        self.device.clear();
        state.release_chain();
        state.playing = false;
        state.submitted = false;

        let (stream, format) = self.gateway.open(path)?;

        if state.device_rate != Some(format.sample_rate) {
            let buffer_frames = format.frames_in(self.buffer);
            self.device.init(format.sample_rate, buffer_frames)?;
            state.device_rate = Some(format.sample_rate);
        }
        state.format = format;

        let mut volume = VolumeStage::unity(self.volume_base);
        volume.set_linear(state.volume);
        state.chain = Some(Arc::new(Mutex::new(Chain::new(stream, volume))));

        state.ended = Completion::new();
        state.generation += 1;

        tracing::debug!(
            path = %path.display(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "track loaded"
        );
        Ok(())
    }

    /// Start or resume playback from the current position.
    pub fn play(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock();
        self.settle(&mut state);
        self.play_locked(&mut state)
    }

    /// Fold in a completion the render thread reported since the last look.
    fn settle(&self, state: &mut SessionState) {
        if state.playing && self.armed.load(Ordering::Acquire) != state.generation {
            state.playing = false;
            state.submitted = false;
        }
    }

    fn play_locked(&self, state: &mut SessionState) -> Result<(), PlayerError> {
        let chain = state.chain.clone().ok_or(PlayerError::NoTrackLoaded)?;
        if state.playing {
            return Ok(());
        }

        self.device.clear();
        chain.lock().paused = false;
        state.playing = true;
        state.submitted = true;

        self.armed.store(state.generation, Ordering::Release);
        let on_complete =
            completion_callback(self.armed.clone(), state.ended.clone(), state.generation);
        if let Err(e) = self.device.play(chain.clone(), state.format, on_complete) {
            self.armed.store(0, Ordering::Release);
            chain.lock().paused = true;
            state.playing = false;
            state.submitted = false;
            return Err(e);
        }
        Ok(())
    }

    /// Pause in place. No-op when nothing is loaded.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        self.settle(&mut state);
        let Some(chain) = state.chain.clone() else {
            return;
        };
        chain.lock().paused = true;
        state.playing = false;
    }

    /// Flip between playing and paused.
    pub fn toggle(&self) -> Result<(), PlayerError> {
        let mut state = self.state.lock();
        let chain = state.chain.clone().ok_or(PlayerError::NoTrackLoaded)?;
        self.settle(&mut state);
        if !state.submitted && !state.playing {
            return self.play_locked(&mut state);
        }
        let mut c = chain.lock();
        c.paused = !c.paused;
        state.playing = !c.paused;
        Ok(())
    }

    /// Pause, rewind to the start and flush the device. No-op when nothing
    /// is loaded.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        let Some(chain) = state.chain.clone() else {
            return;
        };
        self.armed.store(0, Ordering::Release);
        {
            let mut c = chain.lock();
            c.paused = true;
            if let Err(e) = c.seek(0) {
                tracing::warn!(error = %e, "rewind on stop failed");
            }
        }
        state.playing = false;
        state.submitted = false;
        self.device.clear();
    }

    /// Jump to `pos`. Positions past the end are reported, not clamped.
    pub fn seek(&self, pos: Duration) -> Result<(), PlayerError> {
        let state = self.state.lock();
        let chain = state.chain.as_ref().ok_or(PlayerError::NoTrackLoaded)?;
        let frame = state.format.frames_in(pos);
        chain.lock().seek(frame)
    }

    /// Current playback position; zero when unknown.
    pub fn position(&self) -> Duration {
        let state = self.state.lock();
        let Some(chain) = state.chain.as_ref() else {
            return Duration::ZERO;
        };
        let frames = chain.lock().position();
        frames
            .map(|f| state.format.duration_of(f))
            .unwrap_or(Duration::ZERO)
    }

    /// Length of the loaded track; zero when unknown.
    pub fn duration(&self) -> Duration {
        let state = self.state.lock();
        let Some(chain) = state.chain.as_ref() else {
            return Duration::ZERO;
        };
        let frames = chain.lock().length();
        match frames {
            Some(f) if f > 0 => state.format.duration_of(f),
            _ => Duration::ZERO,
        }
    }

    /// Set a linear gain (1.0 = unity, <= 0 mutes, > 1 amplifies and may clip).
    /// The setting carries over to tracks loaded later.
    pub fn set_volume(&self, linear: f64) {
        let mut state = self.state.lock();
        state.volume = linear;
        if let Some(chain) = state.chain.as_ref() {
            chain.lock().volume.set_linear(linear);
        }
    }

    /// Snapshot of the loaded chain's volume stage.
    pub fn volume_stage(&self) -> Option<VolumeStage> {
        let state = self.state.lock();
        state.chain.as_ref().map(|c| c.lock().volume)
    }

    /// Signal fired when the current track plays to its end. A new signal is
    /// issued on every load.
    pub fn on_ended(&self) -> EndedSignal {
        self.state.lock().ended.signal()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().chain.is_some()
    }

    pub fn is_playing(&self) -> bool {
        let mut state = self.state.lock();
        self.settle(&mut state);
        state.playing
    }

    /// Release the loaded stream. Idempotent.
    pub fn close(&self) {
        self.state.lock().release_chain();
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.device.clear();
        self.close();
    }
}

/// Runs on the render thread, which the device may be joining while the
/// session lock is held, so it must not touch the session state.
fn completion_callback(armed: Arc<AtomicU64>, ended: Completion, generation: u64) -> OnComplete {
    Box::new(move || {
        // A stop or a newer load disarms the generation first.
        if armed
            .compare_exchange(generation, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            ended.fire();
        }
    })
}
