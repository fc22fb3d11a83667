//! Pause and volume stages wrapped around the decoded stream.
//!
//! The chain is shared between the session and the output device. Its mutex
//! is the device lock: the render thread holds it while pulling a buffer, and
//! the session holds it for any direct manipulation of in-flight state.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::PlayerError;

use super::stream::AudioStream;

pub type SharedChain = Arc<Mutex<Chain>>;

/// Logarithmic gain stage: the amplitude factor is `base ^ volume`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStage {
    pub base: f64,
    pub volume: f64,
    pub silent: bool,
}

impl VolumeStage {
    /// Unity gain for the given logarithmic base.
    pub fn unity(base: f64) -> Self {
        Self {
            base,
            volume: 0.0,
            silent: false,
        }
    }

    /// Set a linear gain. Non-positive gains mute; 1.0 is unity.
    pub fn set_linear(&mut self, linear: f64) {
        if linear <= 0.0 {
            self.silent = true;
            self.volume = 0.0;
            return;
        }
        self.silent = false;
        self.volume = linear.ln() / self.base.ln();
    }

    /// Amplitude factor applied to every sample.
    pub fn gain(&self) -> f32 {
        if self.silent {
            0.0
        } else {
            self.base.powf(self.volume) as f32
        }
    }
}

/// Stream -> pause control -> volume.
pub struct Chain {
    source: Option<Box<dyn AudioStream>>,
    pub paused: bool,
    pub volume: VolumeStage,
}

impl Chain {
    /// A chain starts paused.
    pub fn new(source: Box<dyn AudioStream>, volume: VolumeStage) -> Self {
        Self {
            source: Some(source),
            paused: true,
            volume,
        }
    }

    /// Pull the next buffer. While paused the buffer is filled with silence
    /// and the chain never reports exhaustion. Returns zero once the stream
    /// has ended or has been released.
    pub fn render(&mut self, buf: &mut [f32]) -> usize {
        if self.paused {
            buf.fill(0.0);
            return buf.len();
        }
        let Some(source) = self.source.as_mut() else {
            return 0;
        };
        let n = source.read(buf);
        let gain = self.volume.gain();
        if gain != 1.0 {
            for sample in &mut buf[..n] {
                *sample *= gain;
            }
        }
        n
    }

    pub fn seek(&mut self, frame: usize) -> Result<(), PlayerError> {
        match self.source.as_mut() {
            Some(source) => source.seek(frame),
            None => Err(PlayerError::NoTrackLoaded),
        }
    }

    pub fn position(&self) -> Option<usize> {
        self.source.as_ref().and_then(|s| s.position())
    }

    pub fn length(&self) -> Option<usize> {
        self.source.as_ref().and_then(|s| s.length())
    }

    /// Drop the underlying stream. Idempotent.
    pub fn release(&mut self) {
        self.source = None;
    }
}
