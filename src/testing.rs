//! Test doubles for the decoder gateway and the output device.
//!
//! The synthetic decoder derives a stream from the file's bytes so scanner
//! tests can use plain text fixtures: each byte becomes `FRAMES_PER_BYTE`
//! frames, and a file starting with `rate=<hz>\n` decodes at that rate.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::PlayerError;
use crate::playback::{
    AudioStream, DecoderRegistry, OnComplete, OpenedStream, OutputDevice, SharedChain,
    StreamFormat,
};

pub const FRAMES_PER_BYTE: usize = 441;
pub const DEFAULT_RATE: u32 = 44_100;

/// Stereo stream of constant 0.5 samples.
pub struct ToneStream {
    channels: usize,
    pos: usize,
    len: usize,
}

impl ToneStream {
    pub fn new(len: usize, channels: u16) -> Self {
        Self {
            channels: usize::from(channels),
            pos: 0,
            len,
        }
    }
}

impl AudioStream for ToneStream {
    fn read(&mut self, buf: &mut [f32]) -> usize {
        let frames = (buf.len() / self.channels).min(self.len - self.pos);
        let n = frames * self.channels;
        buf[..n].fill(0.5);
        self.pos += frames;
        n
    }

    fn seek(&mut self, frame: usize) -> Result<(), PlayerError> {
        if frame > self.len {
            return Err(PlayerError::SeekOutOfRange {
                requested: frame,
                length: self.len,
            });
        }
        self.pos = frame;
        Ok(())
    }

    fn position(&self) -> Option<usize> {
        Some(self.pos)
    }

    fn length(&self) -> Option<usize> {
        Some(self.len)
    }
}

/// A stream that cannot report position or length.
pub struct OpaqueStream(pub ToneStream);

impl AudioStream for OpaqueStream {
    fn read(&mut self, buf: &mut [f32]) -> usize {
        self.0.read(buf)
    }

    fn seek(&mut self, frame: usize) -> Result<(), PlayerError> {
        self.0.seek(frame)
    }
}

fn open_tone(path: &Path) -> Result<OpenedStream, PlayerError> {
    let bytes = fs::read(path).map_err(|e| PlayerError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let rate = std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.strip_prefix("rate="))
        .and_then(|s| s.lines().next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE);
    let format = StreamFormat::new(rate, 2);
    let stream = ToneStream::new(bytes.len() * FRAMES_PER_BYTE, format.channels);
    Ok((Box::new(stream), format))
}

/// Minimal 16-bit PCM WAV: the 44-byte header plus `frames` silent frames.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
    let block_align = channels * 2;
    let data_len = frames * u32::from(block_align);
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    fs::write(path, bytes).unwrap();
}

/// Registry decoding mp3/wav/flac fixtures synthetically.
pub fn tone_registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::default();
    for ext in ["mp3", "wav", "flac"] {
        registry.register(ext, open_tone);
    }
    registry
}

/// Registry whose mp3 decoder yields streams without position/length.
pub fn opaque_registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::default();
    registry.register("mp3", |path| {
        let (_, format) = open_tone(path)?;
        let stream = OpaqueStream(ToneStream::new(1_000, format.channels));
        Ok((Box::new(stream) as Box<dyn AudioStream>, format))
    });
    registry
}

#[derive(Default)]
struct ManualState {
    inits: Vec<(u32, usize)>,
    clears: usize,
    playing: Vec<(SharedChain, Option<OnComplete>)>,
}

/// Output device that renders only when the test calls `pump`.
#[derive(Default)]
pub struct ManualDevice {
    state: Mutex<ManualState>,
}

impl ManualDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inits(&self) -> Vec<(u32, usize)> {
        self.state.lock().inits.clone()
    }

    pub fn clears(&self) -> usize {
        self.state.lock().clears
    }

    pub fn queued(&self) -> usize {
        self.state.lock().playing.len()
    }

    /// Render up to `frames` stereo frames from every queued chain, running
    /// completion callbacks for chains that run dry. Returns samples rendered.
    pub fn pump(&self, frames: usize) -> usize {
        let queued: Vec<SharedChain> = self
            .state
            .lock()
            .playing
            .iter()
            .map(|(c, _)| c.clone())
            .collect();

        let mut rendered = 0;
        let mut finished = Vec::new();
        for (i, chain) in queued.iter().enumerate() {
            let mut buf = vec![0.0; frames * 2];
            let n = chain.lock().render(&mut buf);
            rendered += n;
            if n == 0 {
                finished.push(i);
            }
        }

        let callbacks: Vec<OnComplete> = {
            let mut state = self.state.lock();
            let mut callbacks = Vec::new();
            for i in finished.into_iter().rev() {
                let (_, cb) = state.playing.remove(i);
                callbacks.extend(cb);
            }
            callbacks
        };
        for cb in callbacks {
            cb();
        }
        rendered
    }
}

impl OutputDevice for ManualDevice {
    fn init(&self, sample_rate: u32, buffer_frames: usize) -> Result<(), PlayerError> {
        self.state.lock().inits.push((sample_rate, buffer_frames));
        Ok(())
    }

    fn play(
        &self,
        chain: SharedChain,
        _format: StreamFormat,
        on_complete: OnComplete,
    ) -> Result<(), PlayerError> {
        self.state.lock().playing.push((chain, Some(on_complete)));
        Ok(())
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.clears += 1;
        state.playing.clear();
    }
}

type RenderThread = (Arc<AtomicBool>, JoinHandle<()>);

/// Output device with a real render thread per submitted chain.
///
/// Like a backend tearing down its stream, `init` and `clear` stop and join
/// every render thread before returning, so a completion callback that waits
/// on the caller hangs the test.
#[derive(Default)]
pub struct JoiningDevice {
    renders: Mutex<Vec<RenderThread>>,
}

impl JoiningDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn join_all(&self) {
        let renders = std::mem::take(&mut *self.renders.lock());
        for (skip, _) in &renders {
            skip.store(true, Ordering::Release);
        }
        for (_, handle) in renders {
            let _ = handle.join();
        }
    }
}

impl OutputDevice for JoiningDevice {
    fn init(&self, _sample_rate: u32, _buffer_frames: usize) -> Result<(), PlayerError> {
        self.join_all();
        Ok(())
    }

    fn play(
        &self,
        chain: SharedChain,
        format: StreamFormat,
        on_complete: OnComplete,
    ) -> Result<(), PlayerError> {
        let skip = Arc::new(AtomicBool::new(false));
        let skipped = skip.clone();
        let handle = thread::spawn(move || {
            let mut buf = vec![0.0; 512 * usize::from(format.channels.max(1))];
            while !skipped.load(Ordering::Acquire) {
                let n = chain.lock().render(&mut buf);
                if n == 0 {
                    on_complete();
                    return;
                }
                thread::yield_now();
            }
        });
        self.renders.lock().push((skip, handle));
        Ok(())
    }

    fn clear(&self) {
        self.join_all();
    }
}
