//! Output device seam and the `rodio`-backed implementation.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rodio::cpal::BufferSize;
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source};

use crate::error::PlayerError;

use super::chain::SharedChain;
use super::format::StreamFormat;

/// Invoked by the render thread once the chain is exhausted.
pub type OnComplete = Box<dyn FnOnce() + Send>;

/// The audio output the session renders into.
///
/// `init` and `clear` may block until the render thread lets go of what it
/// was playing. Implementations must release the chain lock before running
/// `on_complete`, which never blocks on the session.
pub trait OutputDevice: Send + Sync {
    /// (Re)configure the device for `sample_rate` with a buffer of
    /// `buffer_frames` frames.
    fn init(&self, sample_rate: u32, buffer_frames: usize) -> Result<(), PlayerError>;

    /// Start rendering `chain`, calling `on_complete` when it runs dry.
    fn play(
        &self,
        chain: SharedChain,
        format: StreamFormat,
        on_complete: OnComplete,
    ) -> Result<(), PlayerError>;

    /// Drop everything queued for rendering.
    fn clear(&self);
}

enum DeviceCmd {
    Init {
        sample_rate: u32,
        buffer_frames: usize,
        reply: Sender<Result<(), PlayerError>>,
    },
    Play {
        source: ChainSource,
        reply: Sender<Result<(), PlayerError>>,
    },
    Clear,
}

/// Default output device.
///
/// `rodio`'s `OutputStream` is not guaranteed to be `Send`, so it lives on a
/// dedicated device thread that is driven over a command channel.
pub struct RodioDevice {
    tx: Mutex<Sender<DeviceCmd>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl RodioDevice {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<DeviceCmd>();
        let join = thread::Builder::new()
            .name("allegro-device".into())
            .spawn(move || device_thread(rx))
            .ok();
        if join.is_none() {
            tracing::error!("failed to spawn the audio device thread");
        }
        Self {
            tx: Mutex::new(tx),
            join: Mutex::new(join),
        }
    }

    fn request(
        &self,
        cmd: impl FnOnce(Sender<Result<(), PlayerError>>) -> DeviceCmd,
    ) -> Result<(), PlayerError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .lock()
            .send(cmd(reply))
            .map_err(|_| PlayerError::Device("device thread is gone".into()))?;
        rx.recv()
            .map_err(|_| PlayerError::Device("device thread is gone".into()))?
    }
}

impl Default for RodioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        // Closing the channel ends the device thread.
        let (dead, _) = mpsc::channel();
        *self.tx.lock() = dead;
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.join();
        }
    }
}

impl OutputDevice for RodioDevice {
    fn init(&self, sample_rate: u32, buffer_frames: usize) -> Result<(), PlayerError> {
        self.request(|reply| DeviceCmd::Init {
            sample_rate,
            buffer_frames,
            reply,
        })
    }

    fn play(
        &self,
        chain: SharedChain,
        format: StreamFormat,
        on_complete: OnComplete,
    ) -> Result<(), PlayerError> {
        let source = ChainSource::new(chain, format, on_complete);
        self.request(|reply| DeviceCmd::Play { source, reply })
    }

    fn clear(&self) {
        let _ = self.tx.lock().send(DeviceCmd::Clear);
    }
}

struct Output {
    // Dropping the stream silences the sink.
    _stream: OutputStream,
    sink: Sink,
}

fn device_thread(rx: Receiver<DeviceCmd>) {
    let mut output: Option<Output> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            DeviceCmd::Init {
                sample_rate,
                buffer_frames,
                reply,
            } => {
                // Tear the old stream down first; some backends refuse a
                // second stream on the same device.
                output = None;
                let result = open_output(sample_rate, buffer_frames).map(|o| {
                    output = Some(o);
                });
                if result.is_ok() {
                    tracing::info!(sample_rate, buffer_frames, "audio output initialised");
                }
                let _ = reply.send(result);
            }
            DeviceCmd::Play { source, reply } => {
                let result = match output.as_ref() {
                    Some(o) => {
                        o.sink.append(source);
                        o.sink.play();
                        Ok(())
                    }
                    None => Err(PlayerError::Device("output not initialised".into())),
                };
                let _ = reply.send(result);
            }
            DeviceCmd::Clear => {
                if let Some(o) = output.as_ref() {
                    o.sink.clear();
                }
            }
        }
    }
}

fn open_output(sample_rate: u32, buffer_frames: usize) -> Result<Output, PlayerError> {
    let mut stream = OutputStreamBuilder::from_default_device()
        .map_err(|e| PlayerError::Device(e.to_string()))?
        .with_sample_rate(sample_rate)
        .with_buffer_size(BufferSize::Fixed(buffer_frames as u32))
        .open_stream_or_fallback()
        .map_err(|e| PlayerError::Device(e.to_string()))?;
    // rodio logs to stderr when the stream is dropped, which happens on every
    // sample-rate change.
    stream.log_on_drop(false);
    let sink = Sink::connect_new(stream.mixer());
    Ok(Output {
        _stream: stream,
        sink,
    })
}

const RENDER_FRAMES: usize = 512;

/// Adapts a `SharedChain` to a `rodio::Source`, pulling a block at a time
/// under the chain lock.
struct ChainSource {
    chain: SharedChain,
    format: StreamFormat,
    buf: Vec<f32>,
    pos: usize,
    len: usize,
    on_complete: Option<OnComplete>,
}

impl ChainSource {
    fn new(chain: SharedChain, format: StreamFormat, on_complete: OnComplete) -> Self {
        let channels = usize::from(format.channels.max(1));
        Self {
            chain,
            format,
            buf: vec![0.0; RENDER_FRAMES * channels],
            pos: 0,
            len: 0,
            on_complete: Some(on_complete),
        }
    }
}

impl Iterator for ChainSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos < self.len {
            let sample = self.buf[self.pos];
            self.pos += 1;
            return Some(sample);
        }
        self.on_complete.as_ref()?;

        let n = self.chain.lock().render(&mut self.buf);
        if n == 0 {
            // Chain lock is already released here.
            if let Some(done) = self.on_complete.take() {
                done();
            }
            return None;
        }
        self.len = n;
        self.pos = 1;
        Some(self.buf[0])
    }
}

impl Source for ChainSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.format.channels.max(1)
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
