//! Playback subsystem.
//!
//! A single `PlaybackSession` owns the decoded stream of the loaded track,
//! wires it through a pause stage and a volume stage (`Chain`) and hands the
//! chain to an `OutputDevice` for rendering. Decoding goes through a
//! `DecoderGateway` keyed by file extension.

mod chain;
mod completion;
mod decoder;
mod device;
mod format;
mod session;
mod stream;

pub use chain::{SharedChain, VolumeStage};
pub use completion::EndedSignal;
pub use decoder::{DecoderGateway, DecoderRegistry, OpenedStream, extension_of};
pub use device::{OnComplete, OutputDevice, RodioDevice};
pub use format::StreamFormat;
pub use session::PlaybackSession;
pub use stream::AudioStream;
