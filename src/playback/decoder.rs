//! Extension-keyed decoder registry.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::Decoder;
use rodio::decoder::DecoderError;

use crate::error::PlayerError;

use super::format::StreamFormat;
use super::stream::{AudioStream, DecodedFile};

/// A freshly opened stream together with its format descriptor.
pub type OpenedStream = (Box<dyn AudioStream>, StreamFormat);

type OpenFn = Box<dyn Fn(&Path) -> Result<OpenedStream, PlayerError> + Send + Sync>;

/// Maps a file to a decoded, seekable stream.
pub trait DecoderGateway: Send + Sync {
    /// Open `path` with the decoder registered for its extension.
    fn open(&self, path: &Path) -> Result<OpenedStream, PlayerError>;
}

/// Lowercased file extension without the dot; empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Decoders keyed by lowercased extension.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, OpenFn>,
}

impl DecoderRegistry {
    /// Registry with the `rodio` decoders for mp3, wav and flac.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register("mp3", |path| open_with(path, Decoder::new_mp3));
        registry.register("wav", |path| open_with(path, Decoder::new_wav));
        registry.register("flac", |path| open_with(path, Decoder::new_flac));
        registry
    }

    /// Register (or replace) the decoder for `ext`.
    pub fn register<F>(&mut self, ext: &str, open: F)
    where
        F: Fn(&Path) -> Result<OpenedStream, PlayerError> + Send + Sync + 'static,
    {
        let key = ext.trim_start_matches('.').to_ascii_lowercase();
        self.decoders.insert(key, Box::new(open));
    }
}

impl DecoderGateway for DecoderRegistry {
    fn open(&self, path: &Path) -> Result<OpenedStream, PlayerError> {
        let ext = extension_of(path);
        let open = self
            .decoders
            .get(&ext)
            .ok_or(PlayerError::UnsupportedFormat(ext))?;
        open(path)
    }
}

fn open_with(
    path: &Path,
    decode: fn(BufReader<File>) -> Result<Decoder<BufReader<File>>, DecoderError>,
) -> Result<OpenedStream, PlayerError> {
    let decode_err = |reason: String| PlayerError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;
    let decoder = decode(BufReader::new(file)).map_err(|e| decode_err(e.to_string()))?;
    let (stream, format) = DecodedFile::new(decoder);
    Ok((Box::new(stream), format))
}
