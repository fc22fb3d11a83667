use std::fs::File;
use std::io::BufReader;

use rodio::{Decoder, Source};

use crate::error::PlayerError;

use super::format::StreamFormat;

/// A seekable, sequential source of decoded, interleaved samples.
pub trait AudioStream: Send {
    /// Fill `buf` with interleaved samples and return how many were written.
    /// Zero means the stream is exhausted.
    fn read(&mut self, buf: &mut [f32]) -> usize;

    /// Move the read cursor to `frame`.
    fn seek(&mut self, frame: usize) -> Result<(), PlayerError>;

    /// Current read position in frames, if the decoder tracks it.
    fn position(&self) -> Option<usize> {
        None
    }

    /// Total length in frames, if the decoder knows it.
    fn length(&self) -> Option<usize> {
        None
    }
}

/// A file decoded by `rodio`.
pub(super) struct DecodedFile {
    decoder: Decoder<BufReader<File>>,
    format: StreamFormat,
    consumed: usize,
    length: Option<usize>,
}

impl DecodedFile {
    pub(super) fn new(decoder: Decoder<BufReader<File>>) -> (Self, StreamFormat) {
        let format = StreamFormat::new(decoder.sample_rate(), decoder.channels());
        let length = decoder.total_duration().map(|d| format.frames_in(d));
        let stream = Self {
            decoder,
            format,
            consumed: 0,
            length,
        };
        (stream, format)
    }

    fn channels(&self) -> usize {
        usize::from(self.format.channels.max(1))
    }
}

impl AudioStream for DecodedFile {
    fn read(&mut self, buf: &mut [f32]) -> usize {
        let mut written = 0;
        for slot in buf.iter_mut() {
            match self.decoder.next() {
                Some(sample) => {
                    *slot = sample;
                    written += 1;
                }
                None => break,
            }
        }
        self.consumed += written;
        written
    }

    fn seek(&mut self, frame: usize) -> Result<(), PlayerError> {
        let out_of_range = PlayerError::SeekOutOfRange {
            requested: frame,
            length: self.length.unwrap_or(0),
        };
        if self.length.is_some_and(|length| frame > length) {
            return Err(out_of_range);
        }
        let consumed = frame.checked_mul(self.channels()).ok_or(out_of_range)?;
        self.decoder
            .try_seek(self.format.duration_of(frame))
            .map_err(|e| PlayerError::Seek(e.to_string()))?;
        self.consumed = consumed;
        Ok(())
    }

    fn position(&self) -> Option<usize> {
        Some(self.consumed / self.channels())
    }

    fn length(&self) -> Option<usize> {
        self.length
    }
}
