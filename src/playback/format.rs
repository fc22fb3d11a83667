use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Sample rate and channel layout of a decoded stream.
///
/// Positions and lengths are counted in frames (one sample per channel).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of whole frames that fit in `d` at this sample rate, saturating
    /// at `usize::MAX`.
    pub fn frames_in(&self, d: Duration) -> usize {
        let frames = d.as_nanos() * u128::from(self.sample_rate) / NANOS_PER_SEC;
        usize::try_from(frames).unwrap_or(usize::MAX)
    }

    /// Playback time covered by `frames` frames.
    pub fn duration_of(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = frames as u128 * NANOS_PER_SEC / u128::from(self.sample_rate);
        Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }
}
