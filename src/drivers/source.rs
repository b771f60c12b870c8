use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::SourceError;
use crate::types::ChannelId;

/// One value per channel for a single instant.
pub type Frame = Vec<(ChannelId, f64)>;

/// Something that can yield sample frames on demand.
///
/// `Ok(None)` means the source is exhausted.
pub trait SampleSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Sine carriers with uniform noise, one per channel.
pub struct SyntheticSource {
    channels: Vec<ChannelId>,
    amplitude: f64,
    phase: f64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(channels: &[ChannelId], amplitude: f64) -> Self {
        Self::with_rng(channels, amplitude, StdRng::from_entropy())
    }

    /// Deterministic output for playback and tests.
    pub fn seeded(channels: &[ChannelId], amplitude: f64, seed: u64) -> Self {
        Self::with_rng(channels, amplitude, StdRng::seed_from_u64(seed))
    }

    fn with_rng(channels: &[ChannelId], amplitude: f64, rng: StdRng) -> Self {
        Self {
            channels: channels.to_vec(),
            amplitude: amplitude.abs(),
            phase: 0.0,
            rng,
        }
    }
}

impl SampleSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.phase += 0.1;
        let frame = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let carrier = (self.phase * (i as f64 * 0.1 + 1.0)).sin() * self.amplitude;
                let noise = if self.amplitude > 0.0 {
                    self.rng.gen_range(-0.1..=0.1) * self.amplitude
                } else {
                    0.0
                };
                (id, carrier + noise)
            })
            .collect();
        Ok(Some(frame))
    }
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Frame>,
}

impl ManualSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            queue: frames.into_iter().collect(),
        }
    }
}

impl SampleSource for ManualSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.queue.pop_front())
    }
}
