use std::collections::VecDeque;

use crate::types::Sample;

/// FIFO of recent samples for a single channel.
///
/// The buffer itself never rejects or drops on append; trimming is driven by
/// the owning [`WindowedRecorder`](crate::drivers::WindowedRecorder) so every
/// channel is evicted in the same step.
#[derive(Clone, Debug, Default)]
pub struct ChannelBuffer {
    data: VecDeque<Sample>,
}

impl ChannelBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, sample: Sample) {
        self.data.push_back(sample);
    }

    /// Removes up to `n` of the oldest samples and returns how many were removed.
    pub fn evict_oldest(&mut self, n: usize) -> usize {
        let n = n.min(self.data.len());
        self.data.drain(..n);
        n
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.data.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.data.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
