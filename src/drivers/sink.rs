use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::{ChannelId, Sample};

/// Receives every accepted sample while recording is active.
pub trait RecordingSink {
    fn append(&mut self, channel: ChannelId, sample: &Sample) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink. Clones share the same storage, so a caller can keep one
/// clone and hand the other to a recorder.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<(ChannelId, Sample)>>>,
}

impl MemorySink {
    pub fn recorded(&self) -> Vec<(ChannelId, Sample)> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RecordingSink for MemorySink {
    fn append(&mut self, channel: ChannelId, sample: &Sample) -> io::Result<()> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel, *sample));
        Ok(())
    }
}
