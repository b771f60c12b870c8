use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::config::WindowConfig;
use crate::drivers::{ChannelBuffer, ConfigError, IngestError, RecordingSink};
use crate::types::{ChannelId, Sample};

/// Point-in-time copy of a recorder's window. Every sequence has the same length
/// and channels appear in the order the recorder was configured with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowSnapshot {
    pub axis: Vec<Instant>,
    pub channels: Vec<(ChannelId, Vec<Sample>)>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn channel(&self, id: ChannelId) -> Option<&[Sample]> {
        self.channels
            .iter()
            .find(|(channel, _)| *channel == id)
            .map(|(_, samples)| samples.as_slice())
    }

    /// Axis labels in seconds relative to the oldest retained sample.
    pub fn axis_seconds(&self) -> Vec<f64> {
        let Some(origin) = self.axis.first().copied() else {
            return Vec::new();
        };
        self.axis
            .iter()
            .map(|t| t.duration_since(origin).as_secs_f64())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkFailure {
    pub channel: ChannelId,
    pub message: String,
}

/// Outcome of an accepted ingest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub evicted: usize,
    pub sink_failures: Vec<SinkFailure>,
}

struct Window {
    axis: VecDeque<Instant>,
    buffers: Vec<(ChannelId, ChannelBuffer)>,
}

impl Window {
    fn new(channels: &[ChannelId], capacity: usize) -> Self {
        Self {
            axis: VecDeque::with_capacity(capacity),
            buffers: channels
                .iter()
                .map(|&id| (id, ChannelBuffer::with_capacity(capacity)))
                .collect(),
        }
    }

    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            axis: self.axis.iter().copied().collect(),
            channels: self
                .buffers
                .iter()
                .map(|(id, buffer)| (*id, buffer.snapshot()))
                .collect(),
        }
    }

    // `values` is in buffer order.
    fn push(&mut self, timestamp: Instant, values: &[f64]) {
        self.axis.push_back(timestamp);
        for ((_, buffer), &value) in self.buffers.iter_mut().zip(values) {
            buffer.append(Sample::new(timestamp, value));
        }
    }

    fn evict(&mut self, n: usize) -> usize {
        let n = n.min(self.axis.len());
        self.axis.drain(..n);
        for (_, buffer) in &mut self.buffers {
            buffer.evict_oldest(n);
        }
        n
    }
}

fn read_window(shared: &RwLock<Window>) -> RwLockReadGuard<'_, Window> {
    shared.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_window(shared: &RwLock<Window>) -> RwLockWriteGuard<'_, Window> {
    shared.write().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only view onto a recorder, cheap to clone and share with render threads.
#[derive(Clone)]
pub struct SnapshotReader {
    shared: Arc<RwLock<Window>>,
}

impl SnapshotReader {
    pub fn snapshot(&self) -> WindowSnapshot {
        read_window(&self.shared).snapshot()
    }

    pub fn len(&self) -> usize {
        read_window(&self.shared).axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps one buffer per channel and a shared time axis in lockstep.
///
/// The recorder is the only writer: `ingest` takes `&mut self` and the type is
/// not `Clone`. Readers go through [`SnapshotReader`] and only ever copy under
/// the lock, so the writer waits at most for one copy.
pub struct WindowedRecorder {
    channels: Vec<ChannelId>,
    config: WindowConfig,
    shared: Arc<RwLock<Window>>,
    last_timestamp: Option<Instant>,
    ingested: usize,
    checkpoint: usize,
    recording: Option<Box<dyn RecordingSink + Send>>,
}

impl WindowedRecorder {
    pub fn new(channels: &[ChannelId], config: WindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = Window::new(channels, config.peak_len());
        Ok(Self {
            channels: channels.to_vec(),
            config,
            shared: Arc::new(RwLock::new(window)),
            last_timestamp: None,
            ingested: 0,
            checkpoint: config.max_size() - config.batch_size(),
            recording: None,
        })
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        read_window(&self.shared).snapshot()
    }

    pub fn start_recording(&mut self, sink: Box<dyn RecordingSink + Send>) {
        if let Some(mut previous) = self.recording.replace(sink) {
            if let Err(err) = previous.flush() {
                log::warn!("failed to flush replaced recording sink: {err}");
            }
        }
    }

    /// Detaches the active sink, flushing it first.
    pub fn stop_recording(&mut self) -> Option<Box<dyn RecordingSink + Send>> {
        let mut sink = self.recording.take()?;
        if let Err(err) = sink.flush() {
            log::warn!("failed to flush recording sink: {err}");
        }
        Some(sink)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Adds one value per configured channel at `timestamp`.
    ///
    /// The set must match the configured channels exactly and the timestamp
    /// must be later than the previous one; otherwise nothing is applied.
    pub fn ingest(
        &mut self,
        values: &[(ChannelId, f64)],
        timestamp: Instant,
    ) -> Result<IngestReport, IngestError> {
        let ordered = self.order_values(values)?;
        if self.last_timestamp.is_some_and(|last| timestamp <= last) {
            return Err(IngestError::NonMonotonicTimestamp);
        }

        let mut report = IngestReport::default();
        {
            let mut window = write_window(&self.shared);
            window.push(timestamp, &ordered);
            self.ingested += 1;
            let batch = self.config.batch_size();
            if self.ingested > self.checkpoint + batch {
                report.evicted = window.evict(batch);
                self.checkpoint += batch;
            }
        }
        self.last_timestamp = Some(timestamp);
        if report.evicted > 0 {
            log::trace!("evicted {} samples per channel", report.evicted);
        }

        if let Some(sink) = self.recording.as_mut() {
            for (&channel, &value) in self.channels.iter().zip(&ordered) {
                if let Err(err) = sink.append(channel, &Sample::new(timestamp, value)) {
                    log::warn!("recording sink rejected {channel} sample: {err}");
                    report.sink_failures.push(SinkFailure {
                        channel,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn order_values(&self, values: &[(ChannelId, f64)]) -> Result<Vec<f64>, IngestError> {
        let mut ordered: Vec<Option<f64>> = vec![None; self.channels.len()];
        for &(id, value) in values {
            let slot = self
                .channels
                .iter()
                .position(|&c| c == id)
                .ok_or(IngestError::UnknownChannel(id))?;
            if ordered[slot].replace(value).is_some() {
                return Err(IngestError::DuplicateChannel(id));
            }
        }
        self.channels
            .iter()
            .zip(ordered)
            .map(|(&id, value)| value.ok_or(IngestError::MissingChannel(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use crate::drivers::MemorySink;

    fn eeg_frame(value: f64) -> Vec<(ChannelId, f64)> {
        ChannelId::EEG.iter().map(|&id| (id, value)).collect()
    }

    fn recorder(max_size: usize, batch_size: usize) -> WindowedRecorder {
        WindowedRecorder::new(
            &ChannelId::EEG,
            WindowConfig::new(max_size, batch_size).unwrap(),
        )
        .unwrap()
    }

    fn assert_lockstep(snapshot: &WindowSnapshot) {
        for (_, samples) in &snapshot.channels {
            assert_eq!(samples.len(), snapshot.axis.len());
        }
    }

    #[test]
    fn hundred_and_five_samples_settle_inside_window() {
        let mut rec = recorder(100, 10);
        let t0 = Instant::now();
        for i in 0..105 {
            rec.ingest(&eeg_frame(i as f64), t0 + Duration::from_millis(i))
                .unwrap();
        }
        let snapshot = rec.snapshot();
        assert!((90..=100).contains(&snapshot.len()), "len {}", snapshot.len());
        assert_eq!(snapshot.channels.len(), 4);
        assert_lockstep(&snapshot);
        // oldest retained value lines up with the axis
        let first = snapshot.channel(ChannelId::LeftCaudal).unwrap()[0];
        assert_eq!(first.timestamp, snapshot.axis[0]);
        assert_eq!(first.value, 10.0);
    }

    #[test]
    fn first_ingest_keeps_its_sample() {
        let mut rec = WindowedRecorder::new(&[ChannelId::Ekg], WindowConfig::default()).unwrap();
        let t0 = Instant::now();
        let report = rec.ingest(&[(ChannelId::Ekg, 1.0)], t0).unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(rec.snapshot().len(), 1);

        for i in 1..100u64 {
            let report = rec
                .ingest(&[(ChannelId::Ekg, 1.0)], t0 + Duration::from_millis(i))
                .unwrap();
            assert_eq!(report.evicted, 0, "evicted early at {i}");
        }
        assert_eq!(rec.snapshot().len(), 100);
    }

    #[test]
    fn rejects_unbounded_window_config() {
        // deserializing a bare section skips AppConfig's validation
        let config: WindowConfig = serde_json::from_str(r#"{ "batch_size": 0 }"#).unwrap();
        assert!(matches!(
            WindowedRecorder::new(&ChannelId::EEG, config),
            Err(ConfigError::InvalidWindow { batch_size: 0, .. })
        ));
    }

    #[test]
    fn snapshot_keeps_configured_channel_order() {
        let order = [ChannelId::Ekg, ChannelId::RightCaudal, ChannelId::LeftRostral];
        let mut rec = WindowedRecorder::new(&order, WindowConfig::default()).unwrap();
        let frame: Vec<_> = order.iter().map(|&id| (id, 0.0)).collect();
        rec.ingest(&frame, Instant::now()).unwrap();
        let listed: Vec<ChannelId> = rec.snapshot().channels.iter().map(|(id, _)| *id).collect();
        assert_eq!(listed, order);
    }

    #[test]
    fn eviction_is_batched_and_bounded() {
        let (max, batch) = (40, 8);
        let mut rec = recorder(max, batch);
        let t0 = Instant::now();
        let mut evictions = Vec::new();
        for i in 0..500u64 {
            let report = rec
                .ingest(&eeg_frame(1.0), t0 + Duration::from_micros(i))
                .unwrap();
            if report.evicted > 0 {
                assert_eq!(report.evicted, batch);
                evictions.push(i);
            }
            let len = rec.snapshot().len();
            if i as usize >= max {
                assert!(len >= max - batch && len <= max + batch, "len {len} at {i}");
            }
        }
        assert_eq!(evictions[0], max as u64);
        for pair in evictions.windows(2) {
            assert_eq!(pair[1] - pair[0], batch as u64);
        }
    }

    #[test]
    fn missing_channel_leaves_window_untouched() {
        let mut rec = recorder(10, 2);
        let t0 = Instant::now();
        rec.ingest(&eeg_frame(1.0), t0).unwrap();
        let before = rec.snapshot();

        let mut partial = eeg_frame(2.0);
        partial.pop();
        let err = rec
            .ingest(&partial, t0 + Duration::from_millis(1))
            .unwrap_err();
        assert_eq!(err, IngestError::MissingChannel(ChannelId::RightCaudal));
        assert_eq!(rec.snapshot(), before);
    }

    #[test]
    fn rejects_foreign_and_repeated_channels() {
        let mut rec = recorder(10, 2);
        let t0 = Instant::now();
        let mut foreign = eeg_frame(1.0);
        foreign.push((ChannelId::Ekg, 1.0));
        assert_eq!(
            rec.ingest(&foreign, t0),
            Err(IngestError::UnknownChannel(ChannelId::Ekg))
        );

        let mut repeated = eeg_frame(1.0);
        repeated[3] = (ChannelId::LeftRostral, 5.0);
        assert_eq!(
            rec.ingest(&repeated, t0),
            Err(IngestError::DuplicateChannel(ChannelId::LeftRostral))
        );
        assert!(rec.snapshot().is_empty());
    }

    #[test]
    fn values_are_routed_by_channel_not_position() {
        let mut rec = recorder(10, 2);
        let frame = vec![
            (ChannelId::RightCaudal, 4.0),
            (ChannelId::LeftRostral, 1.0),
            (ChannelId::LeftCaudal, 3.0),
            (ChannelId::RightRostral, 2.0),
        ];
        rec.ingest(&frame, Instant::now()).unwrap();
        let snapshot = rec.snapshot();
        for (id, expected) in ChannelId::EEG.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert_eq!(snapshot.channel(*id).unwrap()[0].value, expected);
        }
    }

    #[test]
    fn timestamps_must_advance() {
        let mut rec = recorder(10, 2);
        let t0 = Instant::now();
        rec.ingest(&eeg_frame(1.0), t0 + Duration::from_millis(5))
            .unwrap();
        assert_eq!(
            rec.ingest(&eeg_frame(1.0), t0 + Duration::from_millis(5)),
            Err(IngestError::NonMonotonicTimestamp)
        );
        assert_eq!(
            rec.ingest(&eeg_frame(1.0), t0),
            Err(IngestError::NonMonotonicTimestamp)
        );
        assert_eq!(rec.snapshot().len(), 1);
    }

    #[test]
    fn recording_observes_every_accepted_sample() {
        let mut rec = WindowedRecorder::new(&[ChannelId::Ekg], WindowConfig::new(4, 2).unwrap()).unwrap();
        let sink = MemorySink::default();
        let t0 = Instant::now();
        rec.ingest(&[(ChannelId::Ekg, 0.5)], t0).unwrap();
        rec.start_recording(Box::new(sink.clone()));
        for i in 1..=3 {
            rec.ingest(&[(ChannelId::Ekg, i as f64)], t0 + Duration::from_millis(i))
                .unwrap();
        }
        assert!(rec.ingest(&[], t0 + Duration::from_millis(9)).is_err());
        assert!(rec.is_recording());
        assert!(rec.stop_recording().is_some());
        assert!(!rec.is_recording());
        assert!(rec.stop_recording().is_none());
        rec.ingest(&[(ChannelId::Ekg, 7.0)], t0 + Duration::from_millis(10))
            .unwrap();

        let recorded: Vec<f64> = sink.recorded().iter().map(|(_, s)| s.value).collect();
        assert_eq!(recorded, vec![1.0, 2.0, 3.0]);
        assert!(sink.recorded().iter().all(|(id, _)| *id == ChannelId::Ekg));
    }

    struct FailingSink;

    impl RecordingSink for FailingSink {
        fn append(&mut self, _: ChannelId, _: &Sample) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn sink_failure_does_not_fail_ingest() {
        let mut rec = recorder(10, 2);
        rec.start_recording(Box::new(FailingSink));
        let report = rec.ingest(&eeg_frame(3.0), Instant::now()).unwrap();
        assert_eq!(report.sink_failures.len(), 4);
        assert_eq!(report.sink_failures[0].message, "disk full");
        assert_eq!(rec.snapshot().len(), 1);
    }

    #[test]
    fn axis_seconds_are_relative_to_oldest() {
        let mut rec = WindowedRecorder::new(&[ChannelId::Ekg], WindowConfig::new(10, 1).unwrap()).unwrap();
        let t0 = Instant::now();
        for i in 0..3 {
            rec.ingest(&[(ChannelId::Ekg, 0.0)], t0 + Duration::from_millis(500 * i))
                .unwrap();
        }
        assert_eq!(rec.snapshot().axis_seconds(), vec![0.0, 0.5, 1.0]);
        assert!(WindowSnapshot::default().axis_seconds().is_empty());
    }

    #[test]
    fn concurrent_readers_never_see_torn_windows() {
        let mut rec = recorder(64, 16);
        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let reader = rec.reader();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut observed = 0usize;
                    loop {
                        let snapshot = reader.snapshot();
                        assert_lockstep(&snapshot);
                        assert!(snapshot.len() <= 64 + 16);
                        observed += 1;
                        if done.load(Ordering::Relaxed) {
                            break observed;
                        }
                    }
                })
            })
            .collect();

        let t0 = Instant::now();
        for i in 0..5_000u64 {
            rec.ingest(&eeg_frame(i as f64), t0 + Duration::from_micros(i))
                .unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for handle in readers {
            assert!(handle.join().unwrap() > 0);
        }
        assert_eq!(rec.reader().len(), rec.snapshot().len());
    }
}
