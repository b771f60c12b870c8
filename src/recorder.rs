use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::drivers::RecordingSink;
use crate::types::{ChannelId, Sample, SignalRole};

/// Writes accepted samples as `seconds,channel,value` rows.
///
/// Seconds are measured from the first sample the recorder sees.
pub struct CsvRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    origin: Option<Instant>,
    rows: u64,
}

impl CsvRecorder {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "seconds,channel,value")?;
        log::info!("recording started: {}", path.display());
        Ok(Self {
            writer,
            path,
            origin: None,
            rows: 0,
        })
    }

    /// Creates `recording_<role>_<unix-seconds>.csv` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, role: SignalRole) -> io::Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let name = format!("recording_{}_{}.csv", role.slug(), stamp);
        Self::create(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl RecordingSink for CsvRecorder {
    fn append(&mut self, channel: ChannelId, sample: &Sample) -> io::Result<()> {
        let origin = *self.origin.get_or_insert(sample.timestamp);
        let t = sample.timestamp.saturating_duration_since(origin).as_secs_f64();
        writeln!(self.writer, "{:.4},{},{:.3}", t, channel, sample.value)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for CsvRecorder {
    fn drop(&mut self) {
        if self.writer.flush().is_ok() {
            log::info!("recording saved: {} ({} rows)", self.path.display(), self.rows);
        }
    }
}
