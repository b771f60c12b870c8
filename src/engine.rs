// src/engine.rs
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::drivers::{LinkError, LinkHandle, RecordingSink, SampleSource, SnapshotReader, WindowedRecorder};
use crate::types::{EngineCommand, EngineEvent};

/// Producer thread plus the channels used to steer it.
///
/// The thread owns the recorder; everyone else sees the window through
/// [`Acquisition::reader`].
pub struct Acquisition {
    tx_cmd: Sender<EngineCommand>,
    rx: Receiver<EngineEvent>,
    reader: SnapshotReader,
    thread: Option<JoinHandle<WindowedRecorder>>,
}

/// Starts sampling `source` every `period` into `recorder`.
///
/// With a `link`, pending bytes are drained each tick and the loop ends as
/// soon as the handle stops being valid.
pub fn spawn(
    recorder: WindowedRecorder,
    source: Box<dyn SampleSource + Send>,
    period: Duration,
    link: Option<LinkHandle>,
) -> io::Result<Acquisition> {
    let (tx, rx) = mpsc::channel();
    let (tx_cmd, rx_cmd) = mpsc::channel();
    let reader = recorder.reader();
    let thread = thread::Builder::new()
        .name("acquisition".into())
        .spawn(move || run(recorder, source, period, link, rx_cmd, tx))?;
    Ok(Acquisition {
        tx_cmd,
        rx,
        reader,
        thread: Some(thread),
    })
}

impl Acquisition {
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn start_recording(&self, sink: Box<dyn RecordingSink + Send>) {
        self.tx_cmd.send(EngineCommand::StartRecording(sink)).ok();
    }

    pub fn stop_recording(&self) {
        self.tx_cmd.send(EngineCommand::StopRecording).ok();
    }

    /// Events emitted so far, without waiting.
    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the thread and hands the recorder back.
    pub fn stop(mut self) -> Option<WindowedRecorder> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<WindowedRecorder> {
        let thread = self.thread.take()?;
        self.tx_cmd.send(EngineCommand::Stop).ok();
        match thread.join() {
            Ok(recorder) => Some(recorder),
            Err(_) => {
                log::error!("acquisition thread panicked");
                None
            }
        }
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut recorder: WindowedRecorder,
    mut source: Box<dyn SampleSource + Send>,
    period: Duration,
    link: Option<LinkHandle>,
    rx_cmd: Receiver<EngineCommand>,
    tx: Sender<EngineEvent>,
) -> WindowedRecorder {
    log::info!("acquisition started, period {period:?}");
    let mut scratch = [0u8; 512];
    let mut next_tick = Instant::now() + period;

    loop {
        // 1. commands, waiting out the rest of the period
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx_cmd.recv_timeout(wait) {
            Ok(EngineCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(EngineCommand::StartRecording(sink)) => {
                recorder.start_recording(sink);
                tx.send(EngineEvent::RecordingStatus(true)).ok();
                continue;
            }
            Ok(EngineCommand::StopRecording) => {
                if recorder.stop_recording().is_some() {
                    tx.send(EngineEvent::RecordingStatus(false)).ok();
                }
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        let now = Instant::now();
        next_tick += period;
        if next_tick <= now {
            // fell behind; resync instead of bursting
            next_tick = now + period;
        }

        // 2. link liveness. Frames are not decoded from the wire; the bytes
        // are drained so the driver's receive buffer stays empty.
        if let Some(handle) = &link {
            match handle.read(&mut scratch) {
                Ok(n) => log::trace!("drained {n} bytes from {}", handle.port_name()),
                Err(err) => {
                    match &err {
                        LinkError::HandleInvalidated { .. } => log::info!("{err}; stopping acquisition"),
                        _ => log::warn!("{err}; stopping acquisition"),
                    }
                    tx.send(EngineEvent::LinkLost(handle.port_name().to_owned()))
                        .ok();
                    break;
                }
            }
        }

        // 3. sample
        match source.next_frame() {
            Ok(Some(frame)) => match recorder.ingest(&frame, Instant::now()) {
                Ok(report) => {
                    for failure in report.sink_failures {
                        tx.send(EngineEvent::SinkFailed {
                            channel: failure.channel,
                            message: failure.message,
                        })
                        .ok();
                    }
                }
                Err(err) => log::warn!("dropped sample set: {err}"),
            },
            Ok(None) => {
                log::info!("sample source exhausted");
                tx.send(EngineEvent::SourceExhausted).ok();
                break;
            }
            Err(err) => log::warn!("sample source failed: {err}"),
        }
    }

    if recorder.stop_recording().is_some() {
        tx.send(EngineEvent::RecordingStatus(false)).ok();
    }
    log::info!("acquisition stopped");
    tx.send(EngineEvent::Stopped).ok();
    recorder
}
