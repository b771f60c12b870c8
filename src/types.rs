// src/types.rs
use std::fmt;
use std::time::Instant;

use crate::drivers::RecordingSink;

/// One measurement on one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: Instant,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Instant, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Physiological channels the monitor knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelId {
    LeftRostral,
    RightRostral,
    LeftCaudal,
    RightCaudal,
    Ekg,
}

impl ChannelId {
    pub const EEG: [ChannelId; 4] = [
        ChannelId::LeftRostral,
        ChannelId::RightRostral,
        ChannelId::LeftCaudal,
        ChannelId::RightCaudal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChannelId::LeftRostral => "left_rostral",
            ChannelId::RightRostral => "right_rostral",
            ChannelId::LeftCaudal => "left_caudal",
            ChannelId::RightCaudal => "right_caudal",
            ChannelId::Ekg => "ekg",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a serial link is designated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SignalRole {
    Eeg,
    Ekg,
}

impl SignalRole {
    pub const ALL: [SignalRole; 2] = [SignalRole::Eeg, SignalRole::Ekg];

    pub fn channels(self) -> &'static [ChannelId] {
        match self {
            SignalRole::Eeg => &ChannelId::EEG,
            SignalRole::Ekg => &[ChannelId::Ekg],
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            SignalRole::Eeg => "eeg",
            SignalRole::Ekg => "ekg",
        }
    }

    /// Key under which the port name for this role is configured.
    pub fn config_key(self) -> &'static str {
        match self {
            SignalRole::Eeg => "eeg_port",
            SignalRole::Ekg => "ekg_port",
        }
    }
}

impl fmt::Display for SignalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalRole::Eeg => f.write_str("EEG"),
            SignalRole::Ekg => f.write_str("EKG"),
        }
    }
}

/// Connection state of a single serial link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }
}

// Controller -> acquisition thread
pub enum EngineCommand {
    StartRecording(Box<dyn RecordingSink + Send>),
    StopRecording,
    Stop,
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::StartRecording(_) => f.write_str("StartRecording(..)"),
            EngineCommand::StopRecording => f.write_str("StopRecording"),
            EngineCommand::Stop => f.write_str("Stop"),
        }
    }
}

// Acquisition thread -> controller
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    RecordingStatus(bool),
    SinkFailed { channel: ChannelId, message: String },
    LinkLost(String),
    SourceExhausted,
    Stopped,
}
