use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ChannelId, SignalRole};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{role} link is already connected to {port}")]
    AlreadyOpen { role: SignalRole, port: String },
    #[error("serial port {port} is unavailable: {source}")]
    DeviceUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("{role} link is not connected")]
    NotConnected { role: SignalRole },
    #[error("handle for {port} was invalidated by a close")]
    HandleInvalidated { port: String },
    #[error("lost connection to {port}: {source}")]
    ConnectionLost {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("no port configured under `{key}`")]
    MissingPortKey { key: &'static str },
    #[error("port {port} is already held by the {holder} link")]
    PortClaimed { port: String, holder: SignalRole },
    #[error("i/o on {port} failed: {source}")]
    Io {
        port: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("sample set is missing channel {0}")]
    MissingChannel(ChannelId),
    #[error("channel {0} is not configured on this recorder")]
    UnknownChannel(ChannelId),
    #[error("channel {0} appears more than once in the sample set")]
    DuplicateChannel(ChannelId),
    #[error("timestamp does not advance past the previous sample")]
    NonMonotonicTimestamp,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid window: max_size {max_size}, batch_size {batch_size} (need 1 <= batch_size <= max_size)")]
    InvalidWindow { max_size: usize, batch_size: usize },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source i/o failed: {0}")]
    Io(#[from] io::Error),
}
