// src/drivers/mod.rs
pub mod buffer;
pub mod error;
pub mod ports;
pub mod registry;
pub mod serial;
pub mod sink;
pub mod source;
pub mod window;

pub use buffer::ChannelBuffer;
pub use error::{ConfigError, IngestError, LinkError, SourceError};
pub use ports::{Port, PortDriver, SystemPorts};
pub use registry::LinkRegistry;
pub use serial::{LinkHandle, SerialLink};
pub use sink::{MemorySink, RecordingSink};
pub use source::{Frame, ManualSource, SampleSource, SyntheticSource};
pub use window::{IngestReport, SinkFailure, SnapshotReader, WindowSnapshot, WindowedRecorder};
