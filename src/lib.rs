//! Acquisition core for a bedside EEG/EKG monitor.
//!
//! [`drivers::LinkRegistry`] owns one serial link per signal role,
//! [`drivers::WindowedRecorder`] keeps the per-channel sliding windows in
//! lockstep, and [`engine::spawn`] runs the timer-driven producer that ties
//! them together. Displays read through [`drivers::SnapshotReader`].
pub mod config;
pub mod drivers;
pub mod engine;
pub mod recorder;
pub mod types;

pub use config::{AppConfig, WindowConfig};
pub use drivers::{LinkRegistry, WindowSnapshot, WindowedRecorder};
pub use types::{ChannelId, Sample, SignalRole};
