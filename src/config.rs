use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::{ConfigError, LinkError};
use crate::types::SignalRole;

/// Sliding-window size and eviction batch.
///
/// Once more than `max_size` samples have arrived, the oldest `batch_size`
/// entries are dropped in one step every `batch_size` ingests, so after each
/// ingest the window holds `max_size - batch_size + 1 ..= max_size` samples
/// instead of sitting exactly on `max_size`. Build it through [`WindowConfig::new`]
/// or the `window` section of [`AppConfig`]; both reject `batch_size == 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    max_size: usize,
    batch_size: usize,
}

impl WindowConfig {
    pub fn new(max_size: usize, batch_size: usize) -> Result<Self, ConfigError> {
        let config = Self {
            max_size,
            batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 || self.batch_size == 0 || self.batch_size > self.max_size {
            return Err(ConfigError::InvalidWindow {
                max_size: self.max_size,
                batch_size: self.batch_size,
            });
        }
        Ok(())
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upper bound on any buffer length under this policy.
    pub fn peak_len(&self) -> usize {
        self.max_size + self.batch_size
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            batch_size: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub sample_period_ms: u64,
}

impl AcquisitionConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms.max(1))
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        // The chart task ticked once per second.
        Self {
            sample_period_ms: 1000,
        }
    }
}

/// Serial parameters used when opening a port. Framing is fixed at 8N1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl LinkSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout_ms: 10,
        }
    }
}

/// Key to port-name mapping, e.g. `eeg_port -> /dev/ttyUSB0`.
///
/// Lookups happen at connect time, so a missing key only matters for the
/// role that needs it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortMap(BTreeMap<String, String>);

impl PortMap {
    pub fn insert(&mut self, key: impl Into<String>, port: impl Into<String>) {
        self.0.insert(key.into(), port.into());
    }

    pub fn port_for(&self, role: SignalRole) -> Result<&str, LinkError> {
        let key = role.config_key();
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|port| !port.trim().is_empty())
            .ok_or(LinkError::MissingPortKey { key })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ports: PortMap,
    pub window: WindowConfig,
    pub acquisition: AcquisitionConfig,
    pub link: LinkSettings,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.window.validate()?;
        Ok(config)
    }
}
