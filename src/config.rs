//! Configuration for the measurement agent.
//!
//! Everything here is read once at initialization. Buffer capacity and the
//! dimension count cannot change while an agent is alive.

use crate::core::buffer::DEFAULT_CAPACITY;
use crate::pulse::DEFAULT_PULSE_INTERVAL;
use crate::scheduler::DEFAULT_SAMPLE_PERIOD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Nominal timer period
    #[serde(with = "duration_micros")]
    pub sample_period: Duration,

    /// Measurements held between drains
    pub buffer_capacity: usize,

    /// Interval of the simulated pulse line
    #[serde(with = "duration_millis")]
    pub pulse_interval: Duration,

    /// Seed for the noise generators; random when absent
    pub noise_seed: Option<u64>,

    /// Simulated sensor behaviour
    pub sensor: SensorConfig,

    /// Directory for drained measurement files
    pub export_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("measurement-agent");

        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            buffer_capacity: DEFAULT_CAPACITY,
            pulse_interval: DEFAULT_PULSE_INTERVAL,
            noise_seed: None,
            sensor: SensorConfig::default(),
            export_path: data_dir.join("exports"),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("measurement-agent")
            .join("config.json")
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_period.is_zero() {
            return Err(ConfigError::Invalid("sample_period must be non-zero".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("buffer_capacity must be non-zero".into()));
        }
        if self.pulse_interval.is_zero() {
            return Err(ConfigError::Invalid("pulse_interval must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.sensor.fault_rate) {
            return Err(ConfigError::Invalid(
                "sensor.fault_rate must be within 0.0-1.0".into(),
            ));
        }
        Ok(())
    }

    /// Ensure the export directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Register words and fault injection for the simulated sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Shunt voltage register word (10 µV per LSB)
    pub shunt_voltage: u16,
    /// Bus voltage register word (4 mV per LSB in bits 15..3)
    pub bus_voltage: u16,
    /// Probability that a register transfer fails
    pub fault_rate: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            shunt_voltage: 2100,
            bus_voltage: 1250 << 3,
            fault_rate: 0.0,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole microseconds.
mod duration_micros {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_micros() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
