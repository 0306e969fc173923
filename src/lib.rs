//! Measurement Agent - periodic 72-dimension data acquisition.
//!
//! A timer fires at a fixed cadence (50 µs by default) and hands each tick to
//! a single deferred worker. The worker reads the power monitor, expands the
//! readings into a 72-element feature vector and appends the result to a
//! bounded buffer, which a consumer drains on demand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Measurement Agent                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  bounded(1)  ┌─────────────┐   ┌─────────────┐   │
//! │  │ SampleTimer │─────────────▶│   Capture   │──▶│ Measurement │   │
//! │  │   (50 µs)   │              │   Worker    │   │   Buffer    │   │
//! │  └─────────────┘              └─────────────┘   └─────────────┘   │
//! │                                 │        │             │          │
//! │                                 ▼        ▼             ▼          │
//! │  ┌─────────────┐         ┌─────────┐ ┌────────┐  ┌───────────┐    │
//! │  │ Pulse line  │────────▶│ Calib.  │ │ Sensor │  │  drain /  │    │
//! │  │   (PPS)     │         │  state  │ │ (INA219)│ │   read    │    │
//! │  └─────────────┘         └─────────┘ └────────┘  └───────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use measurement_agent::{AgentResources, Config, MeasurementAgent};
//!
//! let config = Config::default();
//! let agent = MeasurementAgent::init(&config, AgentResources::simulated(&config))
//!     .expect("Failed to initialize agent");
//!
//! agent.write(b"start").expect("control input rejected");
//! std::thread::sleep(std::time::Duration::from_millis(10));
//! let records = agent.read();
//! println!("{} bytes drained", records.len());
//! ```

pub mod agent;
pub mod config;
pub mod control;
pub mod core;
pub mod diagnostics;
pub mod pulse;
pub mod scheduler;
pub mod sensor;

// Re-export key types at crate root for convenience
pub use agent::{AgentResources, InitError, MeasurementAgent};
pub use config::{Config, ConfigError, SensorConfig};
pub use control::{Command, ControlError, LifecycleState, MAX_COMMAND_LEN};
pub use self::core::{
    decode_records, encode_records, expand_features, CaptureOutcome, CaptureTask,
    Measurement, MeasurementBuffer, DIMENSIONS, RECORD_SIZE,
};
pub use diagnostics::{AcquisitionStats, BatchSummary, StatsSnapshot};
pub use pulse::{PulseLine, PulseSynchronizer, SimulatedPulseLine};
pub use sensor::{PowerMonitor, RegisterBus, SensorError, SimulatedBus};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human-readable description of the wire record layout.
pub const RECORD_LAYOUT: &str = r#"
Measurement record (608 bytes, little-endian, capture order)

  offset  size  type       field
  ------  ----  ---------  ---------------------------------------
       0     8  u64        timestamp   real-time ns since epoch
       8     8  f64        temperature °C
      16     8  f64        energy      J over one sampling interval
      24     8  f64        latency     µs spent in the capture routine
      32   576  72 × f64   dimensions
                             [0]  cycle delta
                             [1]  cycle delta / 1000
                             [2]  energy in µJ
                             [3]  temperature
                             [4]  cycle delta mod 1000
                             [5]  (cycle delta / 10) mod 100
                             [6]  cycle count mod 1000
                             [7]  thermal noise in [0, 1000)
                             [8..72]  [i - 8] × (0.9 + u × 0.001), u in [0, 200)
"#;
