//! Sensor access for the measurement agent.
//!
//! The physical register protocol is hidden behind [`RegisterBus`]. The
//! [`PowerMonitor`] adapter turns raw register words into temperature and
//! energy; [`SimulatedBus`] stands in for hardware on hosts without one.

pub mod bus;
pub mod ina219;
pub mod simulated;

// Re-export commonly used types
pub use bus::{RegisterBus, SensorError};
pub use ina219::{PowerMonitor, DEFAULT_ENERGY_J, DEFAULT_TEMPERATURE_C};
pub use simulated::SimulatedBus;
