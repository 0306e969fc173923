//! Simulated register bus.
//!
//! This exists so the agent (and binary) can run on hosts without the
//! physical power monitor. Register words are fixed; transfers can be made to
//! fail at a configurable rate to exercise the fallback paths.

use crate::sensor::bus::{RegisterBus, SensorError};
use crate::sensor::ina219::{REG_BUS_VOLTAGE, REG_SHUNT_VOLTAGE};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Log of `(address, value)` register writes, shared with the caller.
pub type WriteLog = Arc<Mutex<Vec<(u8, u16)>>>;

/// A register bus backed by fixed values.
pub struct SimulatedBus {
    shunt_voltage: u16,
    bus_voltage: u16,
    present: bool,
    fault_rate: f64,
    rng: ChaCha8Rng,
    writes: WriteLog,
}

impl SimulatedBus {
    /// A healthy bus returning the given shunt and bus voltage words.
    pub fn new(shunt_voltage: u16, bus_voltage: u16) -> Self {
        Self {
            shunt_voltage,
            bus_voltage,
            present: true,
            fault_rate: 0.0,
            rng: ChaCha8Rng::seed_from_u64(0),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A bus with no device attached; every transfer fails.
    pub fn absent() -> Self {
        let mut bus = Self::new(0, 0);
        bus.present = false;
        bus
    }

    /// Fail each transfer with probability `rate` (0.0–1.0).
    pub fn with_fault_rate(mut self, rate: f64, seed: Option<u64>) -> Self {
        self.fault_rate = rate.clamp(0.0, 1.0);
        self.rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        self
    }

    /// Handle to the register writes issued so far.
    pub fn write_log(&self) -> WriteLog {
        self.writes.clone()
    }

    fn transfer(&mut self, address: u8) -> Result<(), SensorError> {
        if !self.present {
            return Err(SensorError::NotPresent);
        }
        if self.fault_rate > 0.0 && self.rng.gen::<f64>() < self.fault_rate {
            return Err(SensorError::Io {
                address,
                reason: "injected transfer fault".to_string(),
            });
        }
        Ok(())
    }
}

impl RegisterBus for SimulatedBus {
    fn read_register(&mut self, address: u8) -> Result<u16, SensorError> {
        self.transfer(address)?;
        match address {
            REG_SHUNT_VOLTAGE => Ok(self.shunt_voltage),
            REG_BUS_VOLTAGE => Ok(self.bus_voltage),
            _ => Ok(0),
        }
    }

    fn write_register(&mut self, address: u8, value: u16) -> Result<(), SensorError> {
        self.transfer(address)?;
        self.writes.lock().push((address, value));
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBus")
            .field("shunt_voltage", &self.shunt_voltage)
            .field("bus_voltage", &self.bus_voltage)
            .field("present", &self.present)
            .field("fault_rate", &self.fault_rate)
            .finish()
    }
}
