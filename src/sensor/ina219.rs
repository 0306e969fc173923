//! INA219-style power monitor adapter.
//!
//! Converts shunt and bus voltage registers into physical quantities:
//!
//! - shunt voltage LSB is 10 µV; with a 0.1 Ω shunt one LSB is 0.01 mA
//! - bus voltage sits in bits 15..3 with a 4 mV LSB
//! - temperature is modelled from the shunt reading plus Johnson noise

use crate::core::noise::NoiseSource;
use crate::sensor::bus::{RegisterBus, SensorError};
use std::time::Duration;

pub const REG_CONFIG: u8 = 0x00;
pub const REG_SHUNT_VOLTAGE: u8 = 0x01;
pub const REG_BUS_VOLTAGE: u8 = 0x02;
pub const REG_CALIBRATION: u8 = 0x05;

/// 32 V range, ±320 mV gain, 12-bit ADCs, continuous shunt and bus.
pub const CONFIG_WORD: u16 = 0x2000 | 0x0800 | 0x0080 | 0x0018;

/// Calibration word for the high-precision mode.
pub const CALIBRATION_WORD: u16 = 0x1000;

/// Substituted when the temperature read fails.
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

/// Substituted when the energy read fails: one nominal 50 µs interval.
pub const DEFAULT_ENERGY_J: f64 = 0.0021;

const AMBIENT_TEMPERATURE_C: f64 = 23.0;
const SHUNT_LSB_V: f64 = 10e-6;
const SHUNT_CURRENT_LSB_MA: f64 = 0.01;
const BUS_LSB_V: f64 = 0.004;

/// Reads temperature and energy through a register bus.
pub struct PowerMonitor {
    bus: Box<dyn RegisterBus>,
    sample_period: Duration,
}

impl PowerMonitor {
    /// `sample_period` is the interval the energy reading is integrated over.
    pub fn new(bus: Box<dyn RegisterBus>, sample_period: Duration) -> Self {
        Self { bus, sample_period }
    }

    /// Write the configuration and calibration registers.
    pub fn configure(&mut self) -> Result<(), SensorError> {
        self.bus.write_register(REG_CONFIG, CONFIG_WORD)?;
        self.bus.write_register(REG_CALIBRATION, CALIBRATION_WORD)?;
        Ok(())
    }

    /// Temperature in °C.
    pub fn read_temperature(&mut self, noise: &mut dyn NoiseSource) -> Result<f64, SensorError> {
        let shunt = self.bus.read_register(REG_SHUNT_VOLTAGE)?;
        Ok(temperature_from_shunt(shunt, noise.next_u32()))
    }

    /// Energy over one sampling period, in joules.
    pub fn read_energy(&mut self) -> Result<f64, SensorError> {
        let shunt = self.bus.read_register(REG_SHUNT_VOLTAGE)?;
        let bus = self.bus.read_register(REG_BUS_VOLTAGE)?;
        Ok(energy_from_registers(shunt, bus, self.sample_period))
    }
}

impl std::fmt::Debug for PowerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerMonitor")
            .field("sample_period", &self.sample_period)
            .finish_non_exhaustive()
    }
}

/// Temperature model: ambient plus heating proportional to the shunt reading,
/// plus up to ±0.5 m°C of noise.
pub fn temperature_from_shunt(shunt: u16, noise: u32) -> f64 {
    let energy_j = f64::from(shunt) * SHUNT_LSB_V * 0.1;
    let jitter = (i64::from(noise % 1000) - 500) as f64 * 0.000_001;
    AMBIENT_TEMPERATURE_C + energy_j * 1000.0 + jitter
}

/// Energy in joules drawn over `period` at the given register readings.
pub fn energy_from_registers(shunt: u16, bus: u16, period: Duration) -> f64 {
    let voltage_v = f64::from(bus >> 3) * BUS_LSB_V;
    let current_ma = f64::from(shunt) * SHUNT_CURRENT_LSB_MA;
    let power_mw = voltage_v * current_ma;
    let energy_uj = power_mw * period.as_nanos() as f64 / 1_000_000.0;
    energy_uj / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::noise::SequenceNoise;
    use crate::sensor::simulated::SimulatedBus;

    #[test]
    fn test_temperature_model() {
        // 1000 LSB → 1e-3 J equivalent → +1 °C; noise 500 is the midpoint.
        let t = temperature_from_shunt(1000, 500);
        assert!((t - 24.0).abs() < 1e-9);

        let low = temperature_from_shunt(0, 0);
        assert!((low - (23.0 - 0.0005)).abs() < 1e-12);
    }

    #[test]
    fn test_energy_model() {
        // bus 5 V → 1250 << 3; shunt 100 LSB → 1 mA; 5 mW over 50 µs = 0.25 µJ
        let e = energy_from_registers(100, 1250 << 3, Duration::from_micros(50));
        assert!((e - 2.5e-7).abs() < 1e-15);
    }

    #[test]
    fn test_configure_writes_registers() {
        let bus = SimulatedBus::new(200, 0x5000);
        let writes = bus.write_log();
        let mut monitor = PowerMonitor::new(Box::new(bus), Duration::from_micros(50));

        monitor.configure().unwrap();
        assert_eq!(
            *writes.lock(),
            vec![(REG_CONFIG, CONFIG_WORD), (REG_CALIBRATION, CALIBRATION_WORD)]
        );
    }

    #[test]
    fn test_reads_fail_when_sensor_absent() {
        let mut monitor =
            PowerMonitor::new(Box::new(SimulatedBus::absent()), Duration::from_micros(50));
        let mut noise = SequenceNoise::new(vec![0]);

        assert_eq!(
            monitor.read_temperature(&mut noise),
            Err(SensorError::NotPresent)
        );
        assert_eq!(monitor.read_energy(), Err(SensorError::NotPresent));
    }
}
