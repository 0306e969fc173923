//! Register-level access to the sensor.

/// A transport that reads and writes 16-bit sensor registers.
///
/// Implementations may block; they are only ever called from the capture
/// worker and from agent initialization.
pub trait RegisterBus: Send {
    /// Read one 16-bit register.
    fn read_register(&mut self, address: u8) -> Result<u16, SensorError>;

    /// Write one 16-bit register.
    fn write_register(&mut self, address: u8, value: u16) -> Result<(), SensorError>;
}

/// Errors that can occur while talking to the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No device answered on the bus
    NotPresent,
    /// The transfer started but failed
    Io { address: u8, reason: String },
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::NotPresent => write!(f, "Sensor not present"),
            SensorError::Io { address, reason } => {
                write!(f, "Failed to access register 0x{address:02x}: {reason}")
            }
        }
    }
}

impl std::error::Error for SensorError {}
