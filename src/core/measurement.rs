//! Measurement records and their fixed-size binary layout.
//!
//! Every record on the data channel is exactly [`RECORD_SIZE`] bytes:
//!
//! ```text
//! offset  size  field
//!      0     8  timestamp    (u64, ns, little-endian)
//!      8     8  temperature  (f64, °C)
//!     16     8  energy       (f64, J)
//!     24     8  latency      (f64, µs)
//!     32   576  dimensions   (72 × f64)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Number of feature dimensions carried by every measurement.
pub const DIMENSIONS: usize = 72;

/// Size in bytes of one encoded measurement.
pub const RECORD_SIZE: usize = 8 + 3 * 8 + DIMENSIONS * 8;

/// One capture cycle's full record.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Real-time clock at capture start, in nanoseconds since the Unix epoch
    pub timestamp: u64,
    /// Temperature in °C
    pub temperature: f64,
    /// Energy over one sampling interval, in joules
    pub energy: f64,
    /// Wall time spent in the capture routine, in microseconds
    pub latency: f64,
    /// Feature vector; indices 8.. are derived from the index eight positions earlier
    pub dimensions: [f64; DIMENSIONS],
}

impl Measurement {
    /// The capture timestamp as a UTC datetime.
    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp as i64)
    }

    /// Append this record to `buf` in wire layout.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.timestamp);
        buf.put_f64_le(self.temperature);
        buf.put_f64_le(self.energy);
        buf.put_f64_le(self.latency);
        for value in &self.dimensions {
            buf.put_f64_le(*value);
        }
    }

    /// Read one record from the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, RecordError> {
        if buf.remaining() < RECORD_SIZE {
            return Err(RecordError::Truncated {
                remaining: buf.remaining(),
            });
        }

        let timestamp = buf.get_u64_le();
        let temperature = buf.get_f64_le();
        let energy = buf.get_f64_le();
        let latency = buf.get_f64_le();
        let mut dimensions = [0.0; DIMENSIONS];
        for value in dimensions.iter_mut() {
            *value = buf.get_f64_le();
        }

        Ok(Self {
            timestamp,
            temperature,
            energy,
            latency,
            dimensions,
        })
    }
}

/// Encode a batch of measurements back to back, in order.
pub fn encode_records(records: &[Measurement]) -> Bytes {
    let mut buf = BytesMut::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        record.encode(&mut buf);
    }
    buf.freeze()
}

/// Decode a buffer holding zero or more whole records.
pub fn decode_records(mut data: &[u8]) -> Result<Vec<Measurement>, RecordError> {
    if data.len() % RECORD_SIZE != 0 {
        return Err(RecordError::PartialRecord { len: data.len() });
    }

    let mut records = Vec::with_capacity(data.len() / RECORD_SIZE);
    while data.has_remaining() {
        records.push(Measurement::decode(&mut data)?);
    }
    Ok(records)
}

impl Serialize for Measurement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Measurement", 5)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.serialize_field("energy", &self.energy)?;
        state.serialize_field("latency", &self.latency)?;
        state.serialize_field("dimensions", &self.dimensions[..])?;
        state.end()
    }
}

/// Errors raised while decoding wire records.
#[derive(Debug, PartialEq, Eq)]
pub enum RecordError {
    /// Fewer bytes remain than one record needs
    Truncated { remaining: usize },
    /// Input length is not a multiple of the record size
    PartialRecord { len: usize },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Truncated { remaining } => {
                write!(f, "Truncated record: {remaining} of {RECORD_SIZE} bytes")
            }
            RecordError::PartialRecord { len } => {
                write!(
                    f,
                    "Input of {len} bytes is not a whole number of {RECORD_SIZE}-byte records"
                )
            }
        }
    }
}

impl std::error::Error for RecordError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: u64) -> Measurement {
        let mut dimensions = [0.0; DIMENSIONS];
        for (i, value) in dimensions.iter_mut().enumerate() {
            *value = i as f64 * 1.5;
        }
        Measurement {
            timestamp,
            temperature: 23.25,
            energy: 0.0021,
            latency: 3.5,
            dimensions,
        }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 608);
        let encoded = encode_records(&[sample(1)]);
        assert_eq!(encoded.len(), RECORD_SIZE);
    }

    #[test]
    fn test_field_offsets() {
        let encoded = encode_records(&[sample(0x0102_0304_0506_0708)]);

        assert_eq!(&encoded[0..8], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&encoded[8..16], &23.25f64.to_le_bytes());
        assert_eq!(&encoded[24..32], &3.5f64.to_le_bytes());
        // dimensions[71] sits in the last eight bytes
        assert_eq!(&encoded[600..608], &(71.0f64 * 1.5).to_le_bytes());
    }

    #[test]
    fn test_decode_preserves_order() {
        let batch = vec![sample(10), sample(20), sample(30)];
        let decoded = decode_records(&encode_records(&batch)).unwrap();
        let stamps: Vec<u64> = decoded.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![10, 20, 30]);
        assert_eq!(decoded[1], batch[1]);
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let encoded = encode_records(&[sample(1)]);
        let err = decode_records(&encoded[..RECORD_SIZE - 1]).unwrap_err();
        assert_eq!(err, RecordError::PartialRecord { len: RECORD_SIZE - 1 });
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_json_carries_all_dimensions() {
        let json = serde_json::to_value(sample(5)).unwrap();
        assert_eq!(json["timestamp"], 5);
        assert_eq!(json["dimensions"].as_array().unwrap().len(), DIMENSIONS);
    }
}
