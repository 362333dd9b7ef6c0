// RawFrame - framed sensor payload as delivered by a wearable
//
// Header layout (8 bytes), followed by `count` fixed-size records:
//
//   0      sensor type tag (1 accelerometer, 2 gyroscope, 3 heart rate)
//   1      device id
//   2      samples per second
//   3      declared record count
//   4..8   device timestamp in ms (u32, configured byte order)

use crate::error::DecodeError;
use crate::sensor::{ByteOrder, Location, SensorType, SourceKey};

/// Size of the frame header in bytes
pub const FRAME_HEADER_LEN: usize = 8;

/// Raw bytes from one source, tagged with everything needed to decode them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub sensor_type: SensorType,
    pub device_id: u8,
    pub location: Location,
    pub samples_per_second: u8,
    /// Number of records the sender claims to have written
    pub declared_count: usize,
    /// Timestamp of the first record in ms
    pub timestamp_ms: u64,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn source(&self) -> SourceKey {
        SourceKey::new(self.sensor_type, self.device_id, self.location)
    }

    /// Parse a framed buffer received from `location`
    ///
    /// Only the header is validated here; record-level problems are left to
    /// the decoder so that it can salvage a partial frame.
    pub fn parse(
        bytes: &[u8],
        location: Location,
        byte_order: ByteOrder,
    ) -> Result<Self, DecodeError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(DecodeError::HeaderTooShort {
                len: bytes.len(),
                required: FRAME_HEADER_LEN,
            });
        }

        let sensor_type =
            SensorType::from_tag(bytes[0]).ok_or(DecodeError::UnknownSensorType { tag: bytes[0] })?;
        let samples_per_second = bytes[2];
        if samples_per_second == 0 {
            return Err(DecodeError::InvalidSampleRate);
        }
        let timestamp = byte_order.read_u32([bytes[4], bytes[5], bytes[6], bytes[7]]);

        Ok(Self {
            sensor_type,
            device_id: bytes[1],
            location,
            samples_per_second,
            declared_count: bytes[3] as usize,
            timestamp_ms: timestamp as u64,
            payload: bytes[FRAME_HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize header and payload back into a framed buffer
    ///
    /// The header only has room for a u8 count and a u32 timestamp; larger
    /// values saturate and wrap respectively.
    pub fn to_bytes(&self, byte_order: ByteOrder) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        bytes.push(self.sensor_type.tag());
        bytes.push(self.device_id);
        bytes.push(self.samples_per_second);
        bytes.push(u8::try_from(self.declared_count).unwrap_or(u8::MAX));
        bytes.extend_from_slice(&byte_order.write_u32(self.timestamp_ms as u32));
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}
