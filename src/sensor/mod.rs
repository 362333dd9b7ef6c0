// Sensor module - typed samples and raw frame decoding
//
// Wearables deliver framed byte buffers per location. This module defines
// the source identity of a stream (sensor type, device, body location), the
// typed samples decoded from a frame, and the decoder that produces them.
//
// Pipeline position: RawFrame -> SampleDecoder -> Sample -> FusionBuffer

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod decoder;
pub mod frame;

pub use decoder::{DecodedBatch, SampleDecoder};
pub use frame::{RawFrame, FRAME_HEADER_LEN};

/// Kind of sensor producing a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Accelerometer,
    Gyroscope,
    HeartRate,
}

impl SensorType {
    /// Decode the one-byte tag carried in frame headers
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(SensorType::Accelerometer),
            2 => Some(SensorType::Gyroscope),
            3 => Some(SensorType::HeartRate),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            SensorType::Accelerometer => 1,
            SensorType::Gyroscope => 2,
            SensorType::HeartRate => 3,
        }
    }

    /// Number of axes per record
    pub fn dimension(self) -> usize {
        match self {
            SensorType::Accelerometer | SensorType::Gyroscope => 3,
            SensorType::HeartRate => 1,
        }
    }

    /// Encoded size of one record in bytes (16-bit values)
    pub fn record_size(self) -> usize {
        self.dimension() * 2
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::HeartRate => "heart_rate",
        };
        f.write_str(name)
    }
}

/// Body location a sensor is worn at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    LeftWrist,
    RightWrist,
    Waist,
    Chest,
    LeftAnkle,
    RightAnkle,
    /// Location code not known to this build
    Other(u8),
}

impl Location {
    pub fn from_u8(code: u8) -> Self {
        match code {
            1 => Location::LeftWrist,
            2 => Location::RightWrist,
            3 => Location::Waist,
            4 => Location::Chest,
            5 => Location::LeftAnkle,
            6 => Location::RightAnkle,
            other => Location::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Location::LeftWrist => 1,
            Location::RightWrist => 2,
            Location::Waist => 3,
            Location::Chest => 4,
            Location::LeftAnkle => 5,
            Location::RightAnkle => 6,
            Location::Other(code) => code,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::LeftWrist => f.write_str("left_wrist"),
            Location::RightWrist => f.write_str("right_wrist"),
            Location::Waist => f.write_str("waist"),
            Location::Chest => f.write_str("chest"),
            Location::LeftAnkle => f.write_str("left_ankle"),
            Location::RightAnkle => f.write_str("right_ankle"),
            Location::Other(code) => write!(f, "location_{}", code),
        }
    }
}

/// Byte order of frame headers and sample values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub fn read_i16(self, bytes: [u8; 2]) -> i16 {
        match self {
            ByteOrder::Little => i16::from_le_bytes(bytes),
            ByteOrder::Big => i16::from_be_bytes(bytes),
        }
    }

    pub fn write_i16(self, value: i16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

/// Identity of one sample stream: `(sensor, device, location)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub sensor: SensorType,
    pub device: u8,
    pub location: Location,
}

impl SourceKey {
    pub fn new(sensor: SensorType, device: u8, location: Location) -> Self {
        Self {
            sensor,
            device,
            location,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.sensor, self.device, self.location)
    }
}

/// Value of one decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleValue {
    /// Three-axis reading (accelerometer, gyroscope)
    Triple { x: i16, y: i16, z: i16 },
    /// Single-axis reading (heart rate)
    Scalar(i16),
}

impl SampleValue {
    pub fn dimension(&self) -> usize {
        match self {
            SampleValue::Triple { .. } => 3,
            SampleValue::Scalar(_) => 1,
        }
    }

    /// Value of one axis; scalars only have axis 0
    pub fn axis(&self, index: usize) -> Option<i16> {
        match (self, index) {
            (SampleValue::Triple { x, .. }, 0) => Some(*x),
            (SampleValue::Triple { y, .. }, 1) => Some(*y),
            (SampleValue::Triple { z, .. }, 2) => Some(*z),
            (SampleValue::Scalar(v), 0) => Some(*v),
            _ => None,
        }
    }
}

/// One timestamped reading from one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub source: SourceKey,
    /// Milliseconds on the device clock
    pub timestamp_ms: u64,
    pub value: SampleValue,
}
