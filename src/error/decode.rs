// Decode error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Decode error code constants
///
/// Error code range: 1001-1006
pub struct DecodeErrorCodes {}

impl DecodeErrorCodes {
    /// Framed buffer shorter than the frame header
    pub const HEADER_TOO_SHORT: i32 = 1001;

    /// Header carries a sensor tag this build does not know
    pub const UNKNOWN_SENSOR_TYPE: i32 = 1002;

    /// Header declares a sampling rate of zero
    pub const INVALID_SAMPLE_RATE: i32 = 1003;

    /// Payload cannot hold a single record
    pub const INSUFFICIENT_DATA: i32 = 1004;

    /// Payload ended inside a record or before the declared count
    pub const TRUNCATED_RECORD: i32 = 1005;

    /// Payload holds more bytes than the declared records
    pub const EXCESS_DATA: i32 = 1006;
}

/// Log a decode error with structured context
///
/// Decode problems are recoverable, so they go out at warn level.
pub fn log_decode_error(err: &DecodeError, context: &str) {
    warn!(
        "Decode error in {}: code={}, component=SampleDecoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while turning raw frame bytes into samples
///
/// `TruncatedRecord` and `ExcessData` are reported alongside the samples
/// decoded before the malformed record; the remaining variants reject the
/// whole frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DecodeError {
    /// Framed buffer shorter than the fixed header
    HeaderTooShort { len: usize, required: usize },

    /// Unknown sensor type tag
    UnknownSensorType { tag: u8 },

    /// Sampling rate of zero
    InvalidSampleRate,

    /// Not even one full record available
    InsufficientData { len: usize, record_size: usize },

    /// Decoding stopped at a malformed record
    TruncatedRecord { decoded: usize, declared: usize },

    /// Bytes left after the declared records
    ExcessData { extra_bytes: usize },
}

impl DecodeError {
    /// Whether samples decoded before this error are still usable
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            DecodeError::TruncatedRecord { .. } | DecodeError::ExcessData { .. }
        )
    }
}

impl ErrorCode for DecodeError {
    fn code(&self) -> i32 {
        match self {
            DecodeError::HeaderTooShort { .. } => DecodeErrorCodes::HEADER_TOO_SHORT,
            DecodeError::UnknownSensorType { .. } => DecodeErrorCodes::UNKNOWN_SENSOR_TYPE,
            DecodeError::InvalidSampleRate => DecodeErrorCodes::INVALID_SAMPLE_RATE,
            DecodeError::InsufficientData { .. } => DecodeErrorCodes::INSUFFICIENT_DATA,
            DecodeError::TruncatedRecord { .. } => DecodeErrorCodes::TRUNCATED_RECORD,
            DecodeError::ExcessData { .. } => DecodeErrorCodes::EXCESS_DATA,
        }
    }

    fn message(&self) -> String {
        match self {
            DecodeError::HeaderTooShort { len, required } => {
                format!("Frame too short: {} bytes, header needs {}", len, required)
            }
            DecodeError::UnknownSensorType { tag } => {
                format!("Unknown sensor type tag 0x{:02x}", tag)
            }
            DecodeError::InvalidSampleRate => "Samples per second must be > 0".to_string(),
            DecodeError::InsufficientData { len, record_size } => {
                format!(
                    "Payload of {} bytes cannot hold a {}-byte record",
                    len, record_size
                )
            }
            DecodeError::TruncatedRecord { decoded, declared } => {
                format!("Decoded {} of {} declared records", decoded, declared)
            }
            DecodeError::ExcessData { extra_bytes } => {
                format!("{} bytes beyond the declared records", extra_bytes)
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecodeError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DecodeError {}
