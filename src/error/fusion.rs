// Fusion error types and constants

use crate::error::ErrorCode;
use crate::sensor::SourceKey;
use log::debug;
use std::fmt;

/// Fusion error code constants
///
/// Error code range: 2001-2003
pub struct FusionErrorCodes {}

impl FusionErrorCodes {
    /// Sample timestamp not after the previous sample of the same source
    pub const OUT_OF_ORDER: i32 = 2001;

    /// Sample older than the window cursor
    pub const BEHIND_WINDOW: i32 = 2002;

    /// Sample from a source that was never registered
    pub const UNREGISTERED_SOURCE: i32 = 2003;
}

/// Log a fusion error
///
/// These fire at sensor rate when a device misbehaves, so they stay at
/// debug level; the buffer keeps counters for the aggregate picture.
pub fn log_fusion_error(err: &FusionError, context: &str) {
    debug!(
        "Fusion error in {}: code={}, component=FusionBuffer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the fusion buffer when a sample has to be dropped
///
/// `OutOfOrder` is the reorder error of the pipeline: the sample is dropped,
/// a counter is incremented and fusion continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusionError {
    /// Timestamp not strictly after the previous sample from this source
    OutOfOrder {
        source: SourceKey,
        timestamp_ms: u64,
        previous_ms: u64,
    },

    /// Timestamp before the start of the current window
    BehindWindow {
        source: SourceKey,
        timestamp_ms: u64,
        cursor_ms: u64,
    },

    /// Source not registered and auto-registration disabled
    UnregisteredSource { source: SourceKey },
}

impl ErrorCode for FusionError {
    fn code(&self) -> i32 {
        match self {
            FusionError::OutOfOrder { .. } => FusionErrorCodes::OUT_OF_ORDER,
            FusionError::BehindWindow { .. } => FusionErrorCodes::BEHIND_WINDOW,
            FusionError::UnregisteredSource { .. } => FusionErrorCodes::UNREGISTERED_SOURCE,
        }
    }

    fn message(&self) -> String {
        match self {
            FusionError::OutOfOrder {
                source,
                timestamp_ms,
                previous_ms,
            } => format!(
                "Out-of-order sample from {}: {} ms after {} ms",
                source, timestamp_ms, previous_ms
            ),
            FusionError::BehindWindow {
                source,
                timestamp_ms,
                cursor_ms,
            } => format!(
                "Late sample from {}: {} ms is behind window start {} ms",
                source, timestamp_ms, cursor_ms
            ),
            FusionError::UnregisteredSource { source } => {
                format!("Source {} is not registered", source)
            }
        }
    }
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FusionError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for FusionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Location, SensorType};

    fn source() -> SourceKey {
        SourceKey::new(SensorType::Accelerometer, 1, Location::RightWrist)
    }

    #[test]
    fn test_fusion_error_codes() {
        assert_eq!(
            FusionError::OutOfOrder {
                source: source(),
                timestamp_ms: 10,
                previous_ms: 20
            }
            .code(),
            2001
        );
        assert_eq!(
            FusionError::BehindWindow {
                source: source(),
                timestamp_ms: 10,
                cursor_ms: 20
            }
            .code(),
            2002
        );
        assert_eq!(
            FusionError::UnregisteredSource { source: source() }.code(),
            2003
        );
    }

    #[test]
    fn test_fusion_error_message_names_source() {
        let err = FusionError::OutOfOrder {
            source: source(),
            timestamp_ms: 10,
            previous_ms: 20,
        };
        assert!(err.message().contains("accelerometer"));
        assert!(err.message().contains("right_wrist"));
    }
}
