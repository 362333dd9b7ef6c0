// Error types for the preclassification pipeline
//
// Every failure in the pipeline degrades output quality rather than aborting
// a session. The enums below carry numeric codes so that hosts embedding the
// library can react to them without string matching.
//
// Code ranges:
// - 1001-1006 decode
// - 2001-2003 fusion
// - 3001-3003 classification
// - 4001-4003 repetition estimation
// - 5001-5002 export codec
// - 6001-6003 pipeline worker
// - 7001      configuration

mod classification;
mod config;
mod decode;
mod engine;
mod export;
mod fusion;
mod repetition;

pub use classification::{
    log_classification_failure, ClassificationFailure, ClassificationFailureCodes,
};
pub use config::{ConfigError, ConfigErrorCodes};
pub use decode::{log_decode_error, DecodeError, DecodeErrorCodes};
pub use engine::{log_engine_error, EngineError, EngineErrorCodes};
pub use export::{ExportError, ExportErrorCodes};
pub use fusion::{log_fusion_error, FusionError, FusionErrorCodes};
pub use repetition::{RepetitionUnavailable, RepetitionUnavailableCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Location, SensorType, SourceKey};

    #[test]
    fn test_error_code_trait_objects() {
        let decode: &dyn ErrorCode = &DecodeError::InvalidSampleRate;
        assert_eq!(decode.code(), DecodeErrorCodes::INVALID_SAMPLE_RATE);

        let fusion: &dyn ErrorCode = &FusionError::UnregisteredSource {
            source: SourceKey::new(SensorType::Accelerometer, 0, Location::LeftWrist),
        };
        assert_eq!(fusion.code(), FusionErrorCodes::UNREGISTERED_SOURCE);

        let export: &dyn ErrorCode = &ExportError::BadHeader {
            reason: "magic".to_string(),
        };
        assert_eq!(export.code(), 5002);
    }

    #[test]
    fn test_code_ranges_do_not_overlap() {
        let codes = [
            DecodeErrorCodes::HEADER_TOO_SHORT,
            FusionErrorCodes::OUT_OF_ORDER,
            ClassificationFailureCodes::MODEL_UNAVAILABLE,
            RepetitionUnavailableCodes::SIGNAL_TOO_SHORT,
            ExportErrorCodes::NOT_ENOUGH_INPUT,
            EngineErrorCodes::QUEUE_FULL,
            ConfigErrorCodes::INVALID_PARAMETER,
        ];
        for window in codes.windows(2) {
            assert!(window[0] / 1000 < window[1] / 1000);
        }
    }
}
