// Repetition estimation outcomes

use crate::error::ErrorCode;
use std::fmt;

/// Repetition-unavailable code constants
///
/// Error code range: 4001-4003
pub struct RepetitionUnavailableCodes {}

impl RepetitionUnavailableCodes {
    pub const SIGNAL_TOO_SHORT: i32 = 4001;
    pub const INSUFFICIENT_PERIODICITY: i32 = 4002;
    pub const INSUFFICIENT_CYCLES: i32 = 4003;
}

/// Why no repetition count could be produced
///
/// Callers of `RepetitionEstimator::estimate` only see `None`; the reason
/// is available through `try_estimate` for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum RepetitionUnavailable {
    /// Fewer samples than the analysis needs (or no 3-axis channel at all)
    SignalTooShort { samples: usize, required: usize },

    /// Spectral peak too weak compared to total signal energy
    InsufficientPeriodicity { strength: f32, required: f32 },

    /// Periodic, but fewer cycles than the configured minimum
    InsufficientCycles { cycles: u32, required: u32 },
}

impl ErrorCode for RepetitionUnavailable {
    fn code(&self) -> i32 {
        match self {
            RepetitionUnavailable::SignalTooShort { .. } => {
                RepetitionUnavailableCodes::SIGNAL_TOO_SHORT
            }
            RepetitionUnavailable::InsufficientPeriodicity { .. } => {
                RepetitionUnavailableCodes::INSUFFICIENT_PERIODICITY
            }
            RepetitionUnavailable::InsufficientCycles { .. } => {
                RepetitionUnavailableCodes::INSUFFICIENT_CYCLES
            }
        }
    }

    fn message(&self) -> String {
        match self {
            RepetitionUnavailable::SignalTooShort { samples, required } => {
                format!("Signal too short: {} samples, need {}", samples, required)
            }
            RepetitionUnavailable::InsufficientPeriodicity { strength, required } => {
                format!(
                    "Periodicity {:.3} below required {:.3}",
                    strength, required
                )
            }
            RepetitionUnavailable::InsufficientCycles { cycles, required } => {
                format!("Only {} cycles detected, need {}", cycles, required)
            }
        }
    }
}

impl fmt::Display for RepetitionUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RepetitionUnavailable (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RepetitionUnavailable {}
