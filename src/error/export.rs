// Export codec error types

use crate::error::ErrorCode;
use std::fmt;

/// Export codec error code constants
///
/// Error code range: 5001-5002
pub struct ExportErrorCodes {}

impl ExportErrorCodes {
    pub const NOT_ENOUGH_INPUT: i32 = 5001;
    pub const BAD_HEADER: i32 = 5002;
}

/// Errors raised when decoding exported fused-window data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Input ended before the structure it announced
    NotEnoughInput { needed: usize, available: usize },

    /// Magic, version or a tag did not match
    BadHeader { reason: String },
}

impl ErrorCode for ExportError {
    fn code(&self) -> i32 {
        match self {
            ExportError::NotEnoughInput { .. } => ExportErrorCodes::NOT_ENOUGH_INPUT,
            ExportError::BadHeader { .. } => ExportErrorCodes::BAD_HEADER,
        }
    }

    fn message(&self) -> String {
        match self {
            ExportError::NotEnoughInput { needed, available } => {
                format!("Not enough input: need {} bytes, have {}", needed, available)
            }
            ExportError::BadHeader { reason } => format!("Bad header: {}", reason),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExportError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ExportError {}
