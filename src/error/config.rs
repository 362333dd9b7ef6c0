// Configuration validation errors

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 7001
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    pub const INVALID_PARAMETER: i32 = 7001;
}

/// A configuration value outside its allowed range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidParameter { field: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidParameter { .. } => ConfigErrorCodes::INVALID_PARAMETER,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidParameter { field, reason } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}
