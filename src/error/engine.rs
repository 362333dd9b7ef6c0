// Pipeline worker error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Pipeline worker error code constants
///
/// Error code range: 6001-6003
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Command ring is full; the command was not queued
    pub const QUEUE_FULL: i32 = 6001;

    /// Worker already shut down
    pub const STOPPED: i32 = 6002;

    /// Worker thread panicked
    pub const WORKER_PANICKED: i32 = 6003;
}

/// Log a worker error with structured context
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=PipelineWorker, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by `PipelineHandle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Ring buffer full, command dropped
    QueueFull { capacity: usize },

    /// Handle used after shutdown
    Stopped,

    /// Worker thread panicked
    WorkerPanicked,
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::QueueFull { .. } => EngineErrorCodes::QUEUE_FULL,
            EngineError::Stopped => EngineErrorCodes::STOPPED,
            EngineError::WorkerPanicked => EngineErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::QueueFull { capacity } => {
                format!("Pipeline queue full ({} commands), command dropped", capacity)
            }
            EngineError::Stopped => "Pipeline worker stopped. Create a new handle.".to_string(),
            EngineError::WorkerPanicked => "Pipeline worker thread panicked".to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}
