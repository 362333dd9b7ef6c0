// Classification failure types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Classification failure code constants
///
/// Error code range: 3001-3003
pub struct ClassificationFailureCodes {}

impl ClassificationFailureCodes {
    /// No model loaded or the model could not be initialised
    pub const MODEL_UNAVAILABLE: i32 = 3001;

    /// The window did not match what the model expects
    pub const MALFORMED_INPUT: i32 = 3002;

    /// The classifier raised an error of its own
    pub const CLASSIFIER_ERROR: i32 = 3003;
}

/// Log a classification failure with structured context
pub fn log_classification_failure(err: &ClassificationFailure, context: &str) {
    error!(
        "Classification failure in {}: code={}, component=ClassificationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Failure reported by the external classifier
///
/// Never aborts a session: the classification observer receives an empty
/// result list together with the failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassificationFailure {
    /// Model not loaded or not loadable
    ModelUnavailable { reason: String },

    /// Window shape rejected by the model
    MalformedInput { reason: String },

    /// Any other classifier-side error
    ClassifierError { details: String },
}

impl ErrorCode for ClassificationFailure {
    fn code(&self) -> i32 {
        match self {
            ClassificationFailure::ModelUnavailable { .. } => {
                ClassificationFailureCodes::MODEL_UNAVAILABLE
            }
            ClassificationFailure::MalformedInput { .. } => {
                ClassificationFailureCodes::MALFORMED_INPUT
            }
            ClassificationFailure::ClassifierError { .. } => {
                ClassificationFailureCodes::CLASSIFIER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ClassificationFailure::ModelUnavailable { reason } => {
                format!("Classifier model unavailable: {}", reason)
            }
            ClassificationFailure::MalformedInput { reason } => {
                format!("Malformed classifier input: {}", reason)
            }
            ClassificationFailure::ClassifierError { details } => {
                format!("Classifier error: {}", details)
            }
        }
    }
}

impl fmt::Display for ClassificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassificationFailure (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassificationFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_failure_codes() {
        assert_eq!(
            ClassificationFailure::ModelUnavailable {
                reason: "x".to_string()
            }
            .code(),
            3001
        );
        assert_eq!(
            ClassificationFailure::MalformedInput {
                reason: "x".to_string()
            }
            .code(),
            3002
        );
        assert_eq!(
            ClassificationFailure::ClassifierError {
                details: "x".to_string()
            }
            .code(),
            3003
        );
    }

    #[test]
    fn test_classification_failure_serializes() {
        let failure = ClassificationFailure::ModelUnavailable {
            reason: "no weights".to_string(),
        };
        let json = serde_json::to_string(&failure).unwrap();
        let parsed: ClassificationFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, failure);
    }
}
