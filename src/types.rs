// Shared exercise types
//
// Labels are opaque strings: the pipeline never interprets them, it only
// groups verdicts and training blocks by them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a resistance exercise ("Squat", "Deadlift", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseLabel(String);

impl ExerciseLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExerciseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExerciseLabel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ExerciseLabel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One ranked entry of a block classification
///
/// `confidence` is always the fused value across the block's windows,
/// never the score of a single window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedExercise {
    pub label: ExerciseLabel,
    pub repetitions: Option<u32>,
    /// Load in kilograms, when the classifier reports one
    pub weight: Option<f32>,
    pub intensity: Option<f32>,
    /// Fused confidence in [0, 1]
    pub confidence: f32,
}

impl ClassifiedExercise {
    pub fn new(label: ExerciseLabel, confidence: f32) -> Self {
        Self {
            label,
            repetitions: None,
            weight: None,
            intensity: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
