// Classification module - windowed ensemble over an external classifier
//
// The numeric model lives outside this crate. While an exercise block is
// open, every fused window is handed to it and the per-window verdicts are
// fused into one ranked result when the block closes. In training mode no
// model is involved: the windows of a labelled block are collected and
// delivered as one corpus.

pub mod engine;
pub mod voting;

pub use engine::{ClassificationEngine, ClassificationOutcome, EngineMode, TrainingOutcome};
pub use voting::{fuse_verdicts, Vote};

use serde::{Deserialize, Serialize};

use crate::error::ClassificationFailure;
use crate::fusion::FusedWindow;
use crate::types::ExerciseLabel;

/// Result of classifying one fused window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowVerdict {
    pub label: ExerciseLabel,
    /// Model score in [0, 1]
    pub confidence: f32,
    pub weight: Option<f32>,
    pub intensity: Option<f32>,
}

impl WindowVerdict {
    pub fn new(label: impl Into<ExerciseLabel>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            weight: None,
            intensity: None,
        }
    }
}

/// External per-window classifier (MLP, SVM, ...)
pub trait Classifier: Send {
    fn classify(&self, window: &FusedWindow) -> Result<WindowVerdict, ClassificationFailure>;
}

impl<F> Classifier for F
where
    F: Fn(&FusedWindow) -> Result<WindowVerdict, ClassificationFailure> + Send,
{
    fn classify(&self, window: &FusedWindow) -> Result<WindowVerdict, ClassificationFailure> {
        self(window)
    }
}
