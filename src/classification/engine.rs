// ClassificationEngine - block accumulation for both session modes

use serde::{Deserialize, Serialize};

use crate::classification::{fuse_verdicts, Classifier, Vote};
use crate::config::ClassificationConfig;
use crate::error::{log_classification_failure, ClassificationFailure};
use crate::export::encode_windows;
use crate::fusion::FusedWindow;
use crate::repetitions::RepetitionEstimator;
use crate::telemetry;
use crate::types::{ClassifiedExercise, ExerciseLabel};

/// Session mode, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Training,
    Classifying,
}

/// Fused result of one classified exercise block
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    /// Ranked best first; empty when nothing could be classified
    pub results: Vec<ClassifiedExercise>,
    /// Export-encoded windows of the block
    pub data: Vec<u8>,
    pub windows: usize,
    /// Set when every classified window failed
    pub failure: Option<ClassificationFailure>,
}

/// Labelled corpus of one training block
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub label: ExerciseLabel,
    pub windows: Vec<FusedWindow>,
    /// Export-encoded `windows`
    pub data: Vec<u8>,
}

pub struct ClassificationEngine {
    mode: EngineMode,
    config: ClassificationConfig,
    classifier: Option<Box<dyn Classifier>>,
    repetitions: RepetitionEstimator,
    windows: Vec<FusedWindow>,
    votes: Vec<Vote>,
    failed_windows: usize,
    last_failure: Option<ClassificationFailure>,
    training_label: Option<ExerciseLabel>,
}

impl ClassificationEngine {
    /// Engine that classifies exercise blocks with `classifier`
    pub fn classifying(
        config: ClassificationConfig,
        repetitions: RepetitionEstimator,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self::new(EngineMode::Classifying, config, repetitions, Some(classifier))
    }

    /// Engine that collects labelled training blocks
    pub fn training(config: ClassificationConfig, repetitions: RepetitionEstimator) -> Self {
        Self::new(EngineMode::Training, config, repetitions, None)
    }

    fn new(
        mode: EngineMode,
        config: ClassificationConfig,
        repetitions: RepetitionEstimator,
        classifier: Option<Box<dyn Classifier>>,
    ) -> Self {
        Self {
            mode,
            config,
            classifier,
            repetitions,
            windows: Vec::new(),
            votes: Vec::new(),
            failed_windows: 0,
            last_failure: None,
            training_label: None,
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn pending_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn training_label(&self) -> Option<&ExerciseLabel> {
        self.training_label.as_ref()
    }

    pub fn repetitions(&self) -> &RepetitionEstimator {
        &self.repetitions
    }

    /// Add a window to the open block
    ///
    /// Classifying mode classifies the window immediately. Training mode
    /// stores it only while a training block is open.
    ///
    /// # Returns
    /// Whether the window became part of the block
    pub fn accept(&mut self, window: FusedWindow) -> bool {
        self.admit(window, false)
    }

    /// Add a window from a grace run the block recovered from
    ///
    /// Its verdict weighs like a gap-marked window's.
    pub fn accept_grace(&mut self, window: FusedWindow) -> bool {
        self.admit(window, true)
    }

    fn admit(&mut self, window: FusedWindow, grace: bool) -> bool {
        match self.mode {
            EngineMode::Training => {
                if self.training_label.is_none() {
                    log::trace!("[ClassificationEngine] No training block open, window skipped");
                    return false;
                }
            }
            EngineMode::Classifying => {
                let Some(classifier) = self.classifier.as_ref() else {
                    return false;
                };
                match classifier.classify(&window) {
                    Ok(verdict) => self.votes.push(Vote {
                        window_index: self.windows.len(),
                        reduced: grace || window.has_gap(),
                        verdict,
                    }),
                    Err(failure) => {
                        log_classification_failure(&failure, "classify window");
                        self.failed_windows += 1;
                        self.last_failure = Some(failure);
                    }
                }
            }
        }
        self.windows.push(window);
        true
    }

    /// Close the classification block and fuse its verdicts
    pub fn complete_block(&mut self) -> ClassificationOutcome {
        let mut results = fuse_verdicts(&self.votes, &self.config);
        for exercise in &mut results {
            exercise.repetitions = self
                .repetitions
                .estimate_block(&self.windows, Some(&exercise.label));
        }

        let failure = if self.votes.is_empty() {
            self.last_failure.take()
        } else {
            None
        };

        let outcome = ClassificationOutcome {
            results,
            data: encode_windows(&self.windows),
            windows: self.windows.len(),
            failure,
        };

        match outcome.results.first() {
            Some(top) => log::info!(
                "[ClassificationEngine] Block of {} windows: {} ({:.2}, {} failed)",
                outcome.windows,
                top.label,
                top.confidence,
                self.failed_windows
            ),
            None => log::info!(
                "[ClassificationEngine] Block of {} windows produced no result",
                outcome.windows
            ),
        }
        let top = outcome.results.first();
        telemetry::hub().record_classification(
            top.map(|e| e.label.as_str()),
            top.map(|e| e.confidence).unwrap_or(0.0),
            outcome.windows,
        );

        self.clear_block();
        outcome
    }

    /// Open a training block for `label`
    ///
    /// # Returns
    /// `false` in classifying mode, where training blocks do not exist
    pub fn start_training(&mut self, label: ExerciseLabel) -> bool {
        if self.mode != EngineMode::Training {
            log::warn!(
                "[ClassificationEngine] training_started({}) ignored in classifying mode",
                label
            );
            return false;
        }
        if let Some(previous) = &self.training_label {
            log::warn!(
                "[ClassificationEngine] Training block {} restarted as {}, dropping {} windows",
                previous,
                label,
                self.windows.len()
            );
        }
        self.clear_block();
        log::info!("[ClassificationEngine] Training block started: {}", label);
        self.training_label = Some(label);
        true
    }

    /// Close the open training block
    ///
    /// # Returns
    /// `None` when no block was open
    pub fn complete_training(&mut self) -> Option<TrainingOutcome> {
        let Some(label) = self.training_label.take() else {
            log::warn!("[ClassificationEngine] training_completed without an open block");
            return None;
        };

        let windows = std::mem::take(&mut self.windows);
        log::info!(
            "[ClassificationEngine] Training block {} completed with {} windows",
            label,
            windows.len()
        );
        self.clear_block();
        Some(TrainingOutcome {
            data: encode_windows(&windows),
            label,
            windows,
        })
    }

    /// Drop the open block and any training label
    pub fn reset(&mut self) {
        self.training_label = None;
        self.clear_block();
    }

    fn clear_block(&mut self) {
        self.windows.clear();
        self.votes.clear();
        self.failed_windows = 0;
        self.last_failure = None;
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
