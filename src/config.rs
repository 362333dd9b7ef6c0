//! Configuration management for pipeline tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. The detector and
//! repetition thresholds in particular are empirical and are expected to be
//! tuned per sensor placement, so none of them are hard-coded elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::sensor::{ByteOrder, SourceKey};

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub decoder: DecoderConfig,
    pub fusion: FusionConfig,
    pub detector: DetectorConfig,
    pub classification: ClassificationConfig,
    pub repetitions: RepetitionConfig,
    pub engine: EngineConfig,
}

/// Sample decoder parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Byte order of header timestamps and sample values
    pub byte_order: ByteOrder,
}

/// Fusion buffer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Length of each fused window in milliseconds
    pub window_length_ms: u64,
    /// Advance between consecutive windows; smaller than the length gives overlap
    pub window_step_ms: u64,
    /// How long past a window's end to wait for a silent source before
    /// emitting the window with a gap marker
    pub gap_timeout_ms: u64,
    /// Register unknown sources on their first sample
    pub auto_register: bool,
    /// Sources expected from the start of the session
    pub sources: Vec<SourceKey>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            window_length_ms: 5_000,
            window_step_ms: 1_000,
            gap_timeout_ms: 1_500,
            auto_register: true,
            sources: Vec::new(),
        }
    }
}

/// Exercise-block detector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum motion intensity (raw sensor units, std-dev of the dominant
    /// axis) that counts as movement
    pub movement_threshold: f32,
    /// Movement threshold is raised to `noise_floor * noise_floor_gate` when
    /// the learned resting noise is high
    pub noise_floor_gate: f32,
    /// EWMA factor for the resting noise floor
    pub noise_floor_alpha: f32,
    /// Consecutive consistent windows needed to enter Exercising
    pub consistent_windows: usize,
    /// Maximum coefficient of variation of period and intensity across the
    /// consistent run
    pub consistency_bound: f32,
    /// Relative deviation from the block baseline that counts as divergent
    pub divergence_bound: f32,
    /// EWMA factor with which in-rhythm block windows refresh the baseline
    pub baseline_alpha: f32,
    /// Divergent or still windows tolerated before the block ends
    pub grace_windows: usize,
    /// Hard cap on the number of windows in one exercise block
    pub max_block_windows: usize,
    /// Minimum spectral peak share for a window to carry a period
    pub min_periodicity: f32,
    /// Shortest repetition period considered
    pub min_period_ms: f32,
    /// Longest repetition period considered
    pub max_period_ms: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 120.0,
            noise_floor_gate: 3.0,
            noise_floor_alpha: 0.1,
            consistent_windows: 3,
            consistency_bound: 0.25,
            divergence_bound: 0.5,
            baseline_alpha: 0.5,
            grace_windows: 2,
            max_block_windows: 180,
            min_periodicity: 0.3,
            min_period_ms: 300.0,
            max_period_ms: 2_500.0,
        }
    }
}

/// Verdict fusion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Weight multiplier applied to verdicts from gap-marked windows
    pub gap_penalty: f32,
    /// Maximum number of ranked exercises delivered per block
    pub max_results: usize,
    /// Fused results below this confidence are dropped
    pub min_confidence: f32,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            gap_penalty: 0.5,
            max_results: 10,
            min_confidence: 0.0,
        }
    }
}

/// Period band override for one exercise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepetitionProfile {
    pub min_period_ms: f32,
    pub max_period_ms: f32,
}

/// Repetition estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    /// Fewer detected cycles than this yields no estimate
    pub min_cycles: u32,
    /// Minimum share of signal energy around the spectral peak
    pub min_periodicity: f32,
    /// Minimum number of samples in the analysed signal
    pub min_samples: usize,
    /// Share of the peak amplitude that marks the active part of a signal;
    /// cycles are counted from the first to the last sample above it
    pub active_threshold: f32,
    pub min_period_ms: f32,
    pub max_period_ms: f32,
    /// Per-exercise period bands keyed by exercise label
    pub profiles: HashMap<String, RepetitionProfile>,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            min_cycles: 2,
            min_periodicity: 0.35,
            min_samples: 16,
            active_threshold: 0.3,
            min_period_ms: 400.0,
            max_period_ms: 8_000.0,
            profiles: HashMap::new(),
        }
    }
}

/// Pipeline facade and worker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the command ring feeding the worker thread
    pub queue_capacity: usize,
    /// Windows completed per `push_data` call
    pub max_windows_per_push: usize,
    /// Worker sleep when the ring is empty
    pub idle_sleep_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_windows_per_push: 1,
            idle_sleep_ms: 1,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing,
    /// unparsable or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(err) => {
                        log::warn!(
                            "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                            path.as_ref(),
                            err
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/pipeline_config.json")
    }

    /// Check every parameter against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidParameter {
                field,
                reason: reason.into(),
            }
        }

        let fusion = &self.fusion;
        if fusion.window_length_ms == 0 {
            return Err(invalid("fusion.window_length_ms", "must be > 0"));
        }
        if fusion.window_step_ms == 0 || fusion.window_step_ms > fusion.window_length_ms {
            return Err(invalid(
                "fusion.window_step_ms",
                format!("must be in 1..={}", fusion.window_length_ms),
            ));
        }

        let detector = &self.detector;
        if detector.movement_threshold <= 0.0 {
            return Err(invalid("detector.movement_threshold", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&detector.noise_floor_alpha) {
            return Err(invalid("detector.noise_floor_alpha", "must be in [0, 1]"));
        }
        if !(detector.baseline_alpha > 0.0 && detector.baseline_alpha <= 1.0) {
            return Err(invalid("detector.baseline_alpha", "must be in (0, 1]"));
        }
        if detector.consistent_windows < 2 {
            return Err(invalid("detector.consistent_windows", "must be >= 2"));
        }
        if detector.max_block_windows == 0 {
            return Err(invalid("detector.max_block_windows", "must be > 0"));
        }
        if detector.min_period_ms <= 0.0 || detector.min_period_ms >= detector.max_period_ms {
            return Err(invalid(
                "detector.min_period_ms",
                "must be > 0 and below detector.max_period_ms",
            ));
        }

        let classification = &self.classification;
        if !(classification.gap_penalty > 0.0 && classification.gap_penalty <= 1.0) {
            return Err(invalid("classification.gap_penalty", "must be in (0, 1]"));
        }
        if classification.max_results == 0 {
            return Err(invalid("classification.max_results", "must be > 0"));
        }

        let repetitions = &self.repetitions;
        if repetitions.min_period_ms <= 0.0
            || repetitions.min_period_ms >= repetitions.max_period_ms
        {
            return Err(invalid(
                "repetitions.min_period_ms",
                "must be > 0 and below repetitions.max_period_ms",
            ));
        }
        if !(0.0..1.0).contains(&repetitions.active_threshold) {
            return Err(invalid("repetitions.active_threshold", "must be in [0, 1)"));
        }
        for (label, profile) in &repetitions.profiles {
            if profile.min_period_ms <= 0.0 || profile.min_period_ms >= profile.max_period_ms {
                return Err(invalid(
                    "repetitions.profiles",
                    format!("invalid period band for {}", label),
                ));
            }
        }

        if self.engine.queue_capacity == 0 {
            return Err(invalid("engine.queue_capacity", "must be > 0"));
        }
        if self.engine.max_windows_per_push == 0 {
            return Err(invalid("engine.max_windows_per_push", "must be > 0"));
        }

        Ok(())
    }
}
