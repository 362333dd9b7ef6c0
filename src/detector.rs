// ExerciseBlockDetector - hysteresis state machine over fused windows
//
// NotMoving -> Moving       intensity above the effective threshold
// Moving    -> NotMoving    intensity back under it
// Moving    -> Exercising   a run of windows with steady period and intensity
// Exercising -> ExerciseEnded -> NotMoving
//                           still or divergent for longer than the grace run,
//                           or the block reached its maximum length
//
// ExerciseEnded is an instantaneous state: it is reported as an event and
// decays to NotMoving within the same step.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::DetectorConfig;
use crate::fusion::FusedWindow;
use crate::motion::{coefficient_of_variation, MotionFeatures, SpectrumAnalyzer};
use crate::telemetry;

/// Detector state, one per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    #[default]
    NotMoving,
    Moving,
    Exercising,
    ExerciseEnded,
}

/// Lifecycle event fired once per state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockEvent {
    Moving,
    NotMoving,
    Exercising,
    ExerciseEnded,
}

/// Result of feeding one window to the detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorUpdate {
    pub features: MotionFeatures,
    /// Transitions caused by this window, in order
    pub events: Vec<BlockEvent>,
    /// The window belongs to an exercise block
    pub in_block: bool,
    /// Still or divergent window inside an open block's grace run; it joins
    /// the block only if the block recovers
    pub grace: bool,
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    period_ms: f32,
    intensity: f32,
}

pub struct ExerciseBlockDetector {
    config: DetectorConfig,
    analyzer: SpectrumAnalyzer,
    state: DetectorState,
    /// EWMA of intensity over resting windows; survives session ends
    noise_floor: Option<f32>,
    recent: VecDeque<MotionFeatures>,
    baseline: Option<Baseline>,
    off_windows: usize,
    block_windows: usize,
}

impl ExerciseBlockDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_analyzer(config, SpectrumAnalyzer::new())
    }

    pub fn with_analyzer(config: DetectorConfig, analyzer: SpectrumAnalyzer) -> Self {
        let capacity = config.consistent_windows;
        Self {
            config,
            analyzer,
            state: DetectorState::NotMoving,
            noise_floor: None,
            recent: VecDeque::with_capacity(capacity),
            baseline: None,
            off_windows: 0,
            block_windows: 0,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn noise_floor(&self) -> Option<f32> {
        self.noise_floor
    }

    /// Movement threshold after noise-floor gating
    pub fn effective_threshold(&self) -> f32 {
        let gated = self.noise_floor.unwrap_or(0.0) * self.config.noise_floor_gate;
        self.config.movement_threshold.max(gated)
    }

    /// Evaluate one fused window
    pub fn observe(&mut self, window: &FusedWindow) -> DetectorUpdate {
        let features = MotionFeatures::extract(
            window,
            &self.analyzer,
            (self.config.min_period_ms, self.config.max_period_ms),
            self.config.min_periodicity,
        );
        let update = self.observe_features(features);
        for event in &update.events {
            telemetry::hub().record_block_transition(*event, window.start_ms);
        }
        update
    }

    /// Evaluate precomputed window features
    pub fn observe_features(&mut self, features: MotionFeatures) -> DetectorUpdate {
        let moving = features.intensity > self.effective_threshold();
        let mut events = Vec::new();
        let mut in_block = false;
        let mut grace = false;

        match self.state {
            DetectorState::NotMoving | DetectorState::ExerciseEnded => {
                if moving {
                    self.enter(DetectorState::Moving, &mut events);
                    self.recent.push_back(features);
                } else {
                    self.learn_noise(features.intensity);
                }
            }
            DetectorState::Moving => {
                if !moving {
                    self.enter(DetectorState::NotMoving, &mut events);
                } else {
                    if self.recent.len() == self.config.consistent_windows {
                        self.recent.pop_front();
                    }
                    self.recent.push_back(features);

                    if let Some(baseline) = self.consistent_run() {
                        self.baseline = Some(baseline);
                        self.enter(DetectorState::Exercising, &mut events);
                        in_block = true;
                    }
                }
            }
            DetectorState::Exercising => {
                self.block_windows += 1;
                let off = !moving || self.diverges(&features);
                if moving {
                    self.refresh_baseline(&features);
                }
                if off {
                    self.off_windows += 1;
                    grace = self.off_windows <= self.config.grace_windows;
                } else {
                    self.off_windows = 0;
                    in_block = true;
                }

                if self.off_windows > self.config.grace_windows {
                    log::info!(
                        "[ExerciseBlockDetector] Block ended after {} windows ({} off)",
                        self.block_windows,
                        self.off_windows
                    );
                    self.finish_block(&mut events);
                } else if self.block_windows >= self.config.max_block_windows {
                    log::info!(
                        "[ExerciseBlockDetector] Block reached {} windows, closing",
                        self.block_windows
                    );
                    grace = false;
                    self.finish_block(&mut events);
                }
            }
        }

        DetectorUpdate {
            features,
            events,
            in_block,
            grace,
        }
    }

    /// Events needed to return to NotMoving at a session boundary
    ///
    /// The noise floor is kept.
    pub fn end_session(&mut self) -> Vec<BlockEvent> {
        let mut events = Vec::new();
        match self.state {
            DetectorState::Exercising => self.finish_block(&mut events),
            DetectorState::Moving => self.enter(DetectorState::NotMoving, &mut events),
            DetectorState::NotMoving | DetectorState::ExerciseEnded => {
                self.clear_block();
                self.state = DetectorState::NotMoving;
            }
        }
        events
    }

    /// Forget everything, including the learned noise floor
    pub fn reset(&mut self) {
        self.state = DetectorState::NotMoving;
        self.noise_floor = None;
        self.clear_block();
    }

    fn enter(&mut self, state: DetectorState, events: &mut Vec<BlockEvent>) {
        log::debug!("[ExerciseBlockDetector] {:?} -> {:?}", self.state, state);
        let event = match state {
            DetectorState::NotMoving => {
                self.clear_block();
                BlockEvent::NotMoving
            }
            DetectorState::Moving => {
                self.clear_block();
                BlockEvent::Moving
            }
            DetectorState::Exercising => {
                self.off_windows = 0;
                self.block_windows = 0;
                BlockEvent::Exercising
            }
            DetectorState::ExerciseEnded => BlockEvent::ExerciseEnded,
        };
        self.state = state;
        events.push(event);
    }

    fn finish_block(&mut self, events: &mut Vec<BlockEvent>) {
        self.enter(DetectorState::ExerciseEnded, events);
        self.enter(DetectorState::NotMoving, events);
    }

    fn clear_block(&mut self) {
        self.recent.clear();
        self.baseline = None;
        self.off_windows = 0;
        self.block_windows = 0;
    }

    fn learn_noise(&mut self, intensity: f32) {
        let alpha = self.config.noise_floor_alpha;
        self.noise_floor = Some(match self.noise_floor {
            Some(floor) => floor + alpha * (intensity - floor),
            None => intensity,
        });
    }

    fn consistent_run(&self) -> Option<Baseline> {
        if self.recent.len() < self.config.consistent_windows {
            return None;
        }
        let periods: Vec<f32> = self
            .recent
            .iter()
            .map(|f| f.period_ms)
            .collect::<Option<Vec<f32>>>()?;
        let intensities: Vec<f32> = self.recent.iter().map(|f| f.intensity).collect();

        let bound = self.config.consistency_bound;
        if coefficient_of_variation(&periods)? > bound
            || coefficient_of_variation(&intensities)? > bound
        {
            return None;
        }

        Some(Baseline {
            period_ms: periods.iter().sum::<f32>() / periods.len() as f32,
            intensity: intensities.iter().sum::<f32>() / intensities.len() as f32,
        })
    }

    /// Follow gradual drift of a block in the same rhythm
    ///
    /// The entry baseline averages windows that still overlap the rest before
    /// the set, so it sits below the steady-state intensity.
    fn refresh_baseline(&mut self, features: &MotionFeatures) {
        let alpha = self.config.baseline_alpha;
        let (Some(baseline), Some(period_ms)) = (self.baseline.as_mut(), features.period_ms) else {
            return;
        };
        let drift = (period_ms - baseline.period_ms).abs() / baseline.period_ms;
        if drift > self.config.divergence_bound {
            return;
        }
        baseline.period_ms += alpha * (period_ms - baseline.period_ms);
        baseline.intensity += alpha * (features.intensity - baseline.intensity);
    }

    fn diverges(&self, features: &MotionFeatures) -> bool {
        let Some(baseline) = self.baseline else {
            return true;
        };
        let Some(period_ms) = features.period_ms else {
            return true;
        };
        let bound = self.config.divergence_bound;
        let relative = |value: f32, reference: f32| (value - reference).abs() / reference;

        relative(period_ms, baseline.period_ms) > bound
            || relative(features.intensity, baseline.intensity) > bound
    }
}
