// FusionBuffer - per-source queues and the sliding window cursor

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::FusionConfig;
use crate::error::{log_fusion_error, ConfigError, FusionError};
use crate::fusion::{FusedChannel, FusedWindow};
use crate::sensor::{Sample, SourceKey};
use crate::telemetry::{self, DropReason};
use crate::types::ExerciseLabel;

/// Counters describing fusion health since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    pub windows_emitted: u64,
    /// Emitted windows carrying at least one gap marker
    pub gap_windows: u64,
    /// Window positions skipped because no source had data for them
    pub skipped_windows: u64,
    pub reorder_drops: u64,
    pub late_drops: u64,
    pub unregistered_drops: u64,
}

#[derive(Debug, Default)]
struct SourceQueue {
    samples: VecDeque<Sample>,
    last_timestamp_ms: Option<u64>,
}

impl SourceQueue {
    fn covers(&self, end_ms: u64) -> bool {
        self.last_timestamp_ms.is_some_and(|ts| ts >= end_ms)
    }

    fn discard_before(&mut self, cursor_ms: u64) {
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp_ms < cursor_ms)
        {
            self.samples.pop_front();
        }
    }
}

/// Sliding-window aligner over registered sample sources
pub struct FusionBuffer {
    window_length_ms: u64,
    window_step_ms: u64,
    gap_timeout_ms: u64,
    auto_register: bool,
    sources: BTreeMap<SourceKey, SourceQueue>,
    /// Start of the next window; set by the first accepted sample
    cursor_ms: Option<u64>,
    /// Latest timestamp seen from any source
    clock_ms: u64,
    hints: BTreeMap<u64, Option<ExerciseLabel>>,
    stats: FusionStats,
}

impl FusionBuffer {
    pub fn new(config: &FusionConfig) -> Self {
        let mut buffer = Self {
            window_length_ms: config.window_length_ms.max(1),
            window_step_ms: config.window_step_ms.clamp(1, config.window_length_ms.max(1)),
            gap_timeout_ms: config.gap_timeout_ms,
            auto_register: config.auto_register,
            sources: BTreeMap::new(),
            cursor_ms: None,
            clock_ms: 0,
            hints: BTreeMap::new(),
            stats: FusionStats::default(),
        };
        for source in &config.sources {
            buffer.register_source(*source);
        }
        buffer
    }

    /// Expect samples from `source`; windows wait for it from now on
    pub fn register_source(&mut self, source: SourceKey) {
        if !self.sources.contains_key(&source) {
            log::debug!("[FusionBuffer] Registered source {}", source);
            self.sources.insert(source, SourceQueue::default());
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceKey> {
        self.sources.keys()
    }

    pub fn window_length_ms(&self) -> u64 {
        self.window_length_ms
    }

    pub fn window_step_ms(&self) -> u64 {
        self.window_step_ms
    }

    pub fn cursor_ms(&self) -> Option<u64> {
        self.cursor_ms
    }

    pub fn stats(&self) -> FusionStats {
        self.stats
    }

    /// Number of samples waiting in all source queues
    pub fn pending_samples(&self) -> usize {
        self.sources.values().map(|q| q.samples.len()).sum()
    }

    /// Append one sample to its source queue
    ///
    /// # Returns
    /// * `Ok(())` - sample buffered
    /// * `Err(FusionError)` - sample dropped (out of order, behind the
    ///   window cursor, or from an unknown source); the drop is counted
    pub fn push(&mut self, sample: Sample) -> Result<(), FusionError> {
        let result = self.try_push(sample);
        if let Err(err) = &result {
            let reason = match err {
                FusionError::OutOfOrder { .. } => {
                    self.stats.reorder_drops += 1;
                    DropReason::Reorder
                }
                FusionError::BehindWindow { .. } => {
                    self.stats.late_drops += 1;
                    DropReason::Late
                }
                FusionError::UnregisteredSource { .. } => {
                    self.stats.unregistered_drops += 1;
                    DropReason::Unregistered
                }
            };
            log_fusion_error(err, "push");
            telemetry::hub().record_sample_dropped(&sample.source, reason);
        }
        result
    }

    fn try_push(&mut self, sample: Sample) -> Result<(), FusionError> {
        if self.auto_register {
            self.register_source(sample.source);
        }
        let queue = self
            .sources
            .get_mut(&sample.source)
            .ok_or(FusionError::UnregisteredSource {
                source: sample.source,
            })?;

        if let Some(previous_ms) = queue.last_timestamp_ms {
            if sample.timestamp_ms <= previous_ms {
                return Err(FusionError::OutOfOrder {
                    source: sample.source,
                    timestamp_ms: sample.timestamp_ms,
                    previous_ms,
                });
            }
        }
        if let Some(cursor_ms) = self.cursor_ms {
            if sample.timestamp_ms < cursor_ms {
                return Err(FusionError::BehindWindow {
                    source: sample.source,
                    timestamp_ms: sample.timestamp_ms,
                    cursor_ms,
                });
            }
        }

        queue.samples.push_back(sample);
        queue.last_timestamp_ms = Some(sample.timestamp_ms);
        self.cursor_ms.get_or_insert(sample.timestamp_ms);
        self.clock_ms = self.clock_ms.max(sample.timestamp_ms);
        Ok(())
    }

    /// Record the ground-truth hint in effect from `timestamp_ms` on
    pub fn annotate(&mut self, timestamp_ms: u64, hint: Option<ExerciseLabel>) {
        let current = self.hints.range(..=timestamp_ms).next_back().map(|(_, h)| h);
        if current != Some(&hint) {
            self.hints.insert(timestamp_ms, hint);
        }
    }

    /// Release the next window if it is complete or timed out
    ///
    /// Non-blocking; returns `None` while the current window still waits for
    /// a source.
    pub fn poll(&mut self) -> Option<FusedWindow> {
        loop {
            let start_ms = self.cursor_ms?;
            let end_ms = start_ms + self.window_length_ms;

            let uncovered: BTreeSet<SourceKey> = self
                .sources
                .iter()
                .filter(|(_, queue)| !queue.covers(end_ms))
                .map(|(source, _)| *source)
                .collect();

            if !uncovered.is_empty() && self.clock_ms < end_ms + self.gap_timeout_ms {
                return None;
            }

            let has_data = self.sources.values().any(|queue| {
                queue
                    .samples
                    .front()
                    .is_some_and(|s| s.timestamp_ms < end_ms)
            });
            if !has_data {
                // Every source went quiet across this span; jump to the next data.
                let next_ms = self
                    .sources
                    .values()
                    .filter_map(|queue| queue.samples.front())
                    .map(|s| s.timestamp_ms)
                    .min()?;
                let steps = ((next_ms - start_ms) / self.window_step_ms).max(1);
                self.stats.skipped_windows += steps;
                self.advance(start_ms + steps * self.window_step_ms);
                continue;
            }

            let channels = self
                .sources
                .iter()
                .map(|(source, queue)| FusedChannel {
                    source: *source,
                    samples: queue
                        .samples
                        .iter()
                        .take_while(|s| s.timestamp_ms < end_ms)
                        .copied()
                        .collect(),
                })
                .collect();

            let hint = self
                .hints
                .range(..end_ms)
                .next_back()
                .and_then(|(_, hint)| hint.clone());

            let window = FusedWindow {
                start_ms,
                length_ms: self.window_length_ms,
                channels,
                gaps: uncovered,
                hint,
            };

            self.stats.windows_emitted += 1;
            if window.has_gap() {
                self.stats.gap_windows += 1;
                let missing: Vec<SourceKey> = window.gaps.iter().copied().collect();
                log::debug!(
                    "[FusionBuffer] Window at {}ms emitted with {} gap(s)",
                    start_ms,
                    missing.len()
                );
                telemetry::hub().record_fusion_gap(start_ms, &missing);
            }

            self.advance(start_ms + self.window_step_ms);
            return Some(window);
        }
    }

    fn advance(&mut self, cursor_ms: u64) {
        self.cursor_ms = Some(cursor_ms);
        for queue in self.sources.values_mut() {
            queue.discard_before(cursor_ms);
        }
        // Keep the hint in effect at the cursor plus everything after it
        if let Some((&effective, _)) = self.hints.range(..=cursor_ms).next_back() {
            self.hints = self.hints.split_off(&effective);
        }
    }

    /// Change the window step; any change drops in-flight fusion state
    pub fn set_window_step(&mut self, step_ms: u64) -> Result<(), ConfigError> {
        if step_ms == 0 || step_ms > self.window_length_ms {
            return Err(ConfigError::InvalidParameter {
                field: "fusion.window_step_ms",
                reason: format!("must be in 1..={}", self.window_length_ms),
            });
        }
        if step_ms != self.window_step_ms {
            log::info!(
                "[FusionBuffer] Window step {}ms -> {}ms, resetting",
                self.window_step_ms,
                step_ms
            );
            self.window_step_ms = step_ms;
            self.reset();
        }
        Ok(())
    }

    /// Drop queued samples, hints and the cursor; registrations survive
    pub fn reset(&mut self) {
        for queue in self.sources.values_mut() {
            queue.samples.clear();
            queue.last_timestamp_ms = None;
        }
        self.cursor_ms = None;
        self.clock_ms = 0;
        self.hints.clear();
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
