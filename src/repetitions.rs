// RepetitionEstimator - block-level repetition count
//
// Finds the repetition period of the dominant axis via its spectral peak,
// then counts how many periods fit the active part of the signal. Overlapping
// windows of a block are merged by timestamp first so that each sample is
// analysed once; the rest a block starts and ends with is not counted.

use crate::config::{RepetitionConfig, RepetitionProfile};
use crate::error::{ErrorCode, RepetitionUnavailable};
use crate::fusion::{FusedChannel, FusedWindow};
use crate::motion::{dominant_axis, merge_channels, AxisSignal, SpectrumAnalyzer};
use crate::types::ExerciseLabel;

pub struct RepetitionEstimator {
    config: RepetitionConfig,
    analyzer: SpectrumAnalyzer,
}

impl RepetitionEstimator {
    pub fn new(config: RepetitionConfig) -> Self {
        Self::with_analyzer(config, SpectrumAnalyzer::new())
    }

    pub fn with_analyzer(config: RepetitionConfig, analyzer: SpectrumAnalyzer) -> Self {
        Self { config, analyzer }
    }

    /// Repetitions in a single window, `None` when unavailable
    pub fn estimate(&self, window: &FusedWindow) -> Option<u32> {
        self.try_estimate(window).ok()
    }

    pub fn try_estimate(&self, window: &FusedWindow) -> Result<u32, RepetitionUnavailable> {
        self.count(&window.channels, self.default_band())
    }

    /// Repetitions across a block of windows
    ///
    /// # Arguments
    /// * `windows` - block windows in emission order, overlap allowed
    /// * `label` - resolved exercise, selects a per-exercise period band
    pub fn estimate_block(
        &self,
        windows: &[FusedWindow],
        label: Option<&ExerciseLabel>,
    ) -> Option<u32> {
        match self.try_estimate_block(windows, label) {
            Ok(count) => Some(count),
            Err(reason) => {
                log::debug!(
                    "[RepetitionEstimator] No count for {:?} (code {}): {}",
                    label.map(|l| l.as_str()),
                    reason.code(),
                    reason.message()
                );
                None
            }
        }
    }

    pub fn try_estimate_block(
        &self,
        windows: &[FusedWindow],
        label: Option<&ExerciseLabel>,
    ) -> Result<u32, RepetitionUnavailable> {
        let band = label
            .and_then(|l| self.config.profiles.get(l.as_str()))
            .copied()
            .unwrap_or_else(|| self.default_band());
        self.count(&merge_channels(windows), band)
    }

    fn default_band(&self) -> RepetitionProfile {
        RepetitionProfile {
            min_period_ms: self.config.min_period_ms,
            max_period_ms: self.config.max_period_ms,
        }
    }

    fn count(
        &self,
        channels: &[FusedChannel],
        band: RepetitionProfile,
    ) -> Result<u32, RepetitionUnavailable> {
        let required = self.config.min_samples;
        let signal = dominant_axis(channels).ok_or(RepetitionUnavailable::SignalTooShort {
            samples: 0,
            required,
        })?;
        if signal.len() < required {
            return Err(RepetitionUnavailable::SignalTooShort {
                samples: signal.len(),
                required,
            });
        }

        let min_periodicity = self.config.min_periodicity;
        let periodicity = self
            .analyzer
            .periodicity(&signal, band.min_period_ms, band.max_period_ms)
            .ok_or(RepetitionUnavailable::InsufficientPeriodicity {
                strength: 0.0,
                required: min_periodicity,
            })?;
        if periodicity.strength < min_periodicity {
            return Err(RepetitionUnavailable::InsufficientPeriodicity {
                strength: periodicity.strength,
                required: min_periodicity,
            });
        }

        let active_ms = active_span_ms(&signal, self.config.active_threshold);
        let cycles = (active_ms / periodicity.period_ms).round() as u32;
        if cycles < self.config.min_cycles {
            return Err(RepetitionUnavailable::InsufficientCycles {
                cycles,
                required: self.config.min_cycles,
            });
        }
        Ok(cycles)
    }
}

/// Duration from the first to the last sample reaching `fraction` of the peak
fn active_span_ms(signal: &AxisSignal, fraction: f32) -> f32 {
    let peak = signal.values.iter().fold(0.0f32, |peak, v| peak.max(v.abs()));
    let threshold = peak * fraction;
    let active = |v: &f32| v.abs() >= threshold;

    match (
        signal.values.iter().position(active),
        signal.values.iter().rposition(active),
    ) {
        (Some(first), Some(last)) => (last - first + 1) as f32 * 1000.0 / signal.sample_rate_hz,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Location, Sample, SampleValue, SensorType, SourceKey};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    const RATE_MS: u64 = 20;

    fn source() -> SourceKey {
        SourceKey::new(SensorType::Accelerometer, 1, Location::RightWrist)
    }

    /// Window over `ys` sampled at 50 Hz on the y axis, gravity on z
    fn window_from(start_ms: u64, ys: &[i16]) -> FusedWindow {
        let samples = ys
            .iter()
            .enumerate()
            .map(|(i, &y)| Sample {
                source: source(),
                timestamp_ms: start_ms + i as u64 * RATE_MS,
                value: SampleValue::Triple { x: 3, y, z: 1_000 },
            })
            .collect();
        FusedWindow {
            start_ms,
            length_ms: ys.len() as u64 * RATE_MS,
            channels: vec![FusedChannel {
                source: source(),
                samples,
            }],
            gaps: BTreeSet::new(),
            hint: None,
        }
    }

    fn sinusoid(cycles: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * cycles * i as f32 / len as f32;
                (600.0 * phase.sin()) as i16
            })
            .collect()
    }

    #[test]
    fn test_eight_cycle_sinusoid_counts_eight() {
        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let count = estimator.estimate(&window_from(0, &sinusoid(8.0, 400))).unwrap();
        assert!((7..=9).contains(&count), "counted {}", count);
    }

    #[test]
    fn test_rest_around_a_set_is_not_counted() {
        let mut ys = vec![0i16; 200];
        ys.extend(sinusoid(8.0, 400));
        ys.extend(vec![0i16; 300]);

        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let count = estimator.estimate(&window_from(0, &ys)).unwrap();
        assert!((7..=9).contains(&count), "counted {}", count);
    }

    #[test]
    fn test_noise_has_no_estimate() {
        let mut rng = StdRng::seed_from_u64(42);
        let ys: Vec<i16> = (0..400).map(|_| rng.gen_range(-600..600)).collect();

        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let window = window_from(0, &ys);
        assert_eq!(estimator.estimate(&window), None);
        assert!(matches!(
            estimator.try_estimate(&window),
            Err(RepetitionUnavailable::InsufficientPeriodicity { .. })
        ));
    }

    #[test]
    fn test_short_signal_is_rejected() {
        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let result = estimator.try_estimate(&window_from(0, &sinusoid(2.0, 10)));
        assert_eq!(
            result,
            Err(RepetitionUnavailable::SignalTooShort {
                samples: 10,
                required: 16
            })
        );
    }

    #[test]
    fn test_single_cycle_is_below_minimum() {
        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let result = estimator.try_estimate(&window_from(0, &sinusoid(1.0, 300)));
        assert_eq!(
            result,
            Err(RepetitionUnavailable::InsufficientCycles {
                cycles: 1,
                required: 2
            })
        );
    }

    #[test]
    fn test_block_merges_overlapping_windows() {
        let ys = sinusoid(8.0, 400);
        let first = window_from(0, &ys[..250]);
        let second = window_from(150 * RATE_MS, &ys[150..]);

        let estimator = RepetitionEstimator::new(RepetitionConfig::default());
        let count = estimator.estimate_block(&[first, second], None).unwrap();
        assert!((7..=9).contains(&count), "counted {}", count);
    }

    #[test]
    fn test_profile_band_applies_per_label() {
        let mut config = RepetitionConfig::default();
        config.profiles.insert(
            "Deadlift".to_string(),
            RepetitionProfile {
                min_period_ms: 3_000.0,
                max_period_ms: 8_000.0,
            },
        );
        let estimator = RepetitionEstimator::new(config);
        let windows = [window_from(0, &sinusoid(8.0, 400))];

        assert!(estimator.estimate_block(&windows, Some(&"Squat".into())).is_some());
        assert!(matches!(
            estimator.try_estimate_block(&windows, Some(&"Deadlift".into())),
            Err(RepetitionUnavailable::InsufficientPeriodicity { .. })
        ));
    }
}
