// Signal extraction - picks the axis that carries the movement
//
// Repetitive lifts move one axis far more than the others. Working on that
// single axis with its mean removed keeps gravity out of the spectrum and
// avoids the frequency doubling a vector magnitude would introduce.

use std::collections::{BTreeMap, BTreeSet};

use crate::fusion::{FusedChannel, FusedWindow};
use crate::sensor::{Sample, SensorType, SourceKey};

/// Mean-free samples of one axis of one source
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSignal {
    pub source: SourceKey,
    pub axis: usize,
    pub values: Vec<f32>,
    pub sample_rate_hz: f32,
    /// Standard deviation in raw sensor units
    pub std_dev: f32,
}

impl AxisSignal {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn duration_ms(&self) -> f32 {
        self.values.len() as f32 * 1000.0 / self.sample_rate_hz
    }
}

/// Highest-variance axis across the accelerometer channels
///
/// Falls back to gyroscope channels when no accelerometer channel holds
/// enough samples to derive a rate.
pub fn dominant_axis<'a, I>(channels: I) -> Option<AxisSignal>
where
    I: IntoIterator<Item = &'a FusedChannel>,
{
    let channels: Vec<&FusedChannel> = channels.into_iter().filter(|c| c.is_motion()).collect();

    [SensorType::Accelerometer, SensorType::Gyroscope]
        .into_iter()
        .find_map(|sensor| {
            channels
                .iter()
                .filter(|c| c.source.sensor == sensor)
                .filter_map(|c| strongest_axis(c))
                .max_by(|a, b| a.std_dev.total_cmp(&b.std_dev))
        })
}

fn strongest_axis(channel: &FusedChannel) -> Option<AxisSignal> {
    let sample_rate_hz = channel.sample_rate_hz()?;

    (0..channel.source.sensor.dimension())
        .map(|axis| {
            let raw: Vec<f32> = channel
                .samples
                .iter()
                .filter_map(|s| s.value.axis(axis))
                .map(f32::from)
                .collect();
            let mean = raw.iter().sum::<f32>() / raw.len() as f32;
            let values: Vec<f32> = raw.iter().map(|v| v - mean).collect();
            let variance = values.iter().map(|v| v * v).sum::<f32>() / values.len() as f32;

            AxisSignal {
                source: channel.source,
                axis,
                values,
                sample_rate_hz,
                std_dev: variance.sqrt(),
            }
        })
        .max_by(|a, b| a.std_dev.total_cmp(&b.std_dev))
}

/// Join the channels of consecutive (possibly overlapping) windows
///
/// Samples seen in several windows are kept once, keyed by timestamp.
pub fn merge_channels(windows: &[FusedWindow]) -> Vec<FusedChannel> {
    let mut merged: BTreeMap<SourceKey, BTreeMap<u64, Sample>> = BTreeMap::new();
    for channel in windows.iter().flat_map(|w| w.channels.iter()) {
        let samples = merged.entry(channel.source).or_default();
        for sample in &channel.samples {
            samples.entry(sample.timestamp_ms).or_insert(*sample);
        }
    }

    merged
        .into_iter()
        .map(|(source, samples)| FusedChannel {
            source,
            samples: samples.into_values().collect(),
        })
        .collect()
}

/// Sources gap-marked in any of the windows
pub fn merged_gaps(windows: &[FusedWindow]) -> BTreeSet<SourceKey> {
    windows.iter().flat_map(|w| w.gaps.iter().copied()).collect()
}

/// Mean and coefficient of variation of a series
pub fn coefficient_of_variation(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    if mean.abs() <= f32::EPSILON {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    Some(variance.sqrt() / mean.abs())
}
