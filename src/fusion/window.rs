// FusedWindow - multi-source aggregate over one time span

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::sensor::{Sample, SensorType, SourceKey};
use crate::types::ExerciseLabel;

/// Samples of one source inside a window, in timestamp order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedChannel {
    pub source: SourceKey,
    pub samples: Vec<Sample>,
}

impl FusedChannel {
    pub fn new(source: SourceKey) -> Self {
        Self {
            source,
            samples: Vec::new(),
        }
    }

    pub fn is_motion(&self) -> bool {
        self.source.sensor.dimension() == 3
    }

    /// Mean sample rate derived from timestamps, if at least two samples exist
    pub fn sample_rate_hz(&self) -> Option<f32> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        let span_ms = last.timestamp_ms.checked_sub(first.timestamp_ms)?;
        if span_ms == 0 {
            return None;
        }
        Some((self.samples.len() - 1) as f32 * 1000.0 / span_ms as f32)
    }
}

/// Time-aligned window over every registered source
///
/// Channels are ordered by `SourceKey`. A source listed in `gaps` did not
/// cover the full span before the gap timeout; its channel may be empty or
/// hold only the samples that did arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedWindow {
    pub start_ms: u64,
    pub length_ms: u64,
    pub channels: Vec<FusedChannel>,
    pub gaps: BTreeSet<SourceKey>,
    /// Ground-truth hint attached to the frames covering this span
    pub hint: Option<ExerciseLabel>,
}

impl FusedWindow {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.length_ms
    }

    pub fn has_gap(&self) -> bool {
        !self.gaps.is_empty()
    }

    pub fn channel(&self, source: &SourceKey) -> Option<&FusedChannel> {
        self.channels.iter().find(|c| c.source == *source)
    }

    /// 3-axis channels (accelerometer first, then gyroscope)
    pub fn motion_channels(&self) -> impl Iterator<Item = &FusedChannel> {
        self.channels.iter().filter(|c| c.is_motion())
    }

    /// Channels of one sensor type
    pub fn channels_of(&self, sensor: SensorType) -> impl Iterator<Item = &FusedChannel> {
        self.channels.iter().filter(move |c| c.source.sensor == sensor)
    }

    pub fn sample_count(&self) -> usize {
        self.channels.iter().map(|c| c.samples.len()).sum()
    }
}
