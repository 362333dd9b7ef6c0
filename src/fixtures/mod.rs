//! Synthetic motion fixtures for tests and the CLI harness.
//!
//! A fixture describes a session as a sequence of segments (rest,
//! repetitions, noise) worn by one or more sensors. Rendering it produces
//! the framed byte buffers a wearable would send, so fixtures exercise the
//! full decode -> fuse -> detect path.

use std::f32::consts::PI;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensor::{ByteOrder, Location, SampleDecoder, SampleValue, SensorType, SourceKey};
use crate::types::ExerciseLabel;

/// Raw accelerometer reading of 1 g
pub const GRAVITY_RAW: f32 = 1_000.0;

/// Declarative description of a synthetic session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionFixtureSpec {
    pub id: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u8,
    /// Records per emitted frame
    #[serde(default = "default_frame_samples")]
    pub frame_samples: usize,
    #[serde(default)]
    pub start_ms: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub byte_order: ByteOrder,
    pub sensors: Vec<FixtureSensor>,
    pub segments: Vec<FixtureSegment>,
}

/// One worn sensor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FixtureSensor {
    pub sensor: SensorType,
    #[serde(default)]
    pub device: u8,
    pub location: Location,
    /// Scales movement amplitude at this location
    #[serde(default = "default_gain")]
    pub gain: f32,
}

impl FixtureSensor {
    pub fn new(sensor: SensorType, device: u8, location: Location) -> Self {
        Self {
            sensor,
            device,
            location,
            gain: 1.0,
        }
    }

    pub fn source(&self) -> SourceKey {
        SourceKey::new(self.sensor, self.device, self.location)
    }
}

/// Stretch of the session with one motion pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixtureSegment {
    pub duration_ms: u64,
    pub pattern: MotionPattern,
    /// Ground-truth hint attached to the frames of this segment
    #[serde(default)]
    pub label: Option<ExerciseLabel>,
}

impl FixtureSegment {
    pub fn rest(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            pattern: MotionPattern::Rest { noise: 8.0 },
            label: None,
        }
    }

    pub fn repetitions(duration_ms: u64, period_ms: f32, label: &str) -> Self {
        Self {
            duration_ms,
            pattern: MotionPattern::Repetitions {
                period_ms,
                amplitude: 600.0,
                noise: 15.0,
            },
            label: Some(ExerciseLabel::new(label)),
        }
    }
}

/// Supported deterministic motion patterns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionPattern {
    /// Sensor at rest, gravity plus sensor noise
    Rest { noise: f32 },
    /// Sinusoidal lift on the vertical axis
    Repetitions {
        period_ms: f32,
        amplitude: f32,
        noise: f32,
    },
    /// Unstructured movement
    WhiteNoise { amplitude: f32 },
}

/// One rendered frame, ready for `Preclassification::push_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureFrame {
    pub location: Location,
    pub timestamp_ms: u64,
    pub hint: Option<ExerciseLabel>,
    pub bytes: Vec<u8>,
}

fn default_sample_rate() -> u8 {
    50
}

fn default_frame_samples() -> usize {
    25
}

fn default_seed() -> u64 {
    0x5A5A_FFF0
}

fn default_gain() -> f32 {
    1.0
}

fn jitter(rng: &mut StdRng, amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

fn clamp_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl MotionFixtureSpec {
    /// Fixture worn on the right wrist (accelerometer only)
    pub fn wrist(id: impl Into<String>, segments: Vec<FixtureSegment>) -> Self {
        Self {
            id: id.into(),
            sample_rate_hz: default_sample_rate(),
            frame_samples: default_frame_samples(),
            start_ms: 0,
            seed: default_seed(),
            byte_order: ByteOrder::default(),
            sensors: vec![FixtureSensor::new(
                SensorType::Accelerometer,
                1,
                Location::RightWrist,
            )],
            segments,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.segments.iter().map(|s| s.duration_ms).sum()
    }

    /// Validate invariant expectations for downstream pipelines.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::InvalidParameter {
            field,
            reason: reason.to_string(),
        };
        if self.sample_rate_hz == 0 {
            return Err(invalid("fixture.sample_rate_hz", "must be > 0"));
        }
        if self.frame_samples == 0 || self.frame_samples > u8::MAX as usize {
            return Err(invalid("fixture.frame_samples", "must be in 1..=255"));
        }
        if self.sensors.is_empty() {
            return Err(invalid("fixture.sensors", "at least one sensor required"));
        }
        if self.start_ms + self.duration_ms() > u32::MAX as u64 {
            return Err(invalid("fixture.segments", "session exceeds the frame clock"));
        }
        for segment in &self.segments {
            if let MotionPattern::Repetitions { period_ms, .. } = segment.pattern {
                if period_ms <= 0.0 {
                    return Err(invalid("fixture.segments", "period_ms must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Render the session into frames in timestamp order
    pub fn render(&self) -> Result<Vec<FixtureFrame>, ConfigError> {
        self.validate()?;

        let rate = self.sample_rate_hz as u64;
        let total = (self.duration_ms() * rate / 1000) as usize;
        let decoder = SampleDecoder::new(self.byte_order);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut frames = Vec::new();

        for first in (0..total).step_by(self.frame_samples) {
            let count = self.frame_samples.min(total - first);
            let frame_ms = self.start_ms + first as u64 * 1000 / rate;
            let hint = self
                .segment_at(frame_ms - self.start_ms)
                .and_then(|(segment, _)| segment.label.clone());

            for sensor in &self.sensors {
                let values: Vec<SampleValue> = (first..first + count)
                    .map(|i| {
                        let offset_ms = i as u64 * 1000 / rate;
                        self.value_at(sensor, offset_ms, &mut rng)
                    })
                    .collect();

                let frame =
                    decoder.encode(sensor.source(), self.sample_rate_hz, frame_ms, &values);
                frames.push(FixtureFrame {
                    location: sensor.location,
                    timestamp_ms: frame_ms,
                    hint: hint.clone(),
                    bytes: frame.to_bytes(self.byte_order),
                });
            }
        }
        Ok(frames)
    }

    /// Segment covering `offset_ms` and the offset into it
    fn segment_at(&self, offset_ms: u64) -> Option<(&FixtureSegment, u64)> {
        let mut begin = 0;
        for segment in &self.segments {
            if offset_ms < begin + segment.duration_ms {
                return Some((segment, offset_ms - begin));
            }
            begin += segment.duration_ms;
        }
        None
    }

    fn value_at(&self, sensor: &FixtureSensor, offset_ms: u64, rng: &mut StdRng) -> SampleValue {
        let (movement, noise) = match self.segment_at(offset_ms) {
            Some((segment, into_ms)) => match segment.pattern {
                MotionPattern::Rest { noise } => (0.0, noise),
                MotionPattern::Repetitions {
                    period_ms,
                    amplitude,
                    noise,
                } => {
                    let phase = 2.0 * PI * into_ms as f32 / period_ms;
                    (amplitude * sensor.gain * phase.sin(), noise)
                }
                MotionPattern::WhiteNoise { amplitude } => {
                    (jitter(rng, amplitude * sensor.gain), 0.0)
                }
            },
            None => (0.0, 0.0),
        };

        match sensor.sensor {
            SensorType::Accelerometer => SampleValue::Triple {
                x: clamp_i16(jitter(rng, noise)),
                y: clamp_i16(movement + jitter(rng, noise)),
                z: clamp_i16(GRAVITY_RAW + jitter(rng, noise)),
            },
            SensorType::Gyroscope => SampleValue::Triple {
                x: clamp_i16(movement * 0.5 + jitter(rng, noise)),
                y: clamp_i16(jitter(rng, noise)),
                z: clamp_i16(jitter(rng, noise)),
            },
            SensorType::HeartRate => {
                let effort = (movement.abs() / 600.0).min(1.0);
                SampleValue::Scalar(clamp_i16(70.0 + 40.0 * effort))
            }
        }
    }
}

/// Load a fixture description from JSON
pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<MotionFixtureSpec> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    let spec: MotionFixtureSpec = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse fixture {}", path.display()))?;
    spec.validate()
        .with_context(|| format!("invalid fixture {}", path.display()))?;
    Ok(spec)
}
