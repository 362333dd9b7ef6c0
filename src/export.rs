// Export codec - fused-window corpus bytes handed to observers
//
// Layout (all integers little-endian):
//
//   magic "LSFW" | version u8 | window count u32
//   per window:  start_ms u64 | length_ms u32 | hint len u16 | hint utf8
//                | channel count u16
//   per channel: sensor tag u8 | device u8 | location u8 | gap flag u8
//                | sample count u32
//   per sample:  timestamp_ms u64 | 1 or 3 x i16

use std::collections::BTreeSet;

use crate::error::ExportError;
use crate::fusion::{FusedChannel, FusedWindow};
use crate::sensor::{Location, Sample, SampleValue, SensorType, SourceKey};
use crate::types::ExerciseLabel;

pub const EXPORT_MAGIC: &[u8; 4] = b"LSFW";
pub const EXPORT_VERSION: u8 = 1;

/// Serialize windows into the export format
pub fn encode_windows(windows: &[FusedWindow]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + windows.iter().map(encoded_len).sum::<usize>());
    out.extend_from_slice(EXPORT_MAGIC);
    out.push(EXPORT_VERSION);
    out.extend_from_slice(&(windows.len() as u32).to_le_bytes());

    for window in windows {
        out.extend_from_slice(&window.start_ms.to_le_bytes());
        out.extend_from_slice(&(window.length_ms as u32).to_le_bytes());

        let hint = truncate_hint(window.hint.as_ref().map(|h| h.as_str()).unwrap_or(""));
        out.extend_from_slice(&(hint.len() as u16).to_le_bytes());
        out.extend_from_slice(hint.as_bytes());

        out.extend_from_slice(&(window.channels.len() as u16).to_le_bytes());
        for channel in &window.channels {
            let source = channel.source;
            out.push(source.sensor.tag());
            out.push(source.device);
            out.push(source.location.to_u8());
            out.push(window.gaps.contains(&source) as u8);
            out.extend_from_slice(&(channel.samples.len() as u32).to_le_bytes());

            for sample in &channel.samples {
                out.extend_from_slice(&sample.timestamp_ms.to_le_bytes());
                for axis in 0..source.sensor.dimension() {
                    let value = sample.value.axis(axis).unwrap_or_default();
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
    out
}

/// Longest prefix of `hint` that fits the u16 length field on a char boundary
fn truncate_hint(hint: &str) -> &str {
    let mut end = hint.len().min(u16::MAX as usize);
    while !hint.is_char_boundary(end) {
        end -= 1;
    }
    &hint[..end]
}

fn encoded_len(window: &FusedWindow) -> usize {
    let hint = truncate_hint(window.hint.as_ref().map(|h| h.as_str()).unwrap_or("")).len();
    let channels: usize = window
        .channels
        .iter()
        .map(|c| 8 + c.samples.len() * (8 + c.source.sensor.record_size()))
        .sum();
    16 + hint + channels
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ExportError> {
        let available = self.bytes.len() - self.pos;
        if available < n {
            return Err(ExportError::NotEnoughInput {
                needed: n,
                available,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ExportError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ExportError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ExportError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ExportError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, ExportError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16, ExportError> {
        Ok(i16::from_le_bytes(self.array()?))
    }
}

fn bad_header(reason: impl Into<String>) -> ExportError {
    ExportError::BadHeader {
        reason: reason.into(),
    }
}

/// Parse bytes produced by [`encode_windows`]
///
/// # Returns
/// * `Err(ExportError::NotEnoughInput)` - input truncated
/// * `Err(ExportError::BadHeader)` - wrong magic or version, unknown sensor
///   tag, or a hint that is not UTF-8
pub fn decode_windows(bytes: &[u8]) -> Result<Vec<FusedWindow>, ExportError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(4)? != EXPORT_MAGIC {
        return Err(bad_header("magic mismatch"));
    }
    let version = reader.u8()?;
    if version != EXPORT_VERSION {
        return Err(bad_header(format!("unsupported version {}", version)));
    }

    let window_count = reader.u32()? as usize;
    let mut windows = Vec::with_capacity(window_count.min(1024));
    for _ in 0..window_count {
        let start_ms = reader.u64()?;
        let length_ms = reader.u32()? as u64;

        let hint_len = reader.u16()? as usize;
        let hint = match hint_len {
            0 => None,
            n => {
                let text = std::str::from_utf8(reader.take(n)?)
                    .map_err(|_| bad_header("hint is not valid UTF-8"))?;
                Some(ExerciseLabel::new(text))
            }
        };

        let channel_count = reader.u16()? as usize;
        let mut channels = Vec::with_capacity(channel_count);
        let mut gaps = BTreeSet::new();
        for _ in 0..channel_count {
            let tag = reader.u8()?;
            let sensor = SensorType::from_tag(tag)
                .ok_or_else(|| bad_header(format!("unknown sensor tag {}", tag)))?;
            let device = reader.u8()?;
            let location = Location::from_u8(reader.u8()?);
            let source = SourceKey::new(sensor, device, location);
            if reader.u8()? != 0 {
                gaps.insert(source);
            }

            let sample_count = reader.u32()? as usize;
            let mut channel = FusedChannel::new(source);
            channel.samples.reserve(sample_count.min(65_536));
            for _ in 0..sample_count {
                let timestamp_ms = reader.u64()?;
                let value = match sensor.dimension() {
                    3 => SampleValue::Triple {
                        x: reader.i16()?,
                        y: reader.i16()?,
                        z: reader.i16()?,
                    },
                    _ => SampleValue::Scalar(reader.i16()?),
                };
                channel.samples.push(Sample {
                    source,
                    timestamp_ms,
                    value,
                });
            }
            channels.push(channel);
        }

        windows.push(FusedWindow {
            start_ms,
            length_ms,
            channels,
            gaps,
            hint,
        });
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> FusedWindow {
        let accel = SourceKey::new(SensorType::Accelerometer, 3, Location::LeftWrist);
        let heart = SourceKey::new(SensorType::HeartRate, 1, Location::Chest);

        FusedWindow {
            start_ms: 12_000,
            length_ms: 5_000,
            channels: vec![
                FusedChannel {
                    source: accel,
                    samples: vec![
                        Sample {
                            source: accel,
                            timestamp_ms: 12_000,
                            value: SampleValue::Triple { x: -5, y: 900, z: 3 },
                        },
                        Sample {
                            source: accel,
                            timestamp_ms: 12_020,
                            value: SampleValue::Triple { x: -7, y: 910, z: 2 },
                        },
                    ],
                },
                FusedChannel::new(heart),
            ],
            gaps: [heart].into_iter().collect(),
            hint: Some(ExerciseLabel::from("Bench Press")),
        }
    }

    #[test]
    fn test_export_preserves_windows() {
        let windows = vec![window(), FusedWindow { hint: None, ..window() }];
        let bytes = encode_windows(&windows);

        assert_eq!(&bytes[..4], EXPORT_MAGIC);
        assert_eq!(bytes.len(), 9 + windows.iter().map(encoded_len).sum::<usize>());
        assert_eq!(decode_windows(&bytes).unwrap(), windows);
    }

    #[test]
    fn test_oversized_hint_is_cut_on_a_char_boundary() {
        // 2-byte chars; u16::MAX is odd, so a byte cut would split one
        let long = "é".repeat(40_000);
        let windows = vec![FusedWindow {
            hint: Some(ExerciseLabel::from(long.as_str())),
            ..window()
        }];
        let bytes = encode_windows(&windows);

        let decoded = decode_windows(&bytes).unwrap();
        let hint = decoded[0].hint.as_ref().unwrap().as_str();
        assert_eq!(hint.len(), u16::MAX as usize - 1);
        assert!(long.starts_with(hint));
        assert_eq!(bytes.len(), 9 + windows.iter().map(encoded_len).sum::<usize>());
    }

    #[test]
    fn test_empty_corpus() {
        let bytes = encode_windows(&[]);
        assert_eq!(bytes.len(), 9);
        assert!(decode_windows(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_input_reports_not_enough_input() {
        let bytes = encode_windows(&[window()]);
        let err = decode_windows(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(
            err,
            ExportError::NotEnoughInput {
                needed: 4,
                available: 1
            }
        );

        assert!(matches!(
            decode_windows(b"LS"),
            Err(ExportError::NotEnoughInput { needed: 4, available: 2 })
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = encode_windows(&[window()]);
        bytes[4] = 9;
        assert!(matches!(
            decode_windows(&bytes),
            Err(ExportError::BadHeader { .. })
        ));

        bytes[0] = b'X';
        assert!(matches!(
            decode_windows(&bytes),
            Err(ExportError::BadHeader { reason }) if reason.contains("magic")
        ));
    }
}
