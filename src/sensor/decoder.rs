// SampleDecoder - fixed-size record decoding
//
// Turns the payload of a RawFrame into typed samples. 3-axis sensors carry
// three i16 values per record, 1-axis sensors a single i16. Decoding stops
// at the first malformed record; everything decoded up to that point is
// returned together with the reason, and the caller decides whether to
// surface it.

use crate::error::DecodeError;
use crate::sensor::{ByteOrder, RawFrame, Sample, SampleValue, SensorType, SourceKey};

/// Samples decoded from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBatch {
    pub source: SourceKey,
    pub samples: Vec<Sample>,
    /// Set when decoding stopped early or ignored trailing bytes
    pub partial: Option<DecodeError>,
}

impl DecodedBatch {
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }
}

/// Stateless record decoder (and its symmetric encoder)
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleDecoder {
    byte_order: ByteOrder,
}

impl SampleDecoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { byte_order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Decode every well-formed record of `frame`
    ///
    /// # Returns
    /// * `Ok(DecodedBatch)` - samples decoded so far; `partial` is set when the
    ///   payload was truncated or carried bytes beyond the declared records
    /// * `Err(DecodeError)` - the frame declares records but holds none
    pub fn decode(&self, frame: &RawFrame) -> Result<DecodedBatch, DecodeError> {
        if frame.samples_per_second == 0 {
            return Err(DecodeError::InvalidSampleRate);
        }

        let record_size = frame.sensor_type.record_size();
        let available = frame.payload.len() / record_size;
        if frame.declared_count > 0 && available == 0 {
            return Err(DecodeError::InsufficientData {
                len: frame.payload.len(),
                record_size,
            });
        }

        let source = frame.source();
        let count = available.min(frame.declared_count);
        let sps = frame.samples_per_second as u64;

        let samples: Vec<Sample> = frame
            .payload
            .chunks_exact(record_size)
            .take(count)
            .enumerate()
            .map(|(i, record)| Sample {
                source,
                timestamp_ms: frame.timestamp_ms + (i as u64 * 1000) / sps,
                value: self.decode_record(frame.sensor_type, record),
            })
            .collect();

        let consumed = count * record_size;
        let partial = if count < frame.declared_count {
            Some(DecodeError::TruncatedRecord {
                decoded: count,
                declared: frame.declared_count,
            })
        } else if frame.payload.len() > consumed {
            Some(DecodeError::ExcessData {
                extra_bytes: frame.payload.len() - consumed,
            })
        } else {
            None
        };

        Ok(DecodedBatch {
            source,
            samples,
            partial,
        })
    }

    fn decode_record(&self, sensor_type: SensorType, record: &[u8]) -> SampleValue {
        let read = |offset: usize| self.byte_order.read_i16([record[offset], record[offset + 1]]);
        match sensor_type.dimension() {
            3 => SampleValue::Triple {
                x: read(0),
                y: read(2),
                z: read(4),
            },
            _ => SampleValue::Scalar(read(0)),
        }
    }

    /// Build a frame from sample values
    ///
    /// Values whose dimension does not match the sensor are skipped.
    pub fn encode(
        &self,
        source: SourceKey,
        samples_per_second: u8,
        timestamp_ms: u64,
        values: &[SampleValue],
    ) -> RawFrame {
        let dimension = source.sensor.dimension();
        let mut payload = Vec::with_capacity(values.len() * source.sensor.record_size());
        let mut count = 0usize;

        for value in values.iter().filter(|v| v.dimension() == dimension) {
            for axis in 0..dimension {
                let v = value.axis(axis).unwrap_or_default();
                payload.extend_from_slice(&self.byte_order.write_i16(v));
            }
            count += 1;
        }

        RawFrame {
            sensor_type: source.sensor,
            device_id: source.device,
            location: source.location,
            samples_per_second,
            declared_count: count,
            timestamp_ms,
            payload,
        }
    }
}
