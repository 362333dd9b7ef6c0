// Fusion module - time alignment of multi-source sample streams
//
// Samples from every (sensor, device, location) source are buffered per
// source and cut into fixed-length windows that advance by a configurable
// step. A window is released once every registered source has reached its
// end, or once the stream clock has run past the end by the gap timeout, in
// which case the silent sources are gap-marked.
//
// Pipeline position: SampleDecoder -> FusionBuffer -> FusedWindow -> detector/engine

pub mod buffer;
pub mod window;

pub use buffer::{FusionBuffer, FusionStats};
pub use window::{FusedChannel, FusedWindow};
