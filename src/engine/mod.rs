//! Threaded host for the pipeline facade.
//!
//! `PipelineHandle` moves a `Preclassification` onto a worker thread and feeds
//! it through a lock-free command ring, so that sensor callbacks never block on
//! signal processing. Frame bytes travel in recycled buffers (`buffer_pool`).

pub mod buffer_pool;
pub mod handle;

pub use buffer_pool::{FrameBuffer, FrameBufferPool, PipelineChannels, DEFAULT_FRAME_CAPACITY};
pub use handle::{PipelineCommand, PipelineHandle};
