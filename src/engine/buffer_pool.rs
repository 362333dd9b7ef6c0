// FrameBufferPool - command ring plus recycled frame buffers
//
// Two lock-free SPSC ring buffers connect the host thread and the pipeline
// worker:
// - COMMAND_QUEUE: host pushes commands (frames carry a pooled buffer),
//   worker consumes them in order
// - POOL_QUEUE: worker returns emptied frame buffers, host reuses them
//
// Buffer flow:
// 1. Host pops an empty buffer from POOL_QUEUE (or allocates when it is dry)
// 2. Host copies the frame bytes into it and pushes a Data command
// 3. Worker pops the command and runs the pipeline on the bytes
// 4. Worker clears the buffer and pushes it back to POOL_QUEUE

use rtrb::{Consumer, Producer};

use crate::engine::PipelineCommand;

/// Initial byte capacity of pooled frame buffers (header plus 84 triaxial records)
pub const DEFAULT_FRAME_CAPACITY: usize = 512;

/// Frame buffer type - bytes of one framed sensor payload
pub type FrameBuffer = Vec<u8>;

/// Both ends of both queues, split between host and worker by the handle
pub struct PipelineChannels {
    /// Host side: queue commands for the worker
    pub command_producer: Producer<PipelineCommand>,
    /// Worker side: receive commands
    pub command_consumer: Consumer<PipelineCommand>,
    /// Worker side: return emptied buffers
    pub pool_producer: Producer<FrameBuffer>,
    /// Host side: take buffers to fill
    pub pool_consumer: Consumer<FrameBuffer>,
}

/// Lock-free frame buffer pool using dual SPSC ring buffers
///
/// # Example
/// ```ignore
/// let mut channels = FrameBufferPool::new(64, DEFAULT_FRAME_CAPACITY);
///
/// // Host thread:
/// let mut buffer = channels.pool_consumer.pop().unwrap_or_default();
/// buffer.extend_from_slice(bytes);
/// channels.command_producer.push(PipelineCommand::Data { buffer, location, hint }).ok();
///
/// // Worker thread:
/// if let Ok(PipelineCommand::Data { mut buffer, .. }) = channels.command_consumer.pop() {
///     // Process bytes
///     buffer.clear();
///     channels.pool_producer.push(buffer).ok();
/// }
/// ```
pub struct FrameBufferPool;

impl FrameBufferPool {
    /// Create the command ring and a pool of pre-allocated frame buffers
    ///
    /// # Arguments
    /// * `queue_capacity` - Commands the ring holds, also the number of pooled buffers
    /// * `frame_capacity` - Initial byte capacity of each pooled buffer
    ///
    /// A capacity of zero is raised to one.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(queue_capacity: usize, frame_capacity: usize) -> PipelineChannels {
        let capacity = queue_capacity.max(1);
        let (command_producer, command_consumer) = rtrb::RingBuffer::new(capacity);
        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(capacity);

        for _ in 0..capacity {
            if pool_producer
                .push(Vec::with_capacity(frame_capacity))
                .is_err()
            {
                break;
            }
        }

        PipelineChannels {
            command_producer,
            command_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}
