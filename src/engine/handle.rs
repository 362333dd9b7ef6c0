//! PipelineHandle: runs a `Preclassification` on a dedicated worker thread.
//!
//! The host side only copies bytes into a pooled buffer and pushes a command
//! onto the ring; decoding, fusion, detection and classification happen on the
//! worker, which also invokes the observers. Commands are processed strictly
//! in push order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtrb::{Consumer, PopError, Producer};

use crate::engine::buffer_pool::{
    FrameBuffer, FrameBufferPool, PipelineChannels, DEFAULT_FRAME_CAPACITY,
};
use crate::error::{log_engine_error, EngineError};
use crate::pipeline::Preclassification;
use crate::sensor::{Location, RawFrame};
use crate::telemetry;
use crate::types::ExerciseLabel;

const QUEUE_CHANNEL: &str = "pipeline_commands";

/// Command executed by the worker against its `Preclassification`
#[derive(Debug)]
pub enum PipelineCommand {
    /// Framed bytes from `location`; the buffer goes back to the pool afterwards
    Data {
        buffer: FrameBuffer,
        location: Location,
        hint: Option<ExerciseLabel>,
    },
    /// Frame parsed by the host
    Frame {
        frame: RawFrame,
        hint: Option<ExerciseLabel>,
    },
    TrainingStarted(ExerciseLabel),
    TrainingCompleted,
    ExerciseCompleted,
    SetWindowStep(u64),
    /// Stop after every earlier command has run
    Shutdown,
}

/// Host-side handle to a pipeline worker
///
/// Single producer: every method takes `&mut self`.
pub struct PipelineHandle {
    command_producer: Producer<PipelineCommand>,
    pool_consumer: Consumer<FrameBuffer>,
    capacity: usize,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Preclassification>>,
}

impl PipelineHandle {
    /// Move `pipeline` onto a new worker thread
    ///
    /// # Arguments
    /// * `pipeline` - Configured facade with its observers attached
    ///
    /// Queue capacity and idle sleep come from the pipeline's engine config.
    pub fn spawn(pipeline: Preclassification) -> Self {
        let config = pipeline.config().engine.clone();
        let channels = FrameBufferPool::new(config.queue_capacity, DEFAULT_FRAME_CAPACITY);
        let PipelineChannels {
            command_producer,
            command_consumer,
            pool_producer,
            pool_consumer,
        } = channels;

        let running = Arc::new(AtomicBool::new(true));
        let worker = PipelineWorker {
            pipeline,
            command_consumer,
            pool_producer,
            running: Arc::clone(&running),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
        };
        let capacity = command_producer.buffer().capacity();

        log::info!(
            "[PipelineHandle] Spawning worker, queue capacity {}",
            capacity
        );

        Self {
            command_producer,
            pool_consumer,
            capacity,
            running,
            worker: Some(thread::spawn(move || worker.run())),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    /// True until `shutdown` or until the worker exits on its own
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.command_producer.is_abandoned()
    }

    /// Queue one framed buffer for decoding
    ///
    /// # Errors
    /// * `EngineError::QueueFull` - the worker is behind; the frame is dropped
    /// * `EngineError::Stopped` - the worker is gone
    pub fn push_data(
        &mut self,
        bytes: &[u8],
        location: Location,
        hint: Option<ExerciseLabel>,
    ) -> Result<(), EngineError> {
        self.ensure_running()?;
        let mut buffer = match self.pool_consumer.pop() {
            Ok(buffer) => buffer,
            Err(PopError::Empty) => {
                log::debug!("[PipelineHandle] Buffer pool dry, allocating");
                Vec::with_capacity(bytes.len().max(DEFAULT_FRAME_CAPACITY))
            }
        };
        buffer.clear();
        buffer.extend_from_slice(bytes);

        self.send(PipelineCommand::Data {
            buffer,
            location,
            hint,
        })
    }

    /// Queue a frame that was already parsed on the host
    pub fn push_frame(
        &mut self,
        frame: RawFrame,
        hint: Option<ExerciseLabel>,
    ) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.send(PipelineCommand::Frame { frame, hint })
    }

    pub fn training_started(&mut self, label: ExerciseLabel) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.send(PipelineCommand::TrainingStarted(label))
    }

    pub fn training_completed(&mut self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.send(PipelineCommand::TrainingCompleted)
    }

    pub fn exercise_completed(&mut self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.send(PipelineCommand::ExerciseCompleted)
    }

    /// Queue a fusion step change; invalid steps are logged by the worker
    pub fn set_window_step(&mut self, step_ms: u64) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.send(PipelineCommand::SetWindowStep(step_ms))
    }

    /// Drain the queue, stop the worker and hand the pipeline back
    ///
    /// # Errors
    /// * `EngineError::Stopped` - already shut down
    /// * `EngineError::WorkerPanicked` - the worker died; its pipeline is lost
    pub fn shutdown(&mut self) -> Result<Preclassification, EngineError> {
        let worker = self.worker.take().ok_or(EngineError::Stopped)?;
        self.stop_worker();

        worker.join().map_err(|_| {
            let err = EngineError::WorkerPanicked;
            log_engine_error(&err, "shutdown");
            telemetry::hub().record_error(&err, "shutdown");
            err
        })
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::Stopped)
        }
    }

    fn stop_worker(&mut self) {
        // A full ring still drains: the worker exits once it is empty
        let _ = self.command_producer.push(PipelineCommand::Shutdown);
        self.running.store(false, Ordering::SeqCst);
    }

    fn send(&mut self, command: PipelineCommand) -> Result<(), EngineError> {
        let result = self.command_producer.push(command);
        let queued = self.capacity - self.command_producer.slots();
        telemetry::hub()
            .record_queue_occupancy(QUEUE_CHANNEL, queued as f32 / self.capacity as f32 * 100.0);

        result.map_err(|_| {
            let err = EngineError::QueueFull {
                capacity: self.capacity,
            };
            log_engine_error(&err, "send");
            telemetry::hub().record_error(&err, QUEUE_CHANNEL);
            err
        })
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop_worker();
            if worker.join().is_err() {
                log::error!("[PipelineHandle] Worker panicked before drop");
            }
        }
    }
}

struct PipelineWorker {
    pipeline: Preclassification,
    command_consumer: Consumer<PipelineCommand>,
    pool_producer: Producer<FrameBuffer>,
    running: Arc<AtomicBool>,
    idle_sleep: Duration,
}

impl PipelineWorker {
    fn run(mut self) -> Preclassification {
        tracing::info!("[PipelineWorker] Starting command loop");

        loop {
            let command = match self.command_consumer.pop() {
                Ok(command) => command,
                Err(PopError::Empty) => {
                    // Check the running flag only when the queue is empty
                    if !self.running.load(Ordering::SeqCst) {
                        tracing::info!("[PipelineWorker] Stop requested and queue empty, exiting");
                        break;
                    }
                    thread::sleep(self.idle_sleep);
                    continue;
                }
            };

            if !self.execute(command) {
                tracing::info!("[PipelineWorker] Shutdown command received, exiting");
                break;
            }
        }

        self.pipeline
    }

    /// Run one command; false stops the loop
    fn execute(&mut self, command: PipelineCommand) -> bool {
        match command {
            PipelineCommand::Data {
                mut buffer,
                location,
                hint,
            } => {
                self.pipeline.push_data(&buffer, location, hint);
                buffer.clear();
                if self.pool_producer.push(buffer).is_err() {
                    tracing::warn!("[PipelineWorker] Pool queue full, dropping buffer");
                }
            }
            PipelineCommand::Frame { frame, hint } => {
                self.pipeline.push_frame(frame, hint);
            }
            PipelineCommand::TrainingStarted(label) => self.pipeline.training_started(label),
            PipelineCommand::TrainingCompleted => {
                self.pipeline.training_completed();
            }
            PipelineCommand::ExerciseCompleted => {
                self.pipeline.exercise_completed();
            }
            PipelineCommand::SetWindowStep(step_ms) => {
                if let Err(err) = self.pipeline.set_window_step(step_ms) {
                    tracing::warn!("[PipelineWorker] Rejected window step: {}", err);
                    telemetry::hub().record_error(&err, "set_window_step");
                }
            }
            PipelineCommand::Shutdown => return false,
        }
        true
    }
}
