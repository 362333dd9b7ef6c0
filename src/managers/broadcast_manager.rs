// BroadcastObservers: observer callbacks as a tokio broadcast channel
//
// Implements all four observer traits and republishes each callback as a
// `PipelineEvent`, so that any number of async tasks can follow a session
// without the pipeline knowing about them.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::detector::BlockEvent;
use crate::error::{ClassificationFailure, DecodeError, ErrorCode};
use crate::observers::{
    ClassificationObserver, DeviceDataObserver, ExerciseBlockObserver, TrainingObserver,
};
use crate::pipeline::Preclassification;
use crate::sensor::{Sample, SourceKey};
use crate::types::{ClassifiedExercise, ExerciseLabel};

/// Default channel buffer; lagging subscribers lose the oldest events
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One observer callback, owned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Decoded batch; only the count travels, samples stay with the pipeline
    DeviceData { source: SourceKey, samples: usize },
    DecodeFailed {
        source: Option<SourceKey>,
        code: i32,
        message: String,
    },
    Block { event: BlockEvent },
    Classification {
        results: Vec<ClassifiedExercise>,
        /// Exported fused windows of the block
        data: Vec<u8>,
        failure_code: Option<i32>,
    },
    Training { label: ExerciseLabel, data: Vec<u8> },
}

/// Observer set publishing every callback on one broadcast channel
///
/// # Notes
/// - Sending never blocks the pipeline worker
/// - Events published with no subscriber are discarded
/// - Each subscriber gets an independent copy of every event
pub struct BroadcastObservers {
    sender: broadcast::Sender<PipelineEvent>,
    device_data: bool,
}

impl BroadcastObservers {
    /// Create the channel
    ///
    /// # Arguments
    /// * `capacity` - Events buffered per subscriber before it lags
    /// * `device_data` - Also publish one event per decoded batch
    pub fn new(capacity: usize, device_data: bool) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            device_data,
        }
    }

    /// Register this set as all four observers of `pipeline`
    pub fn attach(self: &Arc<Self>, pipeline: &mut Preclassification) {
        pipeline.set_device_data_observer(self.clone());
        pipeline.set_exercise_block_observer(self.clone());
        pipeline.set_classification_observer(self.clone());
        pipeline.set_training_observer(self.clone());
    }

    /// Subscribe to raw events; the receiver reports lag explicitly
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Stream of events that skips over lag gaps
    ///
    /// The stream ends once this observer set is dropped.
    pub fn event_stream(&self) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(err) => {
                    log::warn!("[BroadcastObservers] Subscriber lagged: {}", err);
                    None
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: PipelineEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastObservers {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY, false)
    }
}

impl DeviceDataObserver for BroadcastObservers {
    fn device_data_decoded_3d(&self, source: SourceKey, samples: &[Sample]) {
        if self.device_data {
            self.publish(PipelineEvent::DeviceData {
                source,
                samples: samples.len(),
            });
        }
    }

    fn device_data_decoded_1d(&self, source: SourceKey, samples: &[Sample]) {
        self.device_data_decoded_3d(source, samples);
    }

    fn device_data_failed(&self, source: Option<SourceKey>, error: &DecodeError) {
        self.publish(PipelineEvent::DecodeFailed {
            source,
            code: error.code(),
            message: error.message(),
        });
    }
}

impl ExerciseBlockObserver for BroadcastObservers {
    fn moving(&self) {
        self.publish(PipelineEvent::Block {
            event: BlockEvent::Moving,
        });
    }

    fn not_moving(&self) {
        self.publish(PipelineEvent::Block {
            event: BlockEvent::NotMoving,
        });
    }

    fn exercising(&self) {
        self.publish(PipelineEvent::Block {
            event: BlockEvent::Exercising,
        });
    }

    fn exercise_ended(&self) {
        self.publish(PipelineEvent::Block {
            event: BlockEvent::ExerciseEnded,
        });
    }
}

impl ClassificationObserver for BroadcastObservers {
    fn classification_completed(
        &self,
        results: &[ClassifiedExercise],
        data: &[u8],
        failure: Option<&ClassificationFailure>,
    ) {
        self.publish(PipelineEvent::Classification {
            results: results.to_vec(),
            data: data.to_vec(),
            failure_code: failure.map(|f| f.code()),
        });
    }
}

impl TrainingObserver for BroadcastObservers {
    fn training_completed(&self, label: &ExerciseLabel, data: &[u8]) {
        self.publish(PipelineEvent::Training {
            label: label.clone(),
            data: data.to_vec(),
        });
    }
}
