// Observer interfaces of the pipeline facade
//
// Four independent callbacks; a host implements only the ones it needs and
// registers them on `Preclassification`. Callbacks run on the thread that
// drives the pipeline and must not block for long.

use crate::detector::BlockEvent;
use crate::error::{ClassificationFailure, DecodeError};
use crate::sensor::{Sample, SourceKey};
use crate::types::{ClassifiedExercise, ExerciseLabel};

/// Decoded sensor data, before fusion
pub trait DeviceDataObserver: Send + Sync {
    /// Samples of an accelerometer or gyroscope frame
    fn device_data_decoded_3d(&self, source: SourceKey, samples: &[Sample]);

    /// Samples of a single-axis frame (heart rate)
    fn device_data_decoded_1d(&self, source: SourceKey, samples: &[Sample]);

    /// Frame rejected or only partially decoded
    fn device_data_failed(&self, _source: Option<SourceKey>, _error: &DecodeError) {}
}

/// Movement and exercise-block lifecycle
pub trait ExerciseBlockObserver: Send + Sync {
    fn moving(&self);
    fn not_moving(&self);
    fn exercising(&self);
    fn exercise_ended(&self);
}

/// Fused result of a classified exercise block
pub trait ClassificationObserver: Send + Sync {
    /// # Arguments
    /// * `results` - ranked best first, empty when nothing was recognised
    /// * `data` - export-encoded windows of the block
    /// * `failure` - set when every window of the block failed to classify
    fn classification_completed(
        &self,
        results: &[ClassifiedExercise],
        data: &[u8],
        failure: Option<&ClassificationFailure>,
    );
}

/// Labelled corpus of a completed training block
pub trait TrainingObserver: Send + Sync {
    fn training_completed(&self, label: &ExerciseLabel, data: &[u8]);
}

/// Route one lifecycle event to the matching callback
pub fn dispatch_block_event(observer: &dyn ExerciseBlockObserver, event: BlockEvent) {
    match event {
        BlockEvent::Moving => observer.moving(),
        BlockEvent::NotMoving => observer.not_moving(),
        BlockEvent::Exercising => observer.exercising(),
        BlockEvent::ExerciseEnded => observer.exercise_ended(),
    }
}
