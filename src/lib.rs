// LiftSense Core - on-device exercise preclassification
// Wearable motion frames in; exercise blocks, fused classifications and
// repetition counts out.

// Module declarations
pub mod classification;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod fusion;
pub mod managers;
pub mod motion;
pub mod observers;
pub mod pipeline;
pub mod repetitions;
pub mod sensor;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use classification::{Classifier, WindowVerdict};
pub use config::AppConfig;
pub use detector::{BlockEvent, DetectorState};
pub use engine::PipelineHandle;
pub use observers::{
    ClassificationObserver, DeviceDataObserver, ExerciseBlockObserver, TrainingObserver,
};
pub use pipeline::{Preclassification, PushOutcome};
pub use sensor::{Location, RawFrame, Sample, SensorType, SourceKey};
pub use types::{ClassifiedExercise, ExerciseLabel};

use std::str::FromStr;

/// Environment variable holding the log level (`error` .. `trace`)
pub const LOG_LEVEL_ENV: &str = "LIFTSENSE_LOG";

/// Install a stderr `tracing` subscriber that also captures `log` records
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| tracing::Level::from_str(&value).ok())
        .unwrap_or(tracing::Level::INFO);

    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        log::info!("[LiftSense] Logging initialized at {}", level);
    }
}
