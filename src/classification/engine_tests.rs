use super::*;
use crate::classification::WindowVerdict;
use crate::config::RepetitionConfig;
use crate::export::decode_windows;
use crate::fusion::FusedChannel;
use crate::sensor::{Location, Sample, SampleValue, SensorType, SourceKey};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn accel() -> SourceKey {
    SourceKey::new(SensorType::Accelerometer, 1, Location::LeftWrist)
}

/// 8s window at 50 Hz with an 8-cycle swing on the x axis
fn window(start_ms: u64) -> FusedWindow {
    let samples = (0..400)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * 8.0 * i as f32 / 400.0;
            Sample {
                source: accel(),
                timestamp_ms: start_ms + i as u64 * 20,
                value: SampleValue::Triple {
                    x: (700.0 * phase.sin()) as i16,
                    y: 0,
                    z: 1_000,
                },
            }
        })
        .collect();
    FusedWindow {
        start_ms,
        length_ms: 8_000,
        channels: vec![FusedChannel {
            source: accel(),
            samples,
        }],
        gaps: BTreeSet::new(),
        hint: None,
    }
}

fn estimator() -> RepetitionEstimator {
    RepetitionEstimator::new(RepetitionConfig::default())
}

fn engine_with<C: Classifier + 'static>(classifier: C) -> ClassificationEngine {
    ClassificationEngine::classifying(
        ClassificationConfig::default(),
        estimator(),
        Box::new(classifier),
    )
}

fn always_squat(_: &FusedWindow) -> Result<WindowVerdict, ClassificationFailure> {
    Ok(WindowVerdict::new("Squat", 0.9))
}

fn always_fails(_: &FusedWindow) -> Result<WindowVerdict, ClassificationFailure> {
    Err(ClassificationFailure::ModelUnavailable {
        reason: "no model".to_string(),
    })
}

#[test]
fn test_unanimous_block_yields_only_that_label() {
    let mut engine = engine_with(always_squat);
    for i in 0..5 {
        assert!(engine.accept(window(i * 1_000)));
    }

    let outcome = engine.complete_block();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].label.as_str(), "Squat");
    assert!((outcome.results[0].confidence - 0.9).abs() < 1e-6);
    assert_eq!(outcome.windows, 5);
    assert!(outcome.failure.is_none());
    assert_eq!(decode_windows(&outcome.data).unwrap().len(), 5);
}

#[test]
fn test_block_result_carries_repetitions() {
    let mut engine = engine_with(always_squat);
    engine.accept(window(0));

    let outcome = engine.complete_block();
    let reps = outcome.results[0].repetitions.expect("sinusoid should count");
    assert!((7..=9).contains(&reps));
}

#[test]
fn test_all_windows_failing_reports_failure() {
    let mut engine = engine_with(always_fails);
    engine.accept(window(0));
    engine.accept(window(1_000));

    let outcome = engine.complete_block();
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.windows, 2);
    assert!(matches!(
        outcome.failure,
        Some(ClassificationFailure::ModelUnavailable { .. })
    ));
}

#[test]
fn test_partial_failures_still_classify() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut engine = engine_with(move |_: &FusedWindow| {
        if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            Err(ClassificationFailure::ClassifierError {
                details: "timeout".to_string(),
            })
        } else {
            Ok(WindowVerdict::new("Row", 0.7))
        }
    });
    for i in 0..4 {
        engine.accept(window(i * 1_000));
    }

    let outcome = engine.complete_block();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(outcome.results[0].label.as_str(), "Row");
    assert!((outcome.results[0].confidence - 0.7).abs() < 1e-6);
    assert!(outcome.failure.is_none());
}

#[test]
fn test_empty_block_is_not_a_failure() {
    let mut engine = engine_with(always_fails);
    let outcome = engine.complete_block();

    assert!(outcome.results.is_empty());
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.windows, 0);
    assert!(decode_windows(&outcome.data).unwrap().is_empty());
}

#[test]
fn test_complete_block_clears_state() {
    let mut engine = engine_with(always_fails);
    engine.accept(window(0));
    engine.complete_block();

    assert_eq!(engine.pending_windows(), 0);
    assert!(engine.complete_block().failure.is_none());
}

#[test]
fn test_training_block_collects_all_windows() {
    let mut engine = ClassificationEngine::training(ClassificationConfig::default(), estimator());
    assert!(!engine.accept(window(0)), "no block open yet");

    assert!(engine.start_training("Deadlift".into()));
    for i in 0..10 {
        assert!(engine.accept(window(i * 1_000)));
    }

    let outcome = engine.complete_training().expect("block was open");
    assert_eq!(outcome.label.as_str(), "Deadlift");
    assert_eq!(outcome.windows.len(), 10);
    assert_eq!(decode_windows(&outcome.data).unwrap(), outcome.windows);

    assert!(engine.complete_training().is_none());
    assert_eq!(engine.pending_windows(), 0);
}

#[test]
fn test_training_restart_drops_previous_windows() {
    let mut engine = ClassificationEngine::training(ClassificationConfig::default(), estimator());
    engine.start_training("Curl".into());
    engine.accept(window(0));
    engine.start_training("Row".into());
    engine.accept(window(1_000));

    let outcome = engine.complete_training().unwrap();
    assert_eq!(outcome.label.as_str(), "Row");
    assert_eq!(outcome.windows.len(), 1);
}

#[test]
fn test_training_not_available_when_classifying() {
    let mut engine = engine_with(always_squat);
    assert!(!engine.start_training("Squat".into()));
    assert!(engine.training_label().is_none());
    assert_eq!(engine.mode(), EngineMode::Classifying);
}

#[test]
fn test_grace_window_votes_with_reduced_weight() {
    let mut engine = engine_with(|window: &FusedWindow| {
        let label = if window.start_ms == 0 { "Squat" } else { "Lunge" };
        Ok(WindowVerdict::new(label, 0.9))
    });
    assert!(engine.accept(window(0)));
    assert!(engine.accept_grace(window(1_000)));

    let outcome = engine.complete_block();
    assert_eq!(outcome.windows, 2);
    assert_eq!(outcome.results[0].label.as_str(), "Squat");
    assert!((outcome.results[0].confidence - 0.6).abs() < 1e-5);
    assert!((outcome.results[1].confidence - 0.3).abs() < 1e-5);
}
