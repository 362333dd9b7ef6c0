//! End-to-end properties of the preclassification facade, driven with
//! synthetic wearable sessions and recording observers.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

use liftsense::classification::WindowVerdict;
use liftsense::config::{AppConfig, RepetitionConfig};
use liftsense::error::{ClassificationFailure, DecodeError};
use liftsense::export::decode_windows;
use liftsense::fixtures::{FixtureSegment, FixtureSensor, MotionFixtureSpec, MotionPattern};
use liftsense::fusion::{FusedChannel, FusedWindow};
use liftsense::repetitions::RepetitionEstimator;
use liftsense::sensor::SampleDecoder;
use liftsense::{
    BlockEvent, ClassificationObserver, ClassifiedExercise, DeviceDataObserver,
    ExerciseBlockObserver, ExerciseLabel, Location, Preclassification, Sample, SensorType,
    SourceKey, TrainingObserver,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Default)]
struct SessionRecorder {
    samples: Mutex<Vec<Sample>>,
    events: Mutex<Vec<BlockEvent>>,
    classifications: Mutex<Vec<(Vec<ClassifiedExercise>, Vec<u8>, Option<ClassificationFailure>)>>,
    trainings: Mutex<Vec<(ExerciseLabel, Vec<u8>)>>,
}

impl SessionRecorder {
    fn attach(self: &Arc<Self>, pipeline: &mut Preclassification) {
        pipeline.set_device_data_observer(self.clone());
        pipeline.set_exercise_block_observer(self.clone());
        pipeline.set_classification_observer(self.clone());
        pipeline.set_training_observer(self.clone());
    }

    fn events(&self) -> Vec<BlockEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DeviceDataObserver for SessionRecorder {
    fn device_data_decoded_3d(&self, _source: SourceKey, samples: &[Sample]) {
        self.samples.lock().unwrap().extend_from_slice(samples);
    }

    fn device_data_decoded_1d(&self, _source: SourceKey, samples: &[Sample]) {
        self.samples.lock().unwrap().extend_from_slice(samples);
    }

    fn device_data_failed(&self, _source: Option<SourceKey>, error: &DecodeError) {
        panic!("unexpected decode failure: {}", error);
    }
}

impl ExerciseBlockObserver for SessionRecorder {
    fn moving(&self) {
        self.events.lock().unwrap().push(BlockEvent::Moving);
    }
    fn not_moving(&self) {
        self.events.lock().unwrap().push(BlockEvent::NotMoving);
    }
    fn exercising(&self) {
        self.events.lock().unwrap().push(BlockEvent::Exercising);
    }
    fn exercise_ended(&self) {
        self.events.lock().unwrap().push(BlockEvent::ExerciseEnded);
    }
}

impl ClassificationObserver for SessionRecorder {
    fn classification_completed(
        &self,
        results: &[ClassifiedExercise],
        data: &[u8],
        failure: Option<&ClassificationFailure>,
    ) {
        self.classifications
            .lock()
            .unwrap()
            .push((results.to_vec(), data.to_vec(), failure.cloned()));
    }
}

impl TrainingObserver for SessionRecorder {
    fn training_completed(&self, label: &ExerciseLabel, data: &[u8]) {
        self.trainings
            .lock()
            .unwrap()
            .push((label.clone(), data.to_vec()));
    }
}

fn squat_session() -> MotionFixtureSpec {
    MotionFixtureSpec::wrist(
        "squat_set",
        vec![
            FixtureSegment::rest(10_000),
            FixtureSegment::repetitions(20_000, 1_250.0, "Squat"),
            FixtureSegment::rest(12_000),
        ],
    )
}

fn play(pipeline: &mut Preclassification, spec: &MotionFixtureSpec) {
    for frame in spec.render().unwrap() {
        pipeline.push_data(&frame.bytes, frame.location, frame.hint);
    }
}

#[test]
fn decoded_samples_match_encoded_values() {
    let source = SourceKey::new(SensorType::Gyroscope, 4, Location::Waist);
    let mut rng = StdRng::seed_from_u64(0x5A5A_FFF0);
    let values: Vec<_> = (0..40)
        .map(|_| liftsense::sensor::SampleValue::Triple {
            x: rng.gen(),
            y: rng.gen(),
            z: rng.gen(),
        })
        .collect();

    let decoder = SampleDecoder::default();
    let frame = decoder.encode(source, 20, 1_000, &values);
    let bytes = frame.to_bytes(decoder.byte_order());

    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::training(AppConfig::default());
    recorder.attach(&mut pipeline);
    let outcome = pipeline.push_data(&bytes, Location::Waist, None);

    assert_eq!(outcome.decoded, 40);
    assert!(outcome.decode_error.is_none());
    let samples = recorder.samples.lock().unwrap();
    let decoded: Vec<_> = samples.iter().map(|s| s.value).collect();
    assert_eq!(decoded, values);
    assert!(samples.iter().all(|s| s.source == source));
    assert_eq!(samples[1].timestamp_ms, 1_050);
}

#[test]
fn windows_wait_for_every_source() {
    let mut spec = squat_session();
    spec.sensors
        .push(FixtureSensor::new(SensorType::Accelerometer, 2, Location::Chest));

    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::training(AppConfig::default());
    recorder.attach(&mut pipeline);
    pipeline.training_started("Squat".into());

    let mut covered: HashMap<Location, u64> = HashMap::new();
    let mut released = 0u64;
    for frame in spec.render().unwrap() {
        covered.insert(frame.location, frame.timestamp_ms + 480);
        let outcome = pipeline.push_data(&frame.bytes, frame.location, frame.hint);
        for _ in 0..outcome.windows {
            // Continuous data: window n spans [n s, n s + 5 s)
            let end_ms = released * 1_000 + 5_000;
            assert_eq!(covered.len(), 2);
            assert!(
                covered.values().all(|&ms| ms >= end_ms),
                "window ending at {}ms released early",
                end_ms
            );
            released += 1;
        }
    }
    assert!(released > 0);
    pipeline.training_completed();

    let trainings = recorder.trainings.lock().unwrap();
    let windows = decode_windows(&trainings[0].1).unwrap();
    assert!(!windows.is_empty());
    assert!(windows.iter().all(|w| !w.has_gap() && w.channels.len() == 2));
    assert_eq!(pipeline.fusion_stats().gap_windows, 0);
}

#[test]
fn silent_source_yields_gap_marked_windows_after_timeout() {
    let mut spec = MotionFixtureSpec::wrist("gap", vec![FixtureSegment::rest(12_000)]);
    spec.sensors
        .push(FixtureSensor::new(SensorType::Accelerometer, 2, Location::Chest));
    let chest = SourceKey::new(SensorType::Accelerometer, 2, Location::Chest);

    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::training(AppConfig::default());
    recorder.attach(&mut pipeline);
    pipeline.training_started("Rest".into());

    let mut first_window_at = None;
    for frame in spec.render().unwrap() {
        if frame.location == Location::Chest && frame.timestamp_ms >= 4_000 {
            continue;
        }
        let outcome = pipeline.push_data(&frame.bytes, frame.location, None);
        if outcome.windows > 0 && first_window_at.is_none() {
            first_window_at = Some(frame.timestamp_ms);
        }
    }
    pipeline.training_completed();

    // Window [0, 5000) waits for the chest until the clock passes 5000 + 1500
    assert_eq!(first_window_at, Some(6_500));

    let trainings = recorder.trainings.lock().unwrap();
    let windows = decode_windows(&trainings[0].1).unwrap();
    assert!(!windows.is_empty());
    for window in &windows {
        assert!(window.gaps.contains(&chest), "window at {}", window.start_ms);
    }
}

#[test]
fn detector_events_alternate() {
    let noise = FixtureSegment {
        duration_ms: 6_000,
        pattern: MotionPattern::WhiteNoise { amplitude: 400.0 },
        label: None,
    };
    let spec = MotionFixtureSpec::wrist(
        "mixed",
        vec![
            FixtureSegment::rest(8_000),
            FixtureSegment::repetitions(15_000, 1_250.0, "Squat"),
            FixtureSegment::rest(10_000),
            noise,
            FixtureSegment::rest(10_000),
            FixtureSegment::repetitions(15_000, 1_000.0, "Curl"),
            FixtureSegment::rest(10_000),
        ],
    );

    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(|window: &FusedWindow| {
            Ok(WindowVerdict::new(
                window.hint.clone().unwrap_or_else(|| "Unknown".into()),
                0.9,
            ))
        }),
    );
    recorder.attach(&mut pipeline);
    play(&mut pipeline, &spec);
    pipeline.exercise_completed();

    let events = recorder.events();
    for pair in events.windows(2) {
        assert_ne!(pair[0], pair[1], "repeated event in {:?}", events);
        if pair[0] == BlockEvent::ExerciseEnded {
            assert_eq!(pair[1], BlockEvent::NotMoving);
        }
    }
    let started = events.iter().filter(|e| **e == BlockEvent::Exercising).count();
    let ended = events
        .iter()
        .filter(|e| **e == BlockEvent::ExerciseEnded)
        .count();
    assert!(started >= 2, "expected both sets, got {:?}", events);
    assert_eq!(started, ended);
}

#[test]
fn unanimous_block_yields_single_label() {
    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(|_: &FusedWindow| Ok(WindowVerdict::new("Squat", 0.9))),
    );
    recorder.attach(&mut pipeline);
    play(&mut pipeline, &squat_session());

    let classifications = recorder.classifications.lock().unwrap();
    assert_eq!(classifications.len(), 1);
    let (results, data, failure) = &classifications[0];
    assert!(failure.is_none());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].label.as_str(), "Squat");
    assert!((results[0].confidence - 0.9).abs() < 1e-5);

    let reps = results[0].repetitions.expect("periodic block has a count");
    assert!((14..=18).contains(&reps), "got {} repetitions", reps);
    assert!(!decode_windows(data).unwrap().is_empty());
}

#[test]
fn top_label_maximises_summed_confidence() {
    let calls: Arc<Mutex<Vec<(String, f32)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);

    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(move |window: &FusedWindow| {
            let verdict = if (window.start_ms / 1_000) % 3 == 0 {
                WindowVerdict::new("Row", 0.95)
            } else {
                WindowVerdict::new("Curl", 0.6)
            };
            seen.lock()
                .unwrap()
                .push((verdict.label.as_str().to_string(), verdict.confidence));
            Ok(verdict)
        }),
    );
    recorder.attach(&mut pipeline);
    play(&mut pipeline, &squat_session());

    let mut sums: HashMap<String, f32> = HashMap::new();
    let calls = calls.lock().unwrap();
    for (label, confidence) in calls.iter() {
        *sums.entry(label.clone()).or_default() += confidence;
    }
    let (best, best_sum) = sums
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(label, sum)| (label.clone(), *sum))
        .unwrap();

    let classifications = recorder.classifications.lock().unwrap();
    let results = &classifications[0].0;
    assert_eq!(results[0].label.as_str(), best);
    assert!((results[0].confidence - best_sum / calls.len() as f32).abs() < 1e-4);
    assert!(results.windows(2).all(|r| r[0].confidence >= r[1].confidence));
}

#[test]
fn training_block_delivers_one_corpus() {
    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::training(AppConfig::default());
    recorder.attach(&mut pipeline);

    // 15 s at 1 s steps closes windows starting at 0..=9000
    let spec = MotionFixtureSpec::wrist("deadlift", vec![FixtureSegment::rest(15_000)]);
    pipeline.training_started("Deadlift".into());
    play(&mut pipeline, &spec);
    pipeline.training_completed();

    let trainings = recorder.trainings.lock().unwrap();
    assert_eq!(trainings.len(), 1);
    assert_eq!(trainings[0].0.as_str(), "Deadlift");
    assert_eq!(decode_windows(&trainings[0].1).unwrap().len(), 10);
    assert!(recorder.classifications.lock().unwrap().is_empty());
}

#[test]
fn eight_cycles_estimate_eight_repetitions() {
    let source = SourceKey::new(SensorType::Accelerometer, 1, Location::RightWrist);
    let sinusoid: Vec<Sample> = (0..500u64)
        .map(|i| Sample {
            source,
            timestamp_ms: i * 20,
            value: liftsense::sensor::SampleValue::Triple {
                x: 0,
                y: (500.0 * (2.0 * PI * (i * 20) as f32 / 1_250.0).sin()) as i16,
                z: 1_000,
            },
        })
        .collect();
    let window = |samples: Vec<Sample>| FusedWindow {
        start_ms: 0,
        length_ms: 10_000,
        channels: vec![FusedChannel { source, samples }],
        gaps: Default::default(),
        hint: None,
    };

    let estimator = RepetitionEstimator::new(RepetitionConfig::default());
    let count = estimator.estimate(&window(sinusoid.clone())).unwrap();
    assert!((7..=9).contains(&count), "got {}", count);

    let mut rng = StdRng::seed_from_u64(7);
    let noise: Vec<Sample> = sinusoid
        .into_iter()
        .map(|mut sample| {
            sample.value = liftsense::sensor::SampleValue::Triple {
                x: rng.gen_range(-400..=400),
                y: rng.gen_range(-400..=400),
                z: 1_000 + rng.gen_range(-400..=400),
            };
            sample
        })
        .collect();
    assert_eq!(estimator.estimate(&window(noise)), None);
}

#[test]
fn exercise_completed_without_windows_is_empty() {
    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(|_: &FusedWindow| Ok(WindowVerdict::new("Squat", 0.9))),
    );
    recorder.attach(&mut pipeline);

    assert!(pipeline.exercise_completed().is_empty());

    let classifications = recorder.classifications.lock().unwrap();
    assert_eq!(classifications.len(), 1);
    assert!(classifications[0].0.is_empty());
    assert!(classifications[0].2.is_none());
    assert!(decode_windows(&classifications[0].1).unwrap().is_empty());
}

#[test]
fn failing_classifier_reports_failure_with_empty_result() {
    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(|_: &FusedWindow| {
            Err(ClassificationFailure::ModelUnavailable {
                reason: "not loaded".to_string(),
            })
        }),
    );
    recorder.attach(&mut pipeline);
    play(&mut pipeline, &squat_session());

    let classifications = recorder.classifications.lock().unwrap();
    assert_eq!(classifications.len(), 1);
    assert!(classifications[0].0.is_empty());
    assert!(matches!(
        classifications[0].2,
        Some(ClassificationFailure::ModelUnavailable { .. })
    ));
}

#[test]
fn noise_floor_survives_block_boundaries() {
    let recorder = Arc::new(SessionRecorder::default());
    let mut pipeline = Preclassification::classifying(
        AppConfig::default(),
        Box::new(|_: &FusedWindow| Ok(WindowVerdict::new("Squat", 0.9))),
    );
    recorder.attach(&mut pipeline);

    play(&mut pipeline, &squat_session());
    pipeline.exercise_completed();
    let mut second = squat_session();
    second.start_ms = 60_000;
    second.seed = 11;
    play(&mut pipeline, &second);

    assert_eq!(recorder.classifications.lock().unwrap().len(), 3);
    let events = recorder.events();
    let started = events.iter().filter(|e| **e == BlockEvent::Exercising).count();
    assert_eq!(started, 2);
}
