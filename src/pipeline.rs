// Preclassification - pipeline facade
//
// Owns one session: decoder, fusion buffer, detector and classification
// engine. Raw frames go in through `push_data`; lifecycle events, fused
// classification results and training corpora come out through the four
// observer interfaces.
//
// Single writer: every operation takes `&mut self`. Run it behind
// `engine::PipelineHandle` to drive it from another thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::classification::{ClassificationEngine, Classifier, EngineMode};
use crate::config::AppConfig;
use crate::detector::{BlockEvent, DetectorState, ExerciseBlockDetector};
use crate::error::{log_decode_error, ConfigError, DecodeError};
use crate::fusion::{FusedWindow, FusionBuffer, FusionStats};
use crate::motion::SpectrumAnalyzer;
use crate::observers::{
    dispatch_block_event, ClassificationObserver, DeviceDataObserver, ExerciseBlockObserver,
    TrainingObserver,
};
use crate::repetitions::RepetitionEstimator;
use crate::sensor::{DecodedBatch, Location, RawFrame, SampleDecoder, SourceKey};
use crate::telemetry;
use crate::types::ExerciseLabel;

/// What one `push_data` / `push_frame` call did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushOutcome {
    /// Samples decoded from the frame
    pub decoded: usize,
    /// Samples the fusion buffer dropped (reordered, late, unregistered)
    pub dropped: usize,
    /// Frame rejected, or decoded only partially
    pub decode_error: Option<DecodeError>,
    /// Fused windows processed during this call
    pub windows: usize,
    /// Block lifecycle events fired during this call, in order
    pub events: Vec<BlockEvent>,
}

/// Pipeline facade for one training or classification session
pub struct Preclassification {
    config: AppConfig,
    decoder: SampleDecoder,
    fusion: FusionBuffer,
    detector: ExerciseBlockDetector,
    engine: ClassificationEngine,
    /// Windows of the current Moving run, handed to the engine once the run
    /// turns out to be an exercise
    lead_in: VecDeque<FusedWindow>,
    /// Grace-run windows of the open block, admitted once the block recovers
    grace_held: Vec<FusedWindow>,
    device_observer: Option<Arc<dyn DeviceDataObserver>>,
    block_observer: Option<Arc<dyn ExerciseBlockObserver>>,
    classification_observer: Option<Arc<dyn ClassificationObserver>>,
    training_observer: Option<Arc<dyn TrainingObserver>>,
}

impl Preclassification {
    /// Session that records labelled training blocks
    pub fn training(config: AppConfig) -> Self {
        let analyzer = SpectrumAnalyzer::new();
        let repetitions =
            RepetitionEstimator::with_analyzer(config.repetitions.clone(), analyzer.clone());
        let engine = ClassificationEngine::training(config.classification.clone(), repetitions);
        Self::with_engine(config, analyzer, engine)
    }

    /// Session that classifies exercise blocks with `classifier`
    pub fn classifying(config: AppConfig, classifier: Box<dyn Classifier>) -> Self {
        let analyzer = SpectrumAnalyzer::new();
        let repetitions =
            RepetitionEstimator::with_analyzer(config.repetitions.clone(), analyzer.clone());
        let engine = ClassificationEngine::classifying(
            config.classification.clone(),
            repetitions,
            classifier,
        );
        Self::with_engine(config, analyzer, engine)
    }

    fn with_engine(
        config: AppConfig,
        analyzer: SpectrumAnalyzer,
        engine: ClassificationEngine,
    ) -> Self {
        log::info!(
            "[Preclassification] {:?} session, {}ms windows every {}ms",
            engine.mode(),
            config.fusion.window_length_ms,
            config.fusion.window_step_ms
        );
        Self {
            decoder: SampleDecoder::new(config.decoder.byte_order),
            fusion: FusionBuffer::new(&config.fusion),
            detector: ExerciseBlockDetector::with_analyzer(config.detector.clone(), analyzer),
            lead_in: VecDeque::with_capacity(config.detector.consistent_windows),
            grace_held: Vec::with_capacity(config.detector.grace_windows),
            engine,
            config,
            device_observer: None,
            block_observer: None,
            classification_observer: None,
            training_observer: None,
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.engine.mode()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.state()
    }

    pub fn fusion_stats(&self) -> FusionStats {
        self.fusion.stats()
    }

    /// Windows accumulated in the open block
    pub fn pending_windows(&self) -> usize {
        self.engine.pending_windows()
    }

    pub fn set_device_data_observer(&mut self, observer: Arc<dyn DeviceDataObserver>) {
        self.device_observer = Some(observer);
    }

    pub fn set_exercise_block_observer(&mut self, observer: Arc<dyn ExerciseBlockObserver>) {
        self.block_observer = Some(observer);
    }

    pub fn set_classification_observer(&mut self, observer: Arc<dyn ClassificationObserver>) {
        self.classification_observer = Some(observer);
    }

    pub fn set_training_observer(&mut self, observer: Arc<dyn TrainingObserver>) {
        self.training_observer = Some(observer);
    }

    /// Expect samples from `source` before it delivers its first frame
    pub fn register_source(&mut self, source: SourceKey) {
        self.fusion.register_source(source);
    }

    /// Change the fusion step; drops in-flight fusion state
    pub fn set_window_step(&mut self, step_ms: u64) -> Result<(), ConfigError> {
        self.fusion.set_window_step(step_ms)?;
        self.config.fusion.window_step_ms = step_ms;
        Ok(())
    }

    /// Parse, decode and fuse one framed buffer from `location`
    ///
    /// # Arguments
    /// * `bytes` - frame header followed by the record payload
    /// * `location` - body location of the sending device
    /// * `hint` - ground-truth exercise for this frame, if known
    pub fn push_data(
        &mut self,
        bytes: &[u8],
        location: Location,
        hint: Option<ExerciseLabel>,
    ) -> PushOutcome {
        match RawFrame::parse(bytes, location, self.decoder.byte_order()) {
            Ok(frame) => self.push_frame(frame, hint),
            Err(err) => {
                log_decode_error(&err, "push_data");
                telemetry::hub().record_error(&err, format!("frame from {}", location));
                if let Some(observer) = &self.device_observer {
                    observer.device_data_failed(None, &err);
                }
                PushOutcome {
                    decode_error: Some(err),
                    ..PushOutcome::default()
                }
            }
        }
    }

    /// Decode and fuse an already parsed frame
    pub fn push_frame(&mut self, frame: RawFrame, hint: Option<ExerciseLabel>) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        let source = frame.source();

        let batch = match self.decoder.decode(&frame) {
            Ok(batch) => batch,
            Err(err) => {
                log_decode_error(&err, "push_frame");
                telemetry::hub().record_error(&err, source.to_string());
                if let Some(observer) = &self.device_observer {
                    observer.device_data_failed(Some(source), &err);
                }
                outcome.decode_error = Some(err);
                return outcome;
            }
        };

        self.notify_decoded(&batch);
        outcome.decoded = batch.samples.len();
        outcome.decode_error = batch.partial;

        self.fusion.annotate(frame.timestamp_ms, hint);
        for sample in batch.samples {
            if self.fusion.push(sample).is_err() {
                outcome.dropped += 1;
            }
        }

        for _ in 0..self.config.engine.max_windows_per_push {
            let Some(window) = self.fusion.poll() else {
                break;
            };
            outcome.windows += 1;
            self.process_window(window, &mut outcome.events);
        }
        outcome
    }

    fn notify_decoded(&self, batch: &DecodedBatch) {
        if let Some(partial) = &batch.partial {
            log_decode_error(partial, "push_frame");
            telemetry::hub().record_decode_partial(&batch.source, partial, batch.samples.len());
        }
        let Some(observer) = &self.device_observer else {
            return;
        };
        if let Some(partial) = &batch.partial {
            observer.device_data_failed(Some(batch.source), partial);
        }
        if batch.samples.is_empty() {
            return;
        }
        if batch.source.sensor.dimension() == 3 {
            observer.device_data_decoded_3d(batch.source, &batch.samples);
        } else {
            observer.device_data_decoded_1d(batch.source, &batch.samples);
        }
    }

    /// Run one window through the detector and the engine
    ///
    /// # Returns
    /// Whether the window closed a block and delivered its classification
    fn process_window(&mut self, window: FusedWindow, events: &mut Vec<BlockEvent>) -> bool {
        let started = Instant::now();
        let mut delivered = false;
        let update = self.detector.observe(&window);
        self.dispatch(&update.events);
        events.extend_from_slice(&update.events);

        match self.engine.mode() {
            EngineMode::Training => {
                self.engine.accept(window);
            }
            EngineMode::Classifying => {
                if update.events.contains(&BlockEvent::Exercising) {
                    for earlier in self.lead_in.drain(..) {
                        self.engine.accept(earlier);
                    }
                }
                if update.in_block {
                    for held in self.grace_held.drain(..) {
                        self.engine.accept_grace(held);
                    }
                    self.engine.accept(window);
                } else if update.grace {
                    self.grace_held.push(window);
                } else if self.detector.state() == DetectorState::Moving {
                    if self.lead_in.len() + 1 >= self.config.detector.consistent_windows {
                        self.lead_in.pop_front();
                    }
                    self.lead_in.push_back(window);
                }

                if update.events.contains(&BlockEvent::ExerciseEnded) {
                    self.grace_held.clear();
                    self.deliver_classification();
                    delivered = true;
                }
                if self.detector.state() == DetectorState::NotMoving {
                    self.lead_in.clear();
                }
            }
        }

        telemetry::hub().record_window_latency(started.elapsed().as_secs_f32() * 1000.0);
        delivered
    }

    /// Process every window the fusion buffer can still release
    ///
    /// Pushes complete at most `max_windows_per_push` windows each, so frames
    /// longer than the window step leave a backlog. Block boundaries drain it
    /// before the session state is reset.
    ///
    /// # Returns
    /// Whether a drained window closed a block and delivered its classification
    fn drain_windows(&mut self, events: &mut Vec<BlockEvent>) -> bool {
        let mut drained = 0;
        let mut delivered = false;
        while let Some(window) = self.fusion.poll() {
            drained += 1;
            delivered |= self.process_window(window, events);
        }
        if drained > 0 {
            log::debug!("[Preclassification] Drained {} backlogged windows", drained);
        }
        delivered
    }

    fn dispatch(&self, events: &[BlockEvent]) {
        if let Some(observer) = &self.block_observer {
            for event in events {
                dispatch_block_event(observer.as_ref(), *event);
            }
        }
    }

    fn deliver_classification(&mut self) {
        let outcome = self.engine.complete_block();
        if let Some(observer) = &self.classification_observer {
            observer.classification_completed(
                &outcome.results,
                &outcome.data,
                outcome.failure.as_ref(),
            );
        }
    }

    /// Start a labelled training block
    ///
    /// Ignored (with a warning) in classifying sessions.
    pub fn training_started(&mut self, label: ExerciseLabel) {
        self.engine.start_training(label);
    }

    /// Close the training block and deliver its corpus
    ///
    /// Complete windows still queued in the fusion buffer join the corpus.
    /// Detector events needed to return to NotMoving are dispatched first.
    /// Without an open block nothing is delivered.
    pub fn training_completed(&mut self) -> Vec<BlockEvent> {
        let mut events = Vec::new();
        self.drain_windows(&mut events);
        let closing = self.detector.end_session();
        self.dispatch(&closing);
        events.extend(closing);

        if let Some(outcome) = self.engine.complete_training() {
            if let Some(observer) = &self.training_observer {
                observer.training_completed(&outcome.label, &outcome.data);
            }
        }
        self.reset_stream();
        events
    }

    /// Close the current exercise and deliver its classification
    ///
    /// Backlogged windows are processed first; a block they close is
    /// delivered on its own. Otherwise this produces exactly one
    /// classification callback in classifying sessions, with an empty result
    /// when no window was collected.
    pub fn exercise_completed(&mut self) -> Vec<BlockEvent> {
        let mut events = Vec::new();
        let delivered = self.drain_windows(&mut events);
        let closing = self.detector.end_session();
        self.dispatch(&closing);
        events.extend(closing);

        match self.engine.mode() {
            // a drained window may already have closed the block
            EngineMode::Classifying if delivered && self.engine.pending_windows() == 0 => {}
            EngineMode::Classifying => self.deliver_classification(),
            EngineMode::Training => {
                log::warn!(
                    "[Preclassification] exercise_completed in a training session, dropping block"
                );
                self.engine.reset();
            }
        }
        self.reset_stream();
        events
    }

    fn reset_stream(&mut self) {
        self.lead_in.clear();
        self.grace_held.clear();
        self.fusion.reset();
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
