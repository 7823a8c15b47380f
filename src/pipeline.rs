//! Pipeline orchestration
//!
//! This module provides the public API for Gesture Flux. It wires the stages
//! together for one capture session:
//!
//! 1. Validator - reject malformed frames
//! 2. FrameBuffer - accumulate two-handed frames, reset on a broken gesture
//! 3. DebounceGate - collapse "window ready" bursts, enforce the cooldown
//! 4. DispatchQueue - one classifier call in flight, FIFO
//! 5. Publisher - threshold filter, history, stats, events
//!
//! Every method that can start a timer or a dispatch must be called inside a
//! tokio runtime.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::{BufferPush, FrameBuffer};
use crate::classifier::GestureClassifier;
use crate::clock::{Clock, TokioClock};
use crate::config::{ConfigUpdate, PipelineConfig};
use crate::error::{ConfigError, QueueError, ValidationError};
use crate::gate::{DebounceGate, GateSignal};
use crate::publisher::{PipelineEvent, Publisher, ResultFilter, SubscriptionId};
use crate::queue::{DispatchObserver, DispatchQueue, QueueOptions};
use crate::store::StateStore;
use crate::types::{
    BufferStatus, LandmarkFrame, PredictionOutcome, PushOutcome, Resolution, ResolutionError,
    Stats,
};
use crate::validator::{validate_frame_value, validate_window};

/// Builder for [`GesturePipeline`]
pub struct PipelineBuilder {
    classifier: Arc<dyn GestureClassifier>,
    config: PipelineConfig,
    store: Option<Arc<dyn StateStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// State store the publisher writes into
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Clock used by the debounce gate (defaults to the tokio clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<GesturePipeline, ConfigError> {
        self.config.validate()?;
        let config = self.config;

        let publisher = Arc::new(Publisher::new(
            ResultFilter::new(config.confidence_threshold),
            config.history_capacity,
            self.store,
        ));
        let buffer = Arc::new(Mutex::new(FrameBuffer::new(config.frames_required)));
        let slide = Arc::new(RwLock::new(config.slide_after_actionable));

        let observer = Arc::new(PipelineObserver {
            publisher: Arc::clone(&publisher),
            buffer: Arc::clone(&buffer),
            slide_after_actionable: Arc::clone(&slide),
        });
        let queue = DispatchQueue::new(self.classifier, observer, QueueOptions::from(&config));

        info!(
            frames_required = config.frames_required,
            detection_interval_ms = config.detection_interval_ms,
            confidence_threshold = config.confidence_threshold,
            queued = config.enable_prediction_queue,
            "gesture pipeline created"
        );

        Ok(GesturePipeline {
            inner: Arc::new(Inner {
                gate: Mutex::new(GateSlot {
                    gate: DebounceGate::new(config.detection_interval_ms, config.coalesce_delay_ms),
                    timer: None,
                }),
                config: RwLock::new(config),
                buffer,
                slide_after_actionable: slide,
                clock: self
                    .clock
                    .unwrap_or_else(|| Arc::new(TokioClock::new()) as Arc<dyn Clock>),
                publisher,
                queue,
            }),
        })
    }
}

/// Queue callbacks: publish, then re-arm or slide the window
struct PipelineObserver {
    publisher: Arc<Publisher>,
    buffer: Arc<Mutex<FrameBuffer>>,
    slide_after_actionable: Arc<RwLock<usize>>,
}

impl DispatchObserver for PipelineObserver {
    fn on_active_changed(&self, active: bool) {
        self.publisher.set_active(active);
    }

    fn on_resolved(&self, resolution: Resolution) -> PredictionOutcome {
        let generation = resolution.generation;
        let outcome = self.publisher.resolve(resolution);

        let slide = *self.slide_after_actionable.read();
        let mut buffer = self.buffer.lock();
        if outcome.actionable && slide > 0 {
            // the frames belong to a different gesture after a reset
            if buffer.generation() == generation {
                let dropped = buffer.drop_oldest(slide);
                debug!(dropped, remaining = buffer.len(), "window slid after detection");
            } else {
                debug!(
                    request_id = %outcome.request_id,
                    "window replaced while in flight, not sliding"
                );
            }
        } else {
            buffer.rearm();
        }
        outcome
    }
}

struct GateSlot {
    gate: DebounceGate,
    timer: Option<JoinHandle<()>>,
}

impl GateSlot {
    fn cancel(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.gate.cancel()
    }
}

struct Inner {
    config: RwLock<PipelineConfig>,
    buffer: Arc<Mutex<FrameBuffer>>,
    slide_after_actionable: Arc<RwLock<usize>>,
    gate: Mutex<GateSlot>,
    clock: Arc<dyn Clock>,
    publisher: Arc<Publisher>,
    queue: DispatchQueue,
}

/// One gesture capture session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct GesturePipeline {
    inner: Arc<Inner>,
}

impl GesturePipeline {
    pub fn builder(classifier: Arc<dyn GestureClassifier>) -> PipelineBuilder {
        PipelineBuilder {
            classifier,
            config: PipelineConfig::default(),
            store: None,
            clock: None,
        }
    }

    /// Create a pipeline with the given configuration
    pub fn new(
        config: PipelineConfig,
        classifier: Arc<dyn GestureClassifier>,
    ) -> Result<Self, ConfigError> {
        Self::builder(classifier).config(config).build()
    }

    /// Push one landmark vector (126 values)
    pub fn push_frame(&self, values: Vec<f64>) -> PushOutcome {
        match LandmarkFrame::try_from(values) {
            Ok(frame) => self.push_landmarks(frame),
            Err(e) => Self::reject_invalid(e),
        }
    }

    /// Push an untyped payload: a bare array or `{"landmarks": [...]}`
    pub fn push_value(&self, value: &Value) -> PushOutcome {
        match validate_frame_value(value).and_then(LandmarkFrame::try_from) {
            Ok(frame) => self.push_landmarks(frame),
            Err(e) => Self::reject_invalid(e),
        }
    }

    fn reject_invalid(e: ValidationError) -> PushOutcome {
        warn!(error = %e, "frame rejected");
        PushOutcome::Rejected {
            reason: e.to_string(),
            hand_count: None,
        }
    }

    /// Push an already validated frame
    pub fn push_landmarks(&self, frame: LandmarkFrame) -> PushOutcome {
        let (push, frames_required) = {
            let mut buffer = self.inner.buffer.lock();
            (buffer.push(frame), buffer.capacity())
        };

        match push {
            BufferPush::Appended {
                count,
                window_ready,
            } => {
                if window_ready {
                    debug!(frames = count, "window ready");
                    self.signal_ready();
                }
                PushOutcome::Accepted {
                    frames_collected: count,
                    frames_required,
                    window_ready,
                }
            }
            BufferPush::Reset {
                hand_count,
                discarded,
            } => {
                if discarded > 0 {
                    warn!(hand_count, discarded, "hand count dropped, window reset");
                    if self.inner.gate.lock().cancel() {
                        debug!("pending dispatch cancelled by reset");
                    }
                }
                PushOutcome::Rejected {
                    reason: ValidationError::HandCount { hand_count }.to_string(),
                    hand_count: Some(hand_count),
                }
            }
        }
    }

    /// Send a "window ready" signal through the debounce gate, as a full
    /// window would. Honours the cooldown.
    pub fn trigger_now(&self) -> GateSignal {
        self.signal_ready()
    }

    fn signal_ready(&self) -> GateSignal {
        let now = self.inner.clock.now_ms();
        let mut slot = self.inner.gate.lock();
        let signal = slot.gate.signal(now);

        match signal {
            GateSignal::Ignored { remaining_ms } => {
                debug!(
                    remaining_ms,
                    gate = ?slot.gate.state(now),
                    "cooldown active, window ready ignored"
                );
                // the next slide of a full window signals again
                self.inner.buffer.lock().rearm();
            }
            GateSignal::Scheduled { deadline } => {
                if let Some(old) = slot.timer.take() {
                    old.abort();
                }
                let delay = Duration::from_millis(deadline.saturating_sub(now));
                let pipeline = self.clone();
                slot.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    pipeline.on_coalesce_elapsed();
                }));
            }
        }
        signal
    }

    fn on_coalesce_elapsed(&self) {
        let now = self.inner.clock.now_ms();
        {
            let mut slot = self.inner.gate.lock();
            if !slot.gate.poll(now) {
                return;
            }
            slot.timer = None;
        }

        let (snapshot, generation) = self.snapshot();
        let required = self.inner.config.read().frames_required;
        if let Err(e) = validate_window(&snapshot, required) {
            self.reject_locally(snapshot.len(), false, e);
            return;
        }
        self.inner.queue.enqueue(snapshot, false, generation);
    }

    /// Dispatch the current window immediately, skipping the fill and
    /// cooldown checks. Validation, the queue and the threshold still apply.
    pub async fn force_predict(&self) -> Result<PredictionOutcome, QueueError> {
        let (snapshot, generation) = self.snapshot();
        let check = if snapshot.is_empty() {
            Err(ValidationError::WindowLength {
                expected: self.inner.config.read().frames_required,
                actual: 0,
            })
        } else {
            validate_window(&snapshot, snapshot.len())
        };
        if let Err(e) = check {
            return Ok(self.reject_locally(snapshot.len(), true, e));
        }

        {
            let now = self.inner.clock.now_ms();
            let mut slot = self.inner.gate.lock();
            slot.cancel();
            slot.gate.record_dispatch(now);
        }
        info!(frames = snapshot.len(), "forced dispatch");
        self.inner
            .queue
            .enqueue(snapshot, true, generation)
            .outcome()
            .await
    }

    fn snapshot(&self) -> (Vec<LandmarkFrame>, u64) {
        let buffer = self.inner.buffer.lock();
        (buffer.snapshot(), buffer.generation())
    }

    fn reject_locally(&self, frames: usize, forced: bool, error: ValidationError) -> PredictionOutcome {
        warn!(frames, forced, error = %error, "window failed validation, not dispatched");
        self.inner.publisher.resolve(Resolution {
            request_id: Uuid::new_v4(),
            frames,
            generation: self.inner.buffer.lock().generation(),
            forced,
            latency_ms: 0,
            result: Err(ResolutionError::Validation(error)),
        })
    }

    /// Discard the window and any pending dispatch timer
    pub fn clear_buffer(&self) -> BufferStatus {
        self.inner.buffer.lock().clear();
        self.inner.gate.lock().cancel();
        self.buffer_status()
    }

    /// Reject every queued request that has not started
    pub fn clear_queue(&self) -> usize {
        self.inner.queue.clear()
    }

    pub fn buffer_status(&self) -> BufferStatus {
        self.inner.buffer.lock().status()
    }

    /// True while a classifier request is pending or running
    pub fn is_active(&self) -> bool {
        self.inner.queue.in_flight() || self.inner.queue.pending() > 0
    }

    /// Most recent outcomes, newest first
    pub fn history(&self, limit: Option<usize>) -> Vec<PredictionOutcome> {
        self.inner.publisher.history(limit)
    }

    pub fn clear_history(&self) {
        self.inner.publisher.clear_history();
    }

    pub fn stats(&self) -> Stats {
        self.inner.publisher.stats()
    }

    pub fn reset_stats(&self) {
        self.inner.publisher.reset_stats();
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.inner.publisher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.publisher.unsubscribe(id)
    }

    pub fn config(&self) -> PipelineConfig {
        self.inner.config.read().clone()
    }

    /// Validate and apply a configuration change. A new window size clears
    /// the buffer.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<PipelineConfig, ConfigError> {
        let (config, resized) = {
            let mut config = self.inner.config.write();
            let previous = config.frames_required;
            config.apply(update)?;
            (config.clone(), previous != config.frames_required)
        };

        if resized {
            self.inner.buffer.lock().set_capacity(config.frames_required);
            self.inner.gate.lock().cancel();
        }
        self.inner
            .gate
            .lock()
            .gate
            .set_timing(config.detection_interval_ms, config.coalesce_delay_ms);
        self.inner.queue.set_options(QueueOptions::from(&config));
        self.inner.publisher.set_threshold(config.confidence_threshold);
        self.inner.publisher.set_history_capacity(config.history_capacity);
        *self.inner.slide_after_actionable.write() = config.slide_after_actionable;

        info!(?update, "configuration updated");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ScriptStep, ScriptedClassifier};
    use crate::store::{MemoryStore, KEY_ACTIVE};
    use crate::types::HAND_SIZE;

    fn two_hands() -> Vec<f64> {
        vec![0.42; HAND_SIZE * 2]
    }

    fn left_only() -> Vec<f64> {
        let mut v = vec![0.42; HAND_SIZE];
        v.extend(vec![0.0; HAND_SIZE]);
        v
    }

    fn setup(steps: Vec<ScriptStep>, latency_ms: u64) -> (GesturePipeline, Arc<ScriptedClassifier>) {
        let classifier = Arc::new(
            ScriptedClassifier::new(steps).with_latency(Duration::from_millis(latency_ms)),
        );
        let pipeline = GesturePipeline::new(PipelineConfig::default(), classifier.clone()).unwrap();
        (pipeline, classifier)
    }

    fn collect(pipeline: &GesturePipeline) -> Arc<Mutex<Vec<PipelineEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        pipeline.subscribe(move |event| sink.lock().push(event.clone()));
        events
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_dispatches_once() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 50);

        for i in 0..39 {
            let outcome = pipeline.push_frame(two_hands());
            assert_eq!(
                outcome,
                PushOutcome::Accepted {
                    frames_collected: i + 1,
                    frames_required: 40,
                    window_ready: false
                }
            );
        }
        let last = pipeline.push_frame(two_hands());
        assert!(matches!(
            last,
            PushOutcome::Accepted {
                window_ready: true,
                ..
            }
        ));

        settle(1_000).await;
        assert_eq!(classifier.windows_seen(), vec![40]);
        let history = pipeline.history(None);
        assert_eq!(history.len(), 1);
        assert!(history[0].actionable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_hand_resets_and_never_dispatches() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 0);

        for _ in 0..39 {
            pipeline.push_frame(two_hands());
        }
        let rejected = pipeline.push_frame(left_only());
        assert_eq!(
            rejected,
            PushOutcome::Rejected {
                reason: "Expected 2 hands, detected 1".to_string(),
                hand_count: Some(1),
            }
        );
        assert_eq!(pipeline.buffer_status().count, 0);

        settle(5_000).await;
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_coalescing_cancels_dispatch() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 0);

        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        pipeline.push_frame(vec![0.0; HAND_SIZE * 2]);

        settle(1_000).await;
        assert_eq!(classifier.calls(), 0);
        assert!(pipeline.history(None).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_frame_leaves_window_untouched() {
        let (pipeline, _classifier) = setup(vec![], 0);
        for _ in 0..5 {
            pipeline.push_frame(two_hands());
        }

        let mut bad = two_hands();
        bad[10] = f64::NAN;
        let outcome = pipeline.push_frame(bad);
        assert_eq!(
            outcome,
            PushOutcome::Rejected {
                reason: "Frame value at index 10 is not a finite number".to_string(),
                hand_count: None,
            }
        );
        assert!(!pipeline.push_frame(vec![0.1; 3]).is_accepted());
        assert!(!pipeline.push_value(&serde_json::json!({"frame": 1})).is_accepted());
        assert_eq!(pipeline.buffer_status().count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_predict_bypasses_fill_and_cooldown() {
        // below threshold so the window is not slid between calls
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("stop", 0.6)], 20);

        for _ in 0..10 {
            pipeline.push_frame(two_hands());
        }
        let start = tokio::time::Instant::now();
        let outcome = pipeline.force_predict().await.unwrap();
        assert!(outcome.forced);
        assert_eq!(outcome.frames, 10);
        assert!(outcome.success);
        // no coalescing delay before the call
        assert!(start.elapsed() < Duration::from_millis(100));

        // a second forced dispatch inside the cooldown still goes through
        let again = pipeline.force_predict().await.unwrap();
        assert!(again.success);
        assert_eq!(classifier.windows_seen(), vec![10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_predict_on_empty_window_is_rejected_locally() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("stop", 0.8)], 0);
        let outcome = pipeline.force_predict().await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.forced);
        assert_eq!(classifier.calls(), 0);
        assert_eq!(pipeline.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_threshold_recorded_but_not_actionable() {
        let (pipeline, _classifier) = setup(vec![ScriptStep::respond("wave", 0.45)], 0);
        let events = collect(&pipeline);

        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        settle(500).await;

        let stats = pipeline.stats();
        assert_eq!(stats.successful, 1);
        assert!((stats.average_confidence - 0.45).abs() < 1e-9);
        let events = events.lock();
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::PredictionAdded(o) if !o.actionable)));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::GestureRecognized { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_dispatches_at_most_once_per_cooldown() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.45)], 0);

        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        // keep sliding a full window at ~30 fps for 2.9 s
        for _ in 0..87 {
            settle(33).await;
            pipeline.push_frame(two_hands());
        }
        assert_eq!(classifier.calls(), 1);

        for _ in 0..30 {
            settle(33).await;
            pipeline.push_frame(two_hands());
        }
        settle(500).await;
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_burst_collapses() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 0);
        for _ in 0..39 {
            pipeline.push_frame(two_hands());
        }
        pipeline.push_frame(two_hands());

        for _ in 0..5 {
            settle(30).await;
            assert!(matches!(
                pipeline.trigger_now(),
                GateSignal::Scheduled { .. }
            ));
        }
        settle(1_000).await;
        assert_eq!(classifier.calls(), 1);
        assert!(matches!(pipeline.trigger_now(), GateSignal::Ignored { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_on_partial_window_is_rejected_locally() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 0);
        for _ in 0..12 {
            pipeline.push_frame(two_hands());
        }
        pipeline.trigger_now();
        settle(500).await;

        assert_eq!(classifier.calls(), 0);
        let history = pipeline.history(None);
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
        assert_eq!(history[0].frames, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_triggers_keep_one_call_in_flight() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 400);
        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        settle(150).await;

        let a = tokio::spawn({
            let p = pipeline.clone();
            async move { p.force_predict().await }
        });
        let b = tokio::spawn({
            let p = pipeline.clone();
            async move { p.force_predict().await }
        });
        assert!(a.await.unwrap().unwrap().success);
        assert!(b.await.unwrap().unwrap().success);

        assert_eq!(classifier.calls(), 3);
        assert_eq!(classifier.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actionable_outcome_slides_window() {
        let (pipeline, _classifier) = setup(vec![ScriptStep::respond("wave", 0.95)], 0);
        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        settle(500).await;
        assert_eq!(pipeline.buffer_status().count, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_slide_when_window_replaced_in_flight() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.95)], 500);
        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        // dispatch leaves at 100ms and answers at 600ms
        settle(200).await;
        assert_eq!(classifier.calls(), 1);

        // hands drop, then a new gesture starts before the answer arrives
        pipeline.push_frame(vec![0.0; HAND_SIZE * 2]);
        for _ in 0..30 {
            pipeline.push_frame(two_hands());
        }
        settle(1_000).await;

        assert!(pipeline.history(None)[0].actionable);
        assert_eq!(pipeline.buffer_status().count, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_coalesce_delay_is_refused() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 0);
        let refused = pipeline.update_config(&ConfigUpdate {
            coalesce_delay_ms: Some(u64::MAX),
            ..Default::default()
        });
        assert!(refused.is_err());
        assert_eq!(pipeline.config().coalesce_delay_ms, 100);

        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        settle(500).await;
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_buffer_is_idempotent() {
        let (pipeline, _classifier) = setup(vec![], 0);
        pipeline.push_frame(two_hands());
        assert_eq!(pipeline.clear_buffer().count, 0);
        assert_eq!(pipeline.clear_buffer().count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_queue_rejects_waiting_forced_requests() {
        let (pipeline, classifier) = setup(vec![ScriptStep::respond("wave", 0.9)], 300);
        for _ in 0..5 {
            pipeline.push_frame(two_hands());
        }

        let running = tokio::spawn({
            let p = pipeline.clone();
            async move { p.force_predict().await }
        });
        settle(10).await;
        let waiting = tokio::spawn({
            let p = pipeline.clone();
            async move { p.force_predict().await }
        });
        settle(10).await;

        assert!(pipeline.is_active());
        assert_eq!(pipeline.clear_queue(), 1);
        assert_eq!(waiting.await.unwrap(), Err(QueueError::Cleared));
        assert!(running.await.unwrap().unwrap().success);
        assert_eq!(classifier.calls(), 1);
        assert_eq!(pipeline.stats().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_resizes_window() {
        let (pipeline, _classifier) = setup(vec![], 0);
        for _ in 0..8 {
            pipeline.push_frame(two_hands());
        }

        let config = pipeline
            .update_config(&ConfigUpdate {
                frames_required: Some(30),
                confidence_threshold: Some(0.5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.frames_required, 30);
        assert_eq!(
            pipeline.buffer_status(),
            BufferStatus {
                count: 0,
                capacity: 30,
                ready: false
            }
        );

        let err = pipeline.update_config(&ConfigUpdate {
            confidence_threshold: Some(-0.1),
            ..Default::default()
        });
        assert!(err.is_err());
        assert_eq!(pipeline.config().confidence_threshold, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_tracks_activity() {
        let classifier = Arc::new(
            ScriptedClassifier::new(vec![ScriptStep::respond("wave", 0.9)])
                .with_latency(Duration::from_millis(200)),
        );
        let store = Arc::new(MemoryStore::new());
        let pipeline = GesturePipeline::builder(classifier)
            .store(store.clone())
            .build()
            .unwrap();

        for _ in 0..40 {
            pipeline.push_frame(two_hands());
        }
        settle(150).await;
        assert_eq!(store.get(KEY_ACTIVE), Some(serde_json::json!(true)));
        settle(1_000).await;
        assert_eq!(store.get(KEY_ACTIVE), Some(serde_json::json!(false)));
    }
}
