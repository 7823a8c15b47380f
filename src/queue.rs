//! Single-concurrency dispatch queue
//!
//! Serializes calls to the remote classifier: requests wait in FIFO order and a
//! single worker task sends them one at a time, pausing briefly between
//! requests so a backlog cannot saturate the service. Transport failures and
//! timeouts are turned into failed outcomes here and never stop the worker.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::GestureClassifier;
use crate::config::PipelineConfig;
use crate::error::{QueueError, TransportError};
use crate::types::{LandmarkFrame, PredictionOutcome, Resolution, ResolutionError};

/// Receives queue activity. Called from the worker task only, so calls arrive
/// in order and never overlap.
pub trait DispatchObserver: Send + Sync {
    /// The worker started (true) or finished (false) a run of requests
    fn on_active_changed(&self, active: bool);

    /// Turn a resolved request into the outcome handed back to its caller
    fn on_resolved(&self, resolution: Resolution) -> PredictionOutcome;
}

/// Runtime knobs taken from [`PipelineConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueOptions {
    pub queued: bool,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub return_probabilities: bool,
}

impl From<&PipelineConfig> for QueueOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queued: config.enable_prediction_queue,
            pacing: Duration::from_millis(config.queue_pacing_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            return_probabilities: config.return_probabilities,
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// A window waiting for the classifier
struct DispatchRequest {
    id: Uuid,
    window: Vec<LandmarkFrame>,
    generation: u64,
    forced: bool,
    enqueued_at: Instant,
    respond: oneshot::Sender<Result<PredictionOutcome, QueueError>>,
}

struct QueueState {
    pending: VecDeque<DispatchRequest>,
    in_flight: bool,
    options: QueueOptions,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    classifier: Arc<dyn GestureClassifier>,
    observer: Arc<dyn DispatchObserver>,
}

/// Handle to a queued request
#[derive(Debug)]
pub struct DispatchTicket {
    request_id: Uuid,
    rx: oneshot::Receiver<Result<PredictionOutcome, QueueError>>,
}

impl DispatchTicket {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Wait for the request to be served (or rejected)
    pub async fn outcome(self) -> Result<PredictionOutcome, QueueError> {
        self.rx.await.unwrap_or(Err(QueueError::Closed))
    }
}

/// FIFO queue with exactly one classifier call in flight
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

impl DispatchQueue {
    pub fn new(
        classifier: Arc<dyn GestureClassifier>,
        observer: Arc<dyn DispatchObserver>,
        options: QueueOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    in_flight: false,
                    options,
                    worker: None,
                }),
                wake: Notify::new(),
                classifier,
                observer,
            }),
        }
    }

    /// Queue a window snapshot. Must be called inside a tokio runtime; the
    /// worker task is started on first use.
    ///
    /// With the queue disabled, a request made while another is pending or in
    /// flight is rejected with [`QueueError::Busy`].
    ///
    /// `generation` identifies the buffer contents the window was taken from
    /// and is handed back in the [`Resolution`].
    pub fn enqueue(
        &self,
        window: Vec<LandmarkFrame>,
        forced: bool,
        generation: u64,
    ) -> DispatchTicket {
        let (tx, rx) = oneshot::channel();
        let request_id = Uuid::new_v4();
        let ticket = DispatchTicket { request_id, rx };

        let mut state = self.shared.state.lock();
        if state.worker.as_ref().is_some_and(|w| w.is_finished()) {
            // an observer panicked mid-request and took the worker down
            warn!("dispatch worker exited, restarting");
            state.worker = None;
            state.in_flight = false;
        }
        if !state.options.queued && (state.in_flight || !state.pending.is_empty()) {
            drop(state);
            debug!(%request_id, "classifier busy, direct dispatch rejected");
            let _ = tx.send(Err(QueueError::Busy));
            return ticket;
        }

        state.pending.push_back(DispatchRequest {
            id: request_id,
            window,
            generation,
            forced,
            enqueued_at: Instant::now(),
            respond: tx,
        });
        debug!(%request_id, pending = state.pending.len(), forced, "dispatch queued");

        if state.worker.is_none() {
            let shared = Arc::clone(&self.shared);
            state.worker = Some(tokio::spawn(run_worker(shared)));
        }
        drop(state);

        self.shared.wake.notify_one();
        ticket
    }

    /// Reject every request that has not started. The in-flight one is left
    /// alone. Returns the number rejected.
    pub fn clear(&self) -> usize {
        let dropped: Vec<DispatchRequest> = self.shared.state.lock().pending.drain(..).collect();
        let count = dropped.len();
        for request in dropped {
            let _ = request.respond.send(Err(QueueError::Cleared));
        }
        if count > 0 {
            info!(count, "dispatch queue cleared");
        }
        count
    }

    pub fn set_options(&self, options: QueueOptions) {
        self.shared.state.lock().options = options;
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// True while a classifier call is running
    pub fn in_flight(&self) -> bool {
        self.shared.state.lock().in_flight
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.shared.state.lock().worker.take() {
            worker.abort();
        }
    }
}

async fn run_worker(shared: Arc<Shared>) {
    let mut active = false;
    loop {
        let next = {
            let mut state = shared.state.lock();
            let next = state.pending.pop_front();
            state.in_flight = next.is_some();
            next.map(|request| (request, state.options))
        };

        let Some((request, options)) = next else {
            if active {
                active = false;
                shared.observer.on_active_changed(false);
            }
            shared.wake.notified().await;
            continue;
        };

        if !active {
            active = true;
            shared.observer.on_active_changed(true);
        }

        let DispatchRequest {
            id,
            window,
            generation,
            forced,
            enqueued_at,
            respond,
        } = request;

        let resolution =
            dispatch(&shared, id, window, generation, forced, enqueued_at, options).await;
        let outcome = shared.observer.on_resolved(resolution);
        shared.state.lock().in_flight = false;
        let _ = respond.send(Ok(outcome));

        if options.queued && !options.pacing.is_zero() {
            tokio::time::sleep(options.pacing).await;
        }
    }
}

async fn dispatch(
    shared: &Shared,
    id: Uuid,
    window: Vec<LandmarkFrame>,
    generation: u64,
    forced: bool,
    enqueued_at: Instant,
    options: QueueOptions,
) -> Resolution {
    let started = Instant::now();
    let waited_ms = started.duration_since(enqueued_at).as_millis() as u64;
    let frames = window.len();
    info!(request_id = %id, frames, forced, waited_ms, "dispatching window");

    let classifier = Arc::clone(&shared.classifier);
    // own task, so a panicking classifier fails this request only
    let call = tokio::spawn(async move {
        tokio::time::timeout(
            options.request_timeout,
            classifier.predict(&window, options.return_probabilities),
        )
        .await
    });
    let result = match call.await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(TransportError::Timeout(
            options.request_timeout.as_millis() as u64,
        )),
        Err(e) => Err(TransportError::Failed {
            message: format!("classifier task failed: {}", e),
            status: None,
        }),
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(response) => info!(
            request_id = %id,
            gesture = %response.gesture,
            confidence = response.confidence,
            latency_ms,
            "classifier answered"
        ),
        Err(e) => warn!(request_id = %id, error = %e, latency_ms, "classifier request failed"),
    }

    Resolution {
        request_id: id,
        frames,
        generation,
        forced,
        latency_ms,
        result: result.map_err(ResolutionError::Transport),
    }
}
