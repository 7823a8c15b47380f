//! Result filter and publisher
//!
//! Every resolved dispatch becomes a [`PredictionOutcome`]. Successful answers
//! at or above the confidence threshold are actionable; answers below it are
//! still counted as successful and kept in history, they just never drive an
//! action. Failures are counted as failed. Only successful outcomes feed the
//! running confidence average.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HISTORY_CAPACITY};
use crate::error::TransportError;
use crate::store::{StateStore, KEY_ACTIVE, KEY_LAST_ACTIONABLE, KEY_LAST_PREDICTION, KEY_STATS};
use crate::types::{PredictionOutcome, Resolution, ResolutionError, Stats};

/// Events fanned out to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PipelineEvent {
    #[serde(rename = "prediction:added")]
    PredictionAdded(PredictionOutcome),
    #[serde(rename = "prediction:activeChanged")]
    ActiveChanged(bool),
    #[serde(rename = "stats:updated")]
    StatsUpdated(Stats),
    /// Actionable outcome; drives downstream gesture handling
    #[serde(rename = "gesture:recognized")]
    GestureRecognized {
        gesture: String,
        confidence: f64,
        request_id: Uuid,
    },
}

/// Identity of a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Confidence threshold filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultFilter {
    pub threshold: f64,
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl ResultFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Build the immutable outcome for a resolution
    pub fn evaluate(&self, resolution: Resolution) -> PredictionOutcome {
        let Resolution {
            request_id,
            frames,
            forced,
            latency_ms,
            result,
            ..
        } = resolution;

        let mut outcome = PredictionOutcome {
            request_id,
            success: false,
            gesture: None,
            confidence: None,
            probabilities: None,
            error: None,
            status: None,
            actionable: false,
            forced,
            frames,
            latency_ms,
            timestamp: Utc::now(),
        };

        match result {
            Ok(response) => {
                outcome.success = true;
                outcome.actionable = response.confidence >= self.threshold;
                outcome.gesture = Some(response.gesture);
                outcome.confidence = Some(response.confidence);
                outcome.probabilities = response.probabilities;
            }
            Err(e) => {
                outcome.error = Some(e.to_string());
                if let ResolutionError::Transport(TransportError::Failed { status, .. }) = e {
                    outcome.status = status;
                }
            }
        }
        outcome
    }
}

struct PublisherState {
    filter: ResultFilter,
    history: VecDeque<PredictionOutcome>,
    history_capacity: usize,
    stats: Stats,
}

/// Bounded history, running stats and subscriber fan-out
pub struct Publisher {
    state: Mutex<PublisherState>,
    subscribers: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    store: Option<Arc<dyn StateStore>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(ResultFilter::default(), DEFAULT_HISTORY_CAPACITY, None)
    }
}

impl Publisher {
    pub fn new(
        filter: ResultFilter,
        history_capacity: usize,
        store: Option<Arc<dyn StateStore>>,
    ) -> Self {
        let history_capacity = history_capacity.max(1);
        Self {
            state: Mutex::new(PublisherState {
                filter,
                history: VecDeque::with_capacity(history_capacity),
                history_capacity,
                stats: Stats::default(),
            }),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            store,
        }
    }

    /// Register a callback for every event.
    ///
    /// Callbacks run synchronously on the publishing task, in subscription
    /// order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Filter a resolution and publish the resulting outcome
    pub fn resolve(&self, resolution: Resolution) -> PredictionOutcome {
        let filter = self.state.lock().filter;
        let outcome = filter.evaluate(resolution);
        self.publish(outcome.clone());
        outcome
    }

    /// Record an outcome: history, stats, store, then notify
    pub fn publish(&self, outcome: PredictionOutcome) {
        let stats = {
            let mut state = self.state.lock();
            let stats = &mut state.stats;
            stats.total += 1;
            match (outcome.success, outcome.confidence) {
                (true, Some(confidence)) => {
                    stats.successful += 1;
                    stats.average_confidence +=
                        (confidence - stats.average_confidence) / stats.successful as f64;
                }
                (true, None) => stats.successful += 1,
                (false, _) => stats.failed += 1,
            }
            let stats = *stats;

            state.history.push_back(outcome.clone());
            while state.history.len() > state.history_capacity {
                state.history.pop_front();
            }
            stats
        };

        if outcome.actionable {
            info!(
                request_id = %outcome.request_id,
                gesture = outcome.gesture.as_deref().unwrap_or_default(),
                confidence = outcome.confidence.unwrap_or_default(),
                "gesture recognized"
            );
        } else if outcome.success {
            debug!(
                request_id = %outcome.request_id,
                confidence = outcome.confidence.unwrap_or_default(),
                "prediction below threshold"
            );
        } else {
            warn!(
                request_id = %outcome.request_id,
                error = outcome.error.as_deref().unwrap_or_default(),
                "prediction failed"
            );
        }

        self.write_store(KEY_LAST_PREDICTION, &outcome);
        if outcome.actionable {
            self.write_store(KEY_LAST_ACTIONABLE, &outcome);
        }
        self.write_store(KEY_STATS, &stats);

        let recognized = match (&outcome.gesture, outcome.confidence) {
            (Some(gesture), Some(confidence)) if outcome.actionable => {
                Some(PipelineEvent::GestureRecognized {
                    gesture: gesture.clone(),
                    confidence,
                    request_id: outcome.request_id,
                })
            }
            _ => None,
        };

        self.emit(&PipelineEvent::PredictionAdded(outcome));
        if let Some(event) = recognized {
            self.emit(&event);
        }
        self.emit(&PipelineEvent::StatsUpdated(stats));
    }

    /// Publish a change of queue activity
    pub fn set_active(&self, active: bool) {
        self.write_store(KEY_ACTIVE, &active);
        self.emit(&PipelineEvent::ActiveChanged(active));
    }

    /// Most recent outcomes, newest first
    pub fn history(&self, limit: Option<usize>) -> Vec<PredictionOutcome> {
        let state = self.state.lock();
        let limit = limit.unwrap_or(state.history.len());
        state.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().stats
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = Stats::default();
        let stats = Stats::default();
        self.write_store(KEY_STATS, &stats);
        self.emit(&PipelineEvent::StatsUpdated(stats));
    }

    pub fn set_threshold(&self, threshold: f64) {
        self.state.lock().filter = ResultFilter::new(threshold);
    }

    /// Change history capacity, evicting the oldest entries if needed
    pub fn set_history_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.history_capacity = capacity.max(1);
        while state.history.len() > state.history_capacity {
            state.history.pop_front();
        }
    }

    fn write_store<T: Serialize>(&self, key_path: &str, value: &T) {
        let Some(store) = &self.store else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(value) => store.set(key_path, value),
            Err(e) => warn!(key_path, error = %e, "failed to serialize store value"),
        }
    }

    fn emit(&self, event: &PipelineEvent) {
        // snapshot so callbacks may subscribe or unsubscribe
        let subscribers: Vec<Callback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(event);
        }
    }
}
