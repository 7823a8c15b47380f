//! Remote gesture classifier interface
//!
//! The transport to the classifier is opaque to the pipeline: anything that can
//! turn a window of frames into a [`ClassifierResponse`] asynchronously can sit
//! behind [`GestureClassifier`]. [`ScriptedClassifier`] replays a fixed list of
//! answers and is used for offline replay and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::TransportError;
use crate::types::{ClassifierResponse, LandmarkFrame};

/// Asynchronous call to the remote gesture classifier
#[async_trait]
pub trait GestureClassifier: Send + Sync {
    /// Classify one window (`frames.len()` x 126 values)
    async fn predict(
        &self,
        window: &[LandmarkFrame],
        return_probabilities: bool,
    ) -> Result<ClassifierResponse, TransportError>;
}

/// One scripted classifier answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Respond(ClassifierResponse),
    Fail {
        error: String,
        #[serde(default)]
        status: Option<u16>,
    },
}

impl ScriptStep {
    pub fn respond(gesture: &str, confidence: f64) -> Self {
        ScriptStep::Respond(ClassifierResponse {
            gesture: gesture.to_string(),
            confidence,
            probabilities: None,
        })
    }

    pub fn fail(error: &str, status: Option<u16>) -> Self {
        ScriptStep::Fail {
            error: error.to_string(),
            status,
        }
    }
}

/// Classifier that replays scripted answers in order, cycling at the end
pub struct ScriptedClassifier {
    steps: Vec<ScriptStep>,
    latency: Duration,
    cursor: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    windows: Mutex<Vec<usize>>,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            latency: Duration::ZERO,
            cursor: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            windows: Mutex::new(Vec::new()),
        }
    }

    /// Simulated round-trip time per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Load steps from a JSON array
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let steps: Vec<ScriptStep> = serde_json::from_str(json)?;
        Ok(Self::new(steps))
    }

    /// Calls received so far
    pub fn calls(&self) -> usize {
        self.windows.lock().len()
    }

    /// Window length of every call, in call order
    pub fn windows_seen(&self) -> Vec<usize> {
        self.windows.lock().clone()
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<ScriptStep> {
        if self.steps.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) % self.steps.len();
        Some(self.steps[i].clone())
    }
}

#[async_trait]
impl GestureClassifier for ScriptedClassifier {
    async fn predict(
        &self,
        window: &[LandmarkFrame],
        return_probabilities: bool,
    ) -> Result<ClassifierResponse, TransportError> {
        self.windows.lock().push(window.len());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_step() {
            Some(ScriptStep::Respond(mut response)) => {
                if !return_probabilities {
                    response.probabilities = None;
                }
                Ok(response)
            }
            Some(ScriptStep::Fail { error, status }) => {
                Err(TransportError::Failed { message: error, status })
            }
            None => Err(TransportError::Failed {
                message: "no scripted responses".to_string(),
                status: None,
            }),
        }
    }
}
