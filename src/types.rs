//! Core types for the Gesture Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark frames, buffer status, classifier responses, and
//! published prediction outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{TransportError, ValidationError};

/// Values per hand: 21 landmarks x 3 coordinates
pub const HAND_SIZE: usize = 63;

/// Values per frame: left hand followed by right hand
pub const FRAME_SIZE: usize = HAND_SIZE * 2;

/// One video frame of hand-pose data: `[left(63), right(63)]`.
///
/// A zero-filled hand slice means that hand is absent. Construction through
/// `TryFrom` guarantees the length and that every value is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LandmarkFrame(Vec<f64>);

impl LandmarkFrame {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn left(&self) -> &[f64] {
        &self.0[..HAND_SIZE]
    }

    pub fn right(&self) -> &[f64] {
        &self.0[HAND_SIZE..]
    }

    /// Number of hands present (0, 1 or 2)
    pub fn hand_count(&self) -> u8 {
        crate::validator::count_hands(&self.0)
    }

    #[cfg(test)]
    pub(crate) fn unchecked(values: Vec<f64>) -> Self {
        LandmarkFrame(values)
    }
}

impl TryFrom<Vec<f64>> for LandmarkFrame {
    type Error = ValidationError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        crate::validator::validate_frame(&values)?;
        Ok(LandmarkFrame(values))
    }
}

impl From<LandmarkFrame> for Vec<f64> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.0
    }
}

/// Result of pushing one frame into the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    Accepted {
        frames_collected: usize,
        frames_required: usize,
        /// True only for the push that filled the window
        window_ready: bool,
    },
    Rejected {
        reason: String,
        /// Detected hands, when the frame itself was well-formed
        #[serde(skip_serializing_if = "Option::is_none")]
        hand_count: Option<u8>,
    },
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted { .. })
    }
}

/// Snapshot of the frame window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStatus {
    pub count: usize,
    pub capacity: usize,
    pub ready: bool,
}

/// Successful answer from the remote classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    pub gesture: String,
    /// Confidence in `0..=1`
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// A dispatch that left the queue, before threshold filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub request_id: Uuid,
    pub frames: usize,
    /// Buffer generation the window was taken from
    pub generation: u64,
    pub forced: bool,
    pub latency_ms: u64,
    pub result: Result<ClassifierResponse, ResolutionError>,
}

/// Why a resolution carries no classifier answer
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionError {
    Transport(TransportError),
    Validation(ValidationError),
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionError::Transport(e) => write!(f, "{}", e),
            ResolutionError::Validation(e) => write!(f, "{}", e),
        }
    }
}

/// Published result of one dispatch (or local rejection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub request_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Transport status code, when the failure carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Confidence cleared the threshold; drives downstream actions
    pub actionable: bool,
    pub forced: bool,
    pub frames: usize,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Running prediction statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Mean confidence over successful outcomes (0 when none)
    pub average_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_length() {
        let err = LandmarkFrame::try_from(vec![0.5; 10]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongLength {
                expected: FRAME_SIZE,
                actual: 10
            }
        );
    }

    #[test]
    fn test_frame_deserializes_through_validation() {
        let json = serde_json::to_string(&vec![0.25; FRAME_SIZE]).unwrap();
        let frame: LandmarkFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame.hand_count(), 2);
        assert_eq!(frame.left().len(), HAND_SIZE);

        assert!(serde_json::from_str::<LandmarkFrame>("[1.0, 2.0]").is_err());
    }

    #[test]
    fn test_push_outcome_serialization() {
        let rejected = PushOutcome::Rejected {
            reason: "Expected 2 hands, detected 1".to_string(),
            hand_count: Some(1),
        };
        let value = serde_json::to_value(&rejected).unwrap();
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["hand_count"], 1);
        assert!(!rejected.is_accepted());
    }
}
