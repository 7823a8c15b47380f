//! Error types for Gesture Flux

use thiserror::Error;

/// A malformed frame or window. Never dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Frame has {actual} values, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Frame value at index {index} is not a finite number")]
    NonFinite { index: usize },

    #[error("Window has {actual} frames, expected {expected}")]
    WindowLength { expected: usize, actual: usize },

    #[error("Window frame {index} is invalid: {source}")]
    InvalidFrame {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("Expected 2 hands, detected {hand_count}")]
    HandCount { hand_count: u8 },

    #[error("Frame payload is not a sequence of numbers: {0}")]
    NotASequence(String),
}

/// A failed, timed-out, or non-success remote classifier call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Classifier request failed: {message}")]
    Failed {
        message: String,
        status: Option<u16>,
    },

    #[error("Classifier request timed out after {0}ms")]
    Timeout(u64),
}

impl TransportError {
    /// Build a failure that carries an HTTP-like status code
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        TransportError::Failed {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Failed { status, .. } => *status,
            TransportError::Timeout(_) => None,
        }
    }
}

/// Rejection of a request that never reached the classifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue cleared before the request started")]
    Cleared,

    #[error("A classifier request is already in flight")]
    Busy,

    #[error("Dispatch task dropped the request")]
    Closed,
}

/// Rejected configuration update
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    OutOfRange { key: &'static str, reason: String },

    #[error("Invalid configuration JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e.to_string())
    }
}
