//! Pipeline configuration
//!
//! `PipelineConfig` carries every tunable with its default. Runtime changes go
//! through `ConfigUpdate`, which is validated as a whole before any field is
//! applied.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Frames per classification window
pub const DEFAULT_FRAMES_REQUIRED: usize = 40;

/// Minimum time between dispatches (ms)
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 3000;

/// Delay that collapses a burst of "window ready" signals (ms)
pub const DEFAULT_COALESCE_DELAY_MS: u64 = 100;

/// Minimum confidence for an actionable outcome
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Pause between queued classifier requests (ms)
pub const DEFAULT_QUEUE_PACING_MS: u64 = 100;

/// Timeout applied to each classifier request (ms)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Outcomes retained in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Oldest frames dropped after an actionable outcome
pub const DEFAULT_SLIDE_AFTER_ACTIONABLE: usize = 20;

/// Upper bound for every millisecond setting (one hour)
pub const MAX_DURATION_MS: u64 = 3_600_000;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frames_required: usize,
    /// Cooldown between dispatches (ms)
    pub detection_interval_ms: u64,
    pub coalesce_delay_ms: u64,
    pub confidence_threshold: f64,
    /// Queue dispatches; when false, requests arriving mid-flight are rejected
    pub enable_prediction_queue: bool,
    pub queue_pacing_ms: u64,
    pub request_timeout_ms: u64,
    pub history_capacity: usize,
    pub return_probabilities: bool,
    /// 0 disables the post-detection slide
    pub slide_after_actionable: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_required: DEFAULT_FRAMES_REQUIRED,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            coalesce_delay_ms: DEFAULT_COALESCE_DELAY_MS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            enable_prediction_queue: true,
            queue_pacing_ms: DEFAULT_QUEUE_PACING_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            return_probabilities: false,
            slide_after_actionable: DEFAULT_SLIDE_AFTER_ACTIONABLE,
        }
    }
}

/// Partial configuration change; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub frames_required: Option<usize>,
    pub detection_interval_ms: Option<u64>,
    pub coalesce_delay_ms: Option<u64>,
    pub confidence_threshold: Option<f64>,
    pub enable_prediction_queue: Option<bool>,
    pub queue_pacing_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub history_capacity: Option<usize>,
    pub return_probabilities: Option<bool>,
    pub slide_after_actionable: Option<usize>,
}

impl PipelineConfig {
    /// Check every range constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_required == 0 {
            return Err(ConfigError::OutOfRange {
                key: "frames_required",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfRange {
                key: "confidence_threshold",
                reason: format!("{} is outside 0..=1", self.confidence_threshold),
            });
        }
        for (key, value) in [
            ("detection_interval_ms", self.detection_interval_ms),
            ("coalesce_delay_ms", self.coalesce_delay_ms),
            ("queue_pacing_ms", self.queue_pacing_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ] {
            if value > MAX_DURATION_MS {
                return Err(ConfigError::OutOfRange {
                    key,
                    reason: format!("{}ms exceeds the {}ms limit", value, MAX_DURATION_MS),
                });
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                key: "request_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: "history_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.slide_after_actionable > self.frames_required {
            return Err(ConfigError::OutOfRange {
                key: "slide_after_actionable",
                reason: format!(
                    "{} exceeds frames_required ({})",
                    self.slide_after_actionable, self.frames_required
                ),
            });
        }
        Ok(())
    }

    /// Apply an update atomically: either every field changes or none does.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(v) = update.frames_required {
            next.frames_required = v;
        }
        if let Some(v) = update.detection_interval_ms {
            next.detection_interval_ms = v;
        }
        if let Some(v) = update.coalesce_delay_ms {
            next.coalesce_delay_ms = v;
        }
        if let Some(v) = update.confidence_threshold {
            next.confidence_threshold = v;
        }
        if let Some(v) = update.enable_prediction_queue {
            next.enable_prediction_queue = v;
        }
        if let Some(v) = update.queue_pacing_ms {
            next.queue_pacing_ms = v;
        }
        if let Some(v) = update.request_timeout_ms {
            next.request_timeout_ms = v;
        }
        if let Some(v) = update.history_capacity {
            next.history_capacity = v;
        }
        if let Some(v) = update.return_probabilities {
            next.return_probabilities = v;
        }
        if let Some(v) = update.slide_after_actionable {
            next.slide_after_actionable = v;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Load configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
