//! Gesture Flux - landmark-frame accumulation and dispatch for gesture recognition
//!
//! Flux turns a stream of per-frame hand landmarks into classifier requests
//! through a deterministic pipeline: frame validation → two-hand window
//! buffering → debounced dispatch → serialized classifier calls → threshold
//! filtering and publication.
//!
//! ## Modules
//!
//! - **Window**: `validator`, `buffer` and `gate` decide when a window is worth sending
//! - **Dispatch**: `queue` keeps one classifier request in flight at a time
//! - **Results**: `publisher` filters, records and broadcasts outcomes
//!
//! ```no_run
//! use std::sync::Arc;
//! use gesture_flux::{GesturePipeline, PipelineConfig, ScriptStep, ScriptedClassifier};
//!
//! # async fn demo() -> Result<(), gesture_flux::ConfigError> {
//! let classifier = Arc::new(ScriptedClassifier::new(vec![ScriptStep::respond("wave", 0.9)]));
//! let pipeline = GesturePipeline::new(PipelineConfig::default(), classifier)?;
//! pipeline.subscribe(|event| println!("{event:?}"));
//! pipeline.push_frame(vec![0.5; gesture_flux::FRAME_SIZE]);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod publisher;
pub mod queue;
pub mod store;
pub mod types;
pub mod validator;

pub use classifier::{GestureClassifier, ScriptStep, ScriptedClassifier};
pub use config::{ConfigUpdate, PipelineConfig};
pub use error::{ConfigError, QueueError, TransportError, ValidationError};
pub use gate::GateSignal;
pub use pipeline::{GesturePipeline, PipelineBuilder};
pub use publisher::{PipelineEvent, SubscriptionId};
pub use store::{MemoryStore, StateStore};
pub use types::{
    BufferStatus, ClassifierResponse, LandmarkFrame, PredictionOutcome, PushOutcome, Stats,
    FRAME_SIZE, HAND_SIZE,
};

/// Flux version reported by the CLI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "gesture-flux";
