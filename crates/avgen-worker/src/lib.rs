//! Audio/video generation worker.
//!
//! This crate provides:
//! - Environment-driven worker configuration
//! - The job pipeline: stage, generate, locate, publish, clean up
//! - Mapping of every failure onto the structured job output
//! - The host-runtime payload handler

pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::{ArtifactMode, WorkerConfig};
pub use error::{PipelineError, PipelineResult};
pub use handler::{handle_json, handle_payload};
pub use logging::JobLogger;
pub use pipeline::JobPipeline;
