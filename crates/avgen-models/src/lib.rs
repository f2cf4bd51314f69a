//! Shared data models for the AvGen job pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job requests as delivered by the host runtime
//! - Job lifecycle states
//! - Structured job outputs and the error taxonomy

pub mod job;
pub mod output;

// Re-export common types
pub use job::{JobEnvelope, JobId, JobRequest, JobState, RequestError};
pub use output::{ErrorKind, JobFailure, JobOutput, JobSuccess};
