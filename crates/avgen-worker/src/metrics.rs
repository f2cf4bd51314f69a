//! Job metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these are no-ops.

use metrics::{counter, histogram};

use avgen_models::JobOutput;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "avgen_jobs_total";
    pub const JOB_FAILURES_TOTAL: &str = "avgen_job_failures_total";
    pub const JOB_DURATION_SECONDS: &str = "avgen_job_duration_seconds";
    pub const GENERATOR_DURATION_SECONDS: &str = "avgen_generator_duration_seconds";
}

/// Record a finished job.
pub fn record_job(output: &JobOutput, duration_secs: f64) {
    let labels = [("outcome", output.outcome().to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);

    if let Some(kind) = output.error_kind() {
        let labels = [("kind", kind.as_str().to_string())];
        counter!(names::JOB_FAILURES_TOTAL, &labels).increment(1);
    }
}

/// Record generator wall-clock time.
pub fn record_generator_duration(duration_secs: f64) {
    histogram!(names::GENERATOR_DURATION_SECONDS).record(duration_secs);
}
