//! Host-runtime payload handling.
//!
//! The host delivers `{"input": {"audio_path": .., "video_path": .., "fps": ..}}`
//! and expects the job output back. Nothing here fails; rejections are
//! `InvalidRequest` outputs produced before any side effect, and are counted
//! like any other finished job.

use serde_json::Value;
use tracing::warn;

use avgen_models::{JobEnvelope, JobOutput};

use crate::error::PipelineError;
use crate::metrics;
use crate::pipeline::JobPipeline;

/// Handle one decoded payload.
pub async fn handle_payload(pipeline: &JobPipeline, payload: Value) -> JobOutput {
    match JobEnvelope::parse(payload) {
        Ok(request) => pipeline.run(request).await,
        Err(e) => reject(e.to_string()),
    }
}

/// Handle one payload given as JSON text.
pub async fn handle_json(pipeline: &JobPipeline, payload: &str) -> JobOutput {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => handle_payload(pipeline, value).await,
        Err(e) => reject(format!("payload is not valid JSON: {}", e)),
    }
}

/// Output for a payload that never became a job.
pub fn reject(reason: impl Into<String>) -> JobOutput {
    let err = PipelineError::InvalidRequest(reason.into());
    warn!("Rejected job payload: {}", err);
    let output = err.into_output(None);
    metrics::record_job(&output, 0.0);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use avgen_models::ErrorKind;
    use avgen_storage::Publisher;
    use ::metrics::{
        Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString,
        Unit,
    };
    use serde_json::json;

    use crate::config::WorkerConfig;

    type Counts = Arc<Mutex<HashMap<String, u64>>>;

    /// Counts counter increments by `name{label=value,..}`.
    #[derive(Default)]
    struct CountingRecorder {
        counts: Counts,
    }

    struct CountHandle {
        key: String,
        counts: Counts,
    }

    impl CounterFn for CountHandle {
        fn increment(&self, value: u64) {
            *self.counts.lock().unwrap().entry(self.key.clone()).or_default() += value;
        }

        fn absolute(&self, _value: u64) {}
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let labels: Vec<String> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            Counter::from_arc(Arc::new(CountHandle {
                key: format!("{}{{{}}}", key.name(), labels.join(",")),
                counts: Arc::clone(&self.counts),
            }))
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    fn pipeline(scratch: &std::path::Path) -> JobPipeline {
        let config = WorkerConfig {
            scratch_root: scratch.join("jobs"),
            ..WorkerConfig::default()
        };
        JobPipeline::new(config, Publisher::unconfigured("test")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_input_is_invalid() {
        let scratch = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(scratch.path());

        for payload in [
            json!({}),
            json!({"input": null}),
            json!({"input": {"audio_path": "https://x/a.wav"}}),
            json!({"input": {"audio_path": "https://x/a.wav", "video_path": ""}}),
        ] {
            let output = handle_payload(&pipeline, payload).await;
            assert_eq!(output.error_kind(), Some(ErrorKind::InvalidRequest));
        }

        assert!(!scratch.path().join("jobs").exists());
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_invalid() {
        let scratch = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(scratch.path());

        let output = handle_payload(&pipeline, json!({"input": {"audio_path": 7}})).await;
        assert_eq!(output.error_kind(), Some(ErrorKind::InvalidRequest));

        let output = handle_json(&pipeline, "{not json").await;
        match output {
            JobOutput::Failure(f) => {
                assert_eq!(f.error_kind, ErrorKind::InvalidRequest);
                assert!(f.error.contains("not valid JSON"));
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_every_rejection_is_counted() {
        let scratch = tempfile::TempDir::new().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let pipeline = runtime.block_on(async { pipeline(scratch.path()) });
        let recorder = CountingRecorder::default();

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                handle_json(&pipeline, "{not json").await;
                handle_json(&pipeline, r#"{"input": {"audio_path": "a"}}"#).await;
                handle_payload(&pipeline, json!({})).await;
            });
            reject("failed to read payload: broken pipe");
        });

        let counts = recorder.counts.lock().unwrap();
        assert_eq!(counts.get("avgen_jobs_total{outcome=failed}"), Some(&4));
        assert_eq!(
            counts.get("avgen_job_failures_total{kind=invalid_request}"),
            Some(&4)
        );
    }
}
