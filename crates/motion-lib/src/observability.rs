//! Observability infrastructure for the motion pipeline
//!
//! Provides:
//! - Prometheus metrics (job counts, windows and examples assembled, job latency)
//! - Structured logging of job lifecycle events with tracing

use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};
use std::sync::OnceLock;
use tracing::{error, info};

/// Histogram buckets for job latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    jobs_started: IntCounterVec,
    jobs_failed: IntCounterVec,
    windows_extracted: IntCounterVec,
    examples_assembled: IntCounterVec,
    training_latency_seconds: Histogram,
    inference_latency_seconds: Histogram,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            jobs_started: register_int_counter_vec!(
                "motion_jobs_started_total",
                "Training and inference jobs started",
                &["job"]
            )
            .expect("Failed to register jobs_started"),

            jobs_failed: register_int_counter_vec!(
                "motion_jobs_failed_total",
                "Training and inference jobs that ended with an error",
                &["job"]
            )
            .expect("Failed to register jobs_failed"),

            windows_extracted: register_int_counter_vec!(
                "motion_windows_extracted_total",
                "Full-length windows cut from raw samples",
                &["job"]
            )
            .expect("Failed to register windows_extracted"),

            examples_assembled: register_int_counter_vec!(
                "motion_examples_assembled_total",
                "Labeled feature vectors handed to a model",
                &["model"]
            )
            .expect("Failed to register examples_assembled"),

            training_latency_seconds: register_histogram!(
                "motion_training_latency_seconds",
                "Wall time of one training job",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register training_latency_seconds"),

            inference_latency_seconds: register_histogram!(
                "motion_inference_latency_seconds",
                "Wall time of one inference job",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),
        }
    }
}

/// Job kind used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Training,
    Inference,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Training => "training",
            JobKind::Inference => "inference",
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn inc_jobs_started(&self, job: JobKind) {
        self.inner().jobs_started.with_label_values(&[job.as_str()]).inc();
    }

    pub fn inc_jobs_failed(&self, job: JobKind) {
        self.inner().jobs_failed.with_label_values(&[job.as_str()]).inc();
    }

    pub fn add_windows_extracted(&self, job: JobKind, count: usize) {
        self.inner()
            .windows_extracted
            .with_label_values(&[job.as_str()])
            .inc_by(count as u64);
    }

    pub fn add_examples_assembled(&self, model: &str, count: usize) {
        self.inner()
            .examples_assembled
            .with_label_values(&[model])
            .inc_by(count as u64);
    }

    pub fn observe_training_latency(&self, duration_secs: f64) {
        self.inner().training_latency_seconds.observe(duration_secs);
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    /// Text exposition of every registered metric
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Structured logger for job lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    job_id: String,
}

impl StructuredLogger {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    pub fn log_training_started(&self, model: &str, samples: usize, labels: usize) {
        info!(
            event = "training_started",
            job_id = %self.job_id,
            model = %model,
            samples = samples,
            labels = labels,
            "Training job started"
        );
    }

    pub fn log_training_completed(
        &self,
        model: &str,
        train_examples: usize,
        validation_examples: usize,
        duration_secs: f64,
    ) {
        info!(
            event = "training_completed",
            job_id = %self.job_id,
            model = %model,
            train_examples = train_examples,
            validation_examples = validation_examples,
            duration_secs = duration_secs,
            "Training job completed"
        );
    }

    pub fn log_training_failed(&self, model: &str, reason: &str) {
        error!(
            event = "training_failed",
            job_id = %self.job_id,
            model = %model,
            reason = %reason,
            "Training job failed"
        );
    }

    pub fn log_inference_completed(&self, model: &str, predictions: usize, duration_secs: f64) {
        info!(
            event = "inference_completed",
            job_id = %self.job_id,
            model = %model,
            predictions = predictions,
            duration_secs = duration_secs,
            "Inference job completed"
        );
    }

    pub fn log_inference_failed(&self, reason: &str) {
        error!(
            event = "inference_failed",
            job_id = %self.job_id,
            reason = %reason,
            "Inference job failed"
        );
    }

    pub fn log_model_saved(&self, model: &str, location: &str, checksum: &str) {
        info!(
            event = "model_saved",
            job_id = %self.job_id,
            model = %model,
            location = %location,
            checksum = %checksum,
            "Model and label encoder saved"
        );
    }
}
