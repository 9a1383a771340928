//! Inference orchestration
//!
//! Windows each test sample exactly as training does, but classifies only
//! the window at the temporal midpoint.

use super::training::TrainedModel;
use crate::classifier::{Classifier, Model};
use crate::error::{MotionError, Result};
use crate::features::{FeatureConfig, FeatureExtractor, StatisticalFeatureExtractor};
use crate::labels::LabelEncoder;
use crate::models::{LabelSet, RawSample};
use crate::observability::{JobKind, PipelineMetrics, StructuredLogger};
use crate::progress::{progress_channel, ProgressReceiver, ProgressSender};
use crate::windowing::AdaptiveSegmenter;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

/// One inference job
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub job_id: String,
    pub samples: Vec<RawSample>,
    /// Labels the caller expects, checked against the fitted encoder
    pub expected_labels: Option<LabelSet>,
}

pub struct InferenceOrchestrator {
    segmenter: AdaptiveSegmenter,
    extractor: Arc<dyn FeatureExtractor>,
    metrics: PipelineMetrics,
}

impl Default for InferenceOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceOrchestrator {
    pub fn new() -> Self {
        Self {
            segmenter: AdaptiveSegmenter::default(),
            extractor: Arc::new(StatisticalFeatureExtractor::default()),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_segmenter(mut self, segmenter: AdaptiveSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Predict one label per sample, in input order
    pub fn predict(
        &self,
        samples: &[RawSample],
        model: &Model,
        encoder: &LabelEncoder,
        features: &FeatureConfig,
    ) -> Result<Vec<String>> {
        samples
            .iter()
            .enumerate()
            .map(|(index, sample)| self.predict_sample(index, sample, model, encoder, features))
            .collect()
    }

    /// Classify the midpoint window of sample `index`
    pub fn predict_sample(
        &self,
        index: usize,
        sample: &RawSample,
        model: &Model,
        encoder: &LabelEncoder,
        features: &FeatureConfig,
    ) -> Result<String> {
        let segmented = self.segmenter.segment(index, sample)?;
        self.metrics
            .add_windows_extracted(JobKind::Inference, segmented.windows.len());

        let window = segmented.midpoint().ok_or(MotionError::EmptyWindowSet {
            index,
            len: sample.len(),
            window: segmented
                .params
                .window_len(self.segmenter.estimator().sampling_rate()),
        })?;
        let vector = self.extractor.extract(window, features);
        let class = model.predict_one(&vector)?;
        let label = encoder.decode(class)?;

        debug!(
            sample = index,
            dominant_frequency = segmented.dominant_frequency,
            window_start = window.start,
            label = %label,
            "Predicted sample"
        );
        Ok(label.to_string())
    }

    /// Validate synchronously, then stream one message per prediction from a blocking task
    pub fn spawn_inference(
        self: Arc<Self>,
        request: InferenceRequest,
        trained: Arc<TrainedModel>,
    ) -> Result<(ProgressReceiver, JoinHandle<Result<Vec<String>>>)> {
        if let Some(labels) = &request.expected_labels {
            trained.encoder.validate_vocabulary(labels)?;
        }
        trained.features.validate()?;

        let (tx, rx) = progress_channel();
        let handle = tokio::task::spawn_blocking(move || self.run(&request, &trained, tx));
        Ok((rx, handle))
    }

    fn run(
        &self,
        request: &InferenceRequest,
        trained: &TrainedModel,
        progress: ProgressSender,
    ) -> Result<Vec<String>> {
        let logger = StructuredLogger::new(&request.job_id);
        let started = Instant::now();
        self.metrics.inc_jobs_started(JobKind::Inference);

        let mut predictions = Vec::with_capacity(request.samples.len());
        for (index, sample) in request.samples.iter().enumerate() {
            match self.predict_sample(
                index,
                sample,
                &trained.model,
                &trained.encoder,
                &trained.features,
            ) {
                Ok(label) => {
                    progress.send(format!("sample {}: predicted {}", index, label));
                    predictions.push(label);
                }
                Err(e) => {
                    self.metrics.inc_jobs_failed(JobKind::Inference);
                    logger.log_inference_failed(&e.to_string());
                    progress.send(format!("error: {}", e));
                    progress.finish();
                    return Err(e);
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_inference_latency(elapsed);
        logger.log_inference_completed(&trained.model.kind().to_string(), predictions.len(), elapsed);
        progress.finish();
        Ok(predictions)
    }
}
