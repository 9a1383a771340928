//! Training orchestration
//!
//! Turns a labeled raw sample set into a fitted model and label encoder:
//! adaptive windowing, feature extraction, label broadcast, a seeded
//! train/validation split, then either an epoch loop or a single fit
//! depending on the protocol the model exposes.

use super::split::{train_validation_split, DEFAULT_SPLIT_SEED};
use crate::classifier::{ComputeDevice, Model, ModelParams, ModelSpec, Protocol};
use crate::error::{MotionError, Result};
use crate::features::{FeatureConfig, FeatureExtractor, StatisticalFeatureExtractor};
use crate::labels::{LabelBroadcastScheme, LabelEncoder};
use crate::models::{EncodedExample, LabelSet, RawSample, TrainingExample};
use crate::observability::{JobKind, PipelineMetrics, StructuredLogger};
use crate::progress::{progress_channel, ProgressReceiver, ProgressSender};
use crate::windowing::AdaptiveSegmenter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Epoch interval between progress messages of iterative models
pub const PROGRESS_EVERY_EPOCHS: usize = 10;

/// One training job
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub job_id: String,
    pub samples: Vec<RawSample>,
    pub labels: LabelSet,
    pub samples_per_label: usize,
    pub model: ModelSpec,
    pub features: FeatureConfig,
}

impl TrainingRequest {
    /// Boundary checks, run before any job starts
    pub fn validate(&self) -> Result<LabelBroadcastScheme> {
        self.model.validate()?;
        self.features.validate()?;
        LabelBroadcastScheme::new(
            self.labels.clone(),
            self.samples_per_label,
            self.samples.len(),
        )
    }
}

/// Output of a successful training job
#[derive(Debug)]
pub struct TrainedModel {
    pub model: Model,
    pub encoder: LabelEncoder,
    pub features: FeatureConfig,
}

pub struct TrainingOrchestrator {
    segmenter: AdaptiveSegmenter,
    extractor: Arc<dyn FeatureExtractor>,
    device: ComputeDevice,
    split_seed: u64,
    metrics: PipelineMetrics,
}

impl Default for TrainingOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingOrchestrator {
    pub fn new() -> Self {
        Self {
            segmenter: AdaptiveSegmenter::default(),
            extractor: Arc::new(StatisticalFeatureExtractor::default()),
            device: ComputeDevice::Cpu,
            split_seed: DEFAULT_SPLIT_SEED,
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

    pub fn with_device(mut self, device: ComputeDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Run a training job to completion on the current thread
    ///
    /// The sentinel is always pushed onto `progress` before returning. A
    /// failure is reported as one `error: ...` message ahead of it.
    pub fn train(&self, request: &TrainingRequest, progress: ProgressSender) -> Result<TrainedModel> {
        self.train_checked(request, request.validate(), progress)
    }

    fn train_checked(
        &self,
        request: &TrainingRequest,
        scheme: Result<LabelBroadcastScheme>,
        progress: ProgressSender,
    ) -> Result<TrainedModel> {
        let logger = StructuredLogger::new(&request.job_id);
        let started = Instant::now();
        self.metrics.inc_jobs_started(JobKind::Training);

        let result = scheme.and_then(|scheme| self.run(request, scheme, &progress, &logger));
        match &result {
            Ok(trained) => {
                self.metrics
                    .observe_training_latency(started.elapsed().as_secs_f64());
                info!(
                    job_id = %request.job_id,
                    classes = trained.encoder.num_classes(),
                    "Model fitted"
                );
            }
            Err(e) => {
                self.metrics.inc_jobs_failed(JobKind::Training);
                logger.log_training_failed(&request.model.kind.to_string(), &e.to_string());
                progress.send(format!("error: {}", e));
            }
        }
        progress.finish();
        result
    }

    /// Validate synchronously, then train on a dedicated blocking task
    pub fn spawn_training(
        self: Arc<Self>,
        request: TrainingRequest,
    ) -> Result<(ProgressReceiver, JoinHandle<Result<TrainedModel>>)> {
        let scheme = request.validate()?;
        let (tx, rx) = progress_channel();
        let handle =
            tokio::task::spawn_blocking(move || self.train_checked(&request, Ok(scheme), tx));
        Ok((rx, handle))
    }

    fn run(
        &self,
        request: &TrainingRequest,
        scheme: LabelBroadcastScheme,
        progress: &ProgressSender,
        logger: &StructuredLogger,
    ) -> Result<TrainedModel> {
        let started = Instant::now();
        let kind = request.model.kind;
        logger.log_training_started(&kind.to_string(), request.samples.len(), scheme.labels().len());

        let examples = self.assemble_examples(&scheme, &request.samples, &request.features)?;
        self.metrics
            .add_examples_assembled(&kind.to_string(), examples.len());

        let encoder = LabelEncoder::fit(examples.iter().map(|e| e.label.as_str()))?;
        let encoded = examples
            .into_iter()
            .map(|e| {
                Ok(EncodedExample {
                    class: encoder.encode(&e.label)?,
                    features: e.features,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (mut train, validation) =
            train_validation_split(&encoded, request.model.validation_fraction, self.split_seed)?;

        let input_dim = self.extractor.dimension(&request.features);
        let mut model = request.model.build(
            input_dim,
            encoder.num_classes(),
            self.device,
            self.split_seed,
        )?;

        match (model.protocol_mut(), request.model.params) {
            (Protocol::Iterative(m), ModelParams::Iterative(params)) => {
                m.prepare(&train)?;
                let mut rng = StdRng::seed_from_u64(self.split_seed);
                for epoch in 0..params.epochs {
                    train.shuffle(&mut rng);
                    let mut train_loss = 0.0;
                    for batch in train.chunks(params.batch_size) {
                        train_loss = m.train_step(batch)?;
                    }

                    let mut val_total = 0.0;
                    let mut val_batches = 0usize;
                    for batch in validation.chunks(params.batch_size) {
                        val_total += m.evaluate(batch)?;
                        val_batches += 1;
                    }
                    let val_loss = val_total / val_batches.max(1) as f64;

                    debug!(epoch = epoch + 1, train_loss, val_loss, "Epoch finished");
                    if (epoch + 1) % PROGRESS_EVERY_EPOCHS == 0 {
                        progress.send(format!(
                            "Epoch [{}/{}], Training Loss: {:.4}, Validation Loss: {:.4}",
                            epoch + 1,
                            params.epochs,
                            train_loss,
                            val_loss
                        ));
                    }
                }
            }
            (Protocol::DirectFit(m), ModelParams::DirectFit(_)) => {
                m.fit(&train)?;
                let accuracy = m.score(&validation)?;
                progress.send(format!("{} accuracy: {:.2}%", kind, accuracy * 100.0));
            }
            _ => {
                return Err(MotionError::Configuration(format!(
                    "parameters do not match model kind {}",
                    kind
                )))
            }
        }

        logger.log_training_completed(
            &kind.to_string(),
            train.len(),
            validation.len(),
            started.elapsed().as_secs_f64(),
        );

        Ok(TrainedModel {
            model,
            encoder,
            features: request.features,
        })
    }

    /// Window every sample, extract features and attach the broadcast label
    ///
    /// Samples too short for a single window are skipped with a warning.
    pub fn assemble_examples(
        &self,
        scheme: &LabelBroadcastScheme,
        samples: &[RawSample],
        features: &FeatureConfig,
    ) -> Result<Vec<TrainingExample>> {
        let mut examples = Vec::new();
        let mut skipped = 0usize;

        for (index, sample) in samples.iter().enumerate() {
            let label = scheme.label_for(index)?;
            let segmented = match self.segmenter.segment(index, sample) {
                Ok(segmented) => segmented,
                Err(e @ MotionError::EmptyWindowSet { .. }) => {
                    warn!(sample = index, error = %e, "Skipping sample without a full window");
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.metrics
                .add_windows_extracted(JobKind::Training, segmented.windows.len());
            for window in &segmented.windows {
                examples.push(TrainingExample {
                    features: self.extractor.extract(window, features),
                    label: label.to_string(),
                });
            }
        }

        if examples.is_empty() {
            return Err(MotionError::InsufficientData(format!(
                "no full-length windows in {} samples",
                samples.len()
            )));
        }

        debug!(
            examples = examples.len(),
            skipped_samples = skipped,
            "Assembled training examples"
        );
        Ok(examples)
    }
}
