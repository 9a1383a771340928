//! Motion classifier library for accelerometer recordings
//!
//! This crate provides the core functionality for:
//! - Dominant-frequency estimation and adaptive windowing
//! - Positional label broadcast and label encoding
//! - Feature extraction and the GRU, RNN, KNN and SVM classifiers
//! - Training and inference orchestration with progress streaming
//! - Recording ingestion, model persistence and observability

pub mod classifier;
pub mod error;
pub mod features;
pub mod ingest;
pub mod labels;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod windowing;

pub use classifier::{ComputeDevice, Model, ModelKind, ModelSpec};
pub use error::{MotionError, Result};
pub use features::{FeatureConfig, FeatureExtractor, StatisticalFeatureExtractor};
pub use labels::{label_for_index, LabelBroadcastScheme, LabelEncoder};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{
    InferenceOrchestrator, InferenceRequest, TrainedModel, TrainingOrchestrator, TrainingRequest,
};
pub use progress::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSender};
pub use store::{FsModelStore, ModelManifest, ModelStore};
pub use windowing::{estimate_dominant_frequency, AdaptiveSegmenter, FrequencyEstimator, WindowSegmenter};
