//! Trainable motion classifiers
//!
//! Four named model kinds reduce to two fitting protocols:
//! - [`IterativeModel`]: epoch-stepped training with loss introspection (GRU, RNN)
//! - [`DirectFitModel`]: one fit call followed by an accuracy score (KNN, SVM)
//!
//! The training orchestrator only ever sees a [`Protocol`], never a kind name.

pub mod knn;
pub mod recurrent;
pub mod scaler;
pub mod svm;

pub use knn::KnnClassifier;
pub use recurrent::{CellKind, RecurrentClassifier, DEFAULT_NUM_LAYERS};
pub use scaler::Standardizer;
pub use svm::LinearSvm;

use crate::error::{MotionError, Result};
use crate::models::{EncodedExample, FeatureVector};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Hidden width of the recurrent cells
pub const DEFAULT_HIDDEN_SIZE: usize = 64;

/// Single-example prediction shared by every model
pub trait Classifier: Send + Sync {
    fn predict_one(&self, features: &FeatureVector) -> Result<usize>;
}

/// Epoch-stepped model with a differentiable loss
pub trait IterativeModel: Classifier {
    /// Called once with the full training partition before the first epoch
    fn prepare(&mut self, _training: &[EncodedExample]) -> Result<()> {
        Ok(())
    }

    /// One optimizer step over a mini-batch, returns the batch mean loss
    fn train_step(&mut self, batch: &[EncodedExample]) -> Result<f64>;

    /// Mean loss over the given examples without updating parameters
    fn evaluate(&self, examples: &[EncodedExample]) -> Result<f64>;
}

/// Model fitted by a single call
pub trait DirectFitModel: Classifier {
    fn fit(&mut self, training: &[EncodedExample]) -> Result<()>;

    /// Fraction of examples predicted correctly
    fn score(&self, examples: &[EncodedExample]) -> Result<f64> {
        if examples.is_empty() {
            return Err(MotionError::InsufficientData(
                "no examples to score".to_string(),
            ));
        }
        let mut correct = 0usize;
        for e in examples {
            if self.predict_one(&e.features)? == e.class {
                correct += 1;
            }
        }
        Ok(correct as f64 / examples.len() as f64)
    }
}

/// Fitting protocol exposed by a model
pub enum Protocol<'a> {
    Iterative(&'a mut dyn IterativeModel),
    DirectFit(&'a mut dyn DirectFitModel),
}

/// Protocol family of a model kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Iterative,
    DirectFit,
}

/// Named model kinds accepted from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    Gru,
    Rnn,
    Knn,
    Svm,
}

impl ModelKind {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelKind::Gru | ModelKind::Rnn => ModelFamily::Iterative,
            ModelKind::Knn | ModelKind::Svm => ModelFamily::DirectFit,
        }
    }

    /// Number of positional parameters this kind expects
    pub fn param_count(&self) -> usize {
        match self.family() {
            ModelFamily::Iterative => 4,
            ModelFamily::DirectFit => 2,
        }
    }
}

impl FromStr for ModelKind {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GRU" => Ok(ModelKind::Gru),
            "RNN" => Ok(ModelKind::Rnn),
            "KNN" => Ok(ModelKind::Knn),
            "SVM" => Ok(ModelKind::Svm),
            other => Err(MotionError::Configuration(format!(
                "unknown model kind '{}', expected one of GRU, RNN, KNN, SVM",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Gru => "GRU",
            ModelKind::Rnn => "RNN",
            ModelKind::Knn => "KNN",
            ModelKind::Svm => "SVM",
        };
        f.write_str(name)
    }
}

/// Device the model computes on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Accelerator,
}

impl ComputeDevice {
    /// Candle device for this selection
    ///
    /// An accelerator request tries CUDA, then Metal, and runs on the CPU
    /// when this build or host offers neither.
    pub fn to_candle(self) -> Device {
        match self {
            ComputeDevice::Cpu => Device::Cpu,
            ComputeDevice::Accelerator => {
                match Device::new_cuda(0).or_else(|_| Device::new_metal(0)) {
                    Ok(device) => device,
                    Err(e) => {
                        warn!(
                            requested = "accelerator",
                            error = %e,
                            "No accelerator backend available, falling back to CPU"
                        );
                        Device::Cpu
                    }
                }
            }
        }
    }
}

impl FromStr for ComputeDevice {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ComputeDevice::Cpu),
            "accelerator" | "cuda" | "gpu" => Ok(ComputeDevice::Accelerator),
            other => Err(MotionError::Configuration(format!(
                "unknown compute device '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterativeParams {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectFitParams {
    pub n_neighbors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModelParams {
    Iterative(IterativeParams),
    DirectFit(DirectFitParams),
}

/// Everything needed to build an untrained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// Fraction of examples held out for validation, in (0, 1)
    pub validation_fraction: f64,
    pub params: ModelParams,
}

impl ModelSpec {
    pub fn new(kind: ModelKind, validation_fraction: f64, params: ModelParams) -> Result<Self> {
        let spec = Self {
            kind,
            validation_fraction,
            params,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Parse positional parameters
    ///
    /// Iterative kinds take `[validation_fraction, batch_size, learning_rate, epochs]`,
    /// direct-fit kinds take `[validation_fraction, n_neighbors]`.
    pub fn from_values(kind: ModelKind, values: &[f64]) -> Result<Self> {
        if values.len() != kind.param_count() {
            return Err(MotionError::Configuration(format!(
                "{} expects {} parameters, got {}",
                kind,
                kind.param_count(),
                values.len()
            )));
        }
        let params = match kind.family() {
            ModelFamily::Iterative => ModelParams::Iterative(IterativeParams {
                batch_size: positive_integer("batch_size", values[1])?,
                learning_rate: values[2],
                epochs: positive_integer("epochs", values[3])?,
                hidden_size: DEFAULT_HIDDEN_SIZE,
                num_layers: DEFAULT_NUM_LAYERS,
            }),
            ModelFamily::DirectFit => ModelParams::DirectFit(DirectFitParams {
                n_neighbors: positive_integer("n_neighbors", values[1])?,
            }),
        };
        Self::new(kind, values[0], params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(MotionError::Configuration(format!(
                "validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        match (self.kind.family(), &self.params) {
            (ModelFamily::Iterative, ModelParams::Iterative(p)) => {
                if p.batch_size == 0 || p.epochs == 0 || p.hidden_size == 0 || p.num_layers == 0 {
                    return Err(MotionError::Configuration(
                        "batch_size, epochs, hidden_size and num_layers must be positive"
                            .to_string(),
                    ));
                }
                if !(p.learning_rate.is_finite() && p.learning_rate > 0.0) {
                    return Err(MotionError::Configuration(format!(
                        "learning rate must be positive, got {}",
                        p.learning_rate
                    )));
                }
                Ok(())
            }
            (ModelFamily::DirectFit, ModelParams::DirectFit(p)) => {
                if p.n_neighbors == 0 {
                    return Err(MotionError::Configuration(
                        "n_neighbors must be positive".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Err(MotionError::Configuration(format!(
                "parameters do not match model kind {}",
                self.kind
            ))),
        }
    }

    /// Build an untrained model for the given feature width and class count
    pub fn build(
        &self,
        input_dim: usize,
        num_classes: usize,
        device: ComputeDevice,
        seed: u64,
    ) -> Result<Model> {
        self.validate()?;
        if self.kind.family() == ModelFamily::DirectFit && device != ComputeDevice::Cpu {
            debug!(kind = %self.kind, "Direct-fit models always run on the CPU");
        }
        let model = match (self.kind, self.params) {
            (ModelKind::Gru | ModelKind::Rnn, ModelParams::Iterative(p)) => {
                let cell = if self.kind == ModelKind::Gru {
                    CellKind::Gated
                } else {
                    CellKind::Elman
                };
                Model::Recurrent(RecurrentClassifier::new(
                    cell,
                    input_dim,
                    p.hidden_size,
                    p.num_layers,
                    num_classes,
                    p.learning_rate,
                    device,
                    seed,
                )?)
            }
            (ModelKind::Knn, ModelParams::DirectFit(p)) => {
                Model::Knn(KnnClassifier::new(p.n_neighbors))
            }
            (ModelKind::Svm, ModelParams::DirectFit(_)) => Model::Svm(LinearSvm::new(seed)),
            (kind, _) => {
                return Err(MotionError::Configuration(format!(
                    "parameters do not match model kind {}",
                    kind
                )))
            }
        };
        Ok(model)
    }
}

fn positive_integer(name: &str, value: f64) -> Result<usize> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(MotionError::Configuration(format!(
            "{} must be a positive integer, got {}",
            name, value
        )));
    }
    Ok(value as usize)
}

/// Fitted or unfitted model of any kind
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Recurrent(RecurrentClassifier),
    Knn(KnnClassifier),
    Svm(LinearSvm),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Recurrent(m) => match m.cell() {
                CellKind::Gated => ModelKind::Gru,
                CellKind::Elman => ModelKind::Rnn,
            },
            Model::Knn(_) => ModelKind::Knn,
            Model::Svm(_) => ModelKind::Svm,
        }
    }

    pub fn protocol_mut(&mut self) -> Protocol<'_> {
        match self {
            Model::Recurrent(m) => Protocol::Iterative(m),
            Model::Knn(m) => Protocol::DirectFit(m),
            Model::Svm(m) => Protocol::DirectFit(m),
        }
    }
}

impl Classifier for Model {
    fn predict_one(&self, features: &FeatureVector) -> Result<usize> {
        match self {
            Model::Recurrent(m) => m.predict_one(features),
            Model::Knn(m) => m.predict_one(features),
            Model::Svm(m) => m.predict_one(features),
        }
    }
}
