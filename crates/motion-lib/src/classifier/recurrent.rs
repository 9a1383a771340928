//! Recurrent classifiers trained epoch by epoch
//!
//! Each feature vector is one time step pushed through a stack of recurrent
//! layers from a zero state; the top hidden state feeds a linear head.
//! Gated layers are `candle_nn::rnn::GRU`, Elman layers are a tanh cell over
//! an input and a recurrent linear map. Training minimizes cross-entropy
//! with Adam on the device picked by [`ComputeDevice`].

use super::scaler::Standardizer;
use super::{Classifier, ComputeDevice, IterativeModel};
use crate::error::{MotionError, Result};
use crate::models::{EncodedExample, FeatureVector};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::rnn::{gru, GRUConfig, GRU, RNN};
use candle_nn::{linear, AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Stacked recurrent layers per model
pub const DEFAULT_NUM_LAYERS: usize = 2;

/// Recurrent cell flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Elman,
    Gated,
}

/// Elman layer: `h' = tanh(W_ih x + b_ih + W_hh h + b_hh)`
#[derive(Debug, Clone)]
struct ElmanLayer {
    input: Linear,
    recurrent: Linear,
    hidden_size: usize,
}

impl ElmanLayer {
    fn new(in_dim: usize, hidden_size: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            input: linear(in_dim, hidden_size, vb.pp("ih"))?,
            recurrent: linear(hidden_size, hidden_size, vb.pp("hh"))?,
            hidden_size,
        })
    }

    fn step(&self, xs: &Tensor, h: &Tensor) -> candle_core::Result<Tensor> {
        (self.input.forward(xs)? + self.recurrent.forward(h)?)?.tanh()
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Gated(GRU),
    Elman(ElmanLayer),
}

impl Layer {
    /// One step from a zero state, returns the new hidden state
    fn step_from_zero(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let batch = xs.dim(0)?;
        match self {
            Layer::Gated(cell) => {
                let state = cell.zero_state(batch)?;
                Ok(cell.step(xs, &state)?.h().clone())
            }
            Layer::Elman(cell) => {
                let h = Tensor::zeros((batch, cell.hidden_size), xs.dtype(), xs.device())?;
                cell.step(xs, &h)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Network {
    layers: Vec<Layer>,
    head: Linear,
}

impl Network {
    fn new(
        cell: CellKind,
        input_dim: usize,
        hidden_size: usize,
        num_layers: usize,
        num_classes: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(num_layers);
        for l in 0..num_layers {
            let in_dim = if l == 0 { input_dim } else { hidden_size };
            let vb = vb.pp(format!("layer{}", l));
            layers.push(match cell {
                CellKind::Gated => Layer::Gated(gru(in_dim, hidden_size, GRUConfig::default(), vb)?),
                CellKind::Elman => Layer::Elman(ElmanLayer::new(in_dim, hidden_size, vb)?),
            });
        }
        let head = linear(hidden_size, num_classes, vb.pp("head"))?;
        Ok(Self { layers, head })
    }
}

impl Module for Network {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = xs.clone();
        for layer in &self.layers {
            h = layer.step_from_zero(&h)?;
        }
        self.head.forward(&h)
    }
}

/// Flattened parameter as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

/// Serialized form of a recurrent classifier; optimizer state is not kept
#[derive(Debug, Serialize, Deserialize)]
struct RecurrentSnapshot {
    cell: CellKind,
    input_dim: usize,
    hidden_size: usize,
    num_layers: usize,
    num_classes: usize,
    learning_rate: f64,
    device: ComputeDevice,
    scaler: Standardizer,
    weights: BTreeMap<String, StoredTensor>,
}

pub struct RecurrentClassifier {
    cell: CellKind,
    input_dim: usize,
    hidden_size: usize,
    num_layers: usize,
    num_classes: usize,
    learning_rate: f64,
    requested_device: ComputeDevice,
    device: Device,
    scaler: Standardizer,
    varmap: VarMap,
    network: Network,
    optimizer: AdamW,
}

impl RecurrentClassifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cell: CellKind,
        input_dim: usize,
        hidden_size: usize,
        num_layers: usize,
        num_classes: usize,
        learning_rate: f64,
        device: ComputeDevice,
        seed: u64,
    ) -> Result<Self> {
        let model = Self::assemble(
            cell,
            input_dim,
            hidden_size,
            num_layers,
            num_classes,
            learning_rate,
            device,
        )?;
        model.seed_parameters(seed)?;
        Ok(model)
    }

    fn assemble(
        cell: CellKind,
        input_dim: usize,
        hidden_size: usize,
        num_layers: usize,
        num_classes: usize,
        learning_rate: f64,
        requested_device: ComputeDevice,
    ) -> Result<Self> {
        if input_dim == 0 || hidden_size == 0 || num_layers == 0 || num_classes == 0 {
            return Err(MotionError::Configuration(format!(
                "recurrent model needs positive sizes, got input {} hidden {} layers {} classes {}",
                input_dim, hidden_size, num_layers, num_classes
            )));
        }
        let device = requested_device.to_candle();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = Network::new(cell, input_dim, hidden_size, num_layers, num_classes, vb)?;
        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        Ok(Self {
            cell,
            input_dim,
            hidden_size,
            num_layers,
            num_classes,
            learning_rate,
            requested_device,
            device,
            scaler: Standardizer::default(),
            varmap,
            network,
            optimizer,
        })
    }

    /// Uniform init in `±1/sqrt(hidden)`, visited in name order so a seed
    /// always yields the same weights
    fn seed_parameters(&self, seed: u64) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (self.hidden_size as f64).sqrt();
        let vars = self.varmap.data().lock().map_err(|_| {
            MotionError::Configuration("parameter map lock poisoned".to_string())
        })?;
        let mut names: Vec<&String> = vars.keys().collect();
        names.sort();
        for name in names {
            let var = &vars[name];
            let values: Vec<f32> = (0..var.elem_count())
                .map(|_| rng.gen_range(-bound..=bound) as f32)
                .collect();
            var.set(&Tensor::from_vec(values, var.dims().to_vec(), &self.device)?)?;
        }
        Ok(())
    }

    pub fn cell(&self) -> CellKind {
        self.cell
    }

    fn check_input(&self, features: &FeatureVector) -> Result<()> {
        if features.len() != self.input_dim {
            return Err(MotionError::InvalidInput(format!(
                "expected {} features, got {}",
                self.input_dim,
                features.len()
            )));
        }
        Ok(())
    }

    fn check_class(&self, class: usize) -> Result<()> {
        if class >= self.num_classes {
            return Err(MotionError::InvalidInput(format!(
                "class {} outside 0..{}",
                class, self.num_classes
            )));
        }
        Ok(())
    }

    fn inputs<'a>(&self, features: impl Iterator<Item = &'a FeatureVector>) -> Result<Tensor> {
        let mut flat = Vec::new();
        let mut rows = 0;
        for f in features {
            self.check_input(f)?;
            flat.extend(self.scaler.transform(f.as_slice()).into_iter().map(|v| v as f32));
            rows += 1;
        }
        Ok(Tensor::from_vec(flat, (rows, self.input_dim), &self.device)?)
    }

    fn targets(&self, examples: &[EncodedExample]) -> Result<Tensor> {
        let classes = examples
            .iter()
            .map(|e| {
                self.check_class(e.class)?;
                Ok(e.class as u32)
            })
            .collect::<Result<Vec<u32>>>()?;
        Ok(Tensor::from_vec(classes, examples.len(), &self.device)?)
    }

    fn loss(&self, examples: &[EncodedExample]) -> Result<Tensor> {
        let xs = self.inputs(examples.iter().map(|e| &e.features))?;
        let ys = self.targets(examples)?;
        let logits = self.network.forward(&xs)?;
        Ok(candle_nn::loss::cross_entropy(&logits, &ys)?)
    }

    fn snapshot(&self) -> Result<RecurrentSnapshot> {
        let vars = self.varmap.data().lock().map_err(|_| {
            MotionError::Serialization("parameter map lock poisoned".to_string())
        })?;
        let mut weights = BTreeMap::new();
        for (name, var) in vars.iter() {
            let values = var.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
            weights.insert(
                name.clone(),
                StoredTensor {
                    shape: var.dims().to_vec(),
                    values,
                },
            );
        }
        Ok(RecurrentSnapshot {
            cell: self.cell,
            input_dim: self.input_dim,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            num_classes: self.num_classes,
            learning_rate: self.learning_rate,
            device: self.requested_device,
            scaler: self.scaler.clone(),
            weights,
        })
    }

    fn restore(snapshot: RecurrentSnapshot) -> Result<Self> {
        let mut model = Self::assemble(
            snapshot.cell,
            snapshot.input_dim,
            snapshot.hidden_size,
            snapshot.num_layers,
            snapshot.num_classes,
            snapshot.learning_rate,
            snapshot.device,
        )?;
        model.scaler = snapshot.scaler;
        {
            let vars = model.varmap.data().lock().map_err(|_| {
                MotionError::Serialization("parameter map lock poisoned".to_string())
            })?;
            if vars.len() != snapshot.weights.len() {
                return Err(MotionError::Serialization(format!(
                    "stored model has {} parameters, architecture expects {}",
                    snapshot.weights.len(),
                    vars.len()
                )));
            }
            for (name, var) in vars.iter() {
                let stored = snapshot.weights.get(name).ok_or_else(|| {
                    MotionError::Serialization(format!("stored model lacks parameter '{}'", name))
                })?;
                if stored.shape != var.dims() {
                    return Err(MotionError::Serialization(format!(
                        "parameter '{}' has shape {:?}, expected {:?}",
                        name,
                        stored.shape,
                        var.dims()
                    )));
                }
                let tensor =
                    Tensor::from_vec(stored.values.clone(), stored.shape.clone(), &model.device)?;
                var.set(&tensor)?;
            }
        }
        Ok(model)
    }
}

impl fmt::Debug for RecurrentClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurrentClassifier")
            .field("cell", &self.cell)
            .field("input_dim", &self.input_dim)
            .field("hidden_size", &self.hidden_size)
            .field("num_layers", &self.num_layers)
            .field("num_classes", &self.num_classes)
            .field("device", &self.device)
            .finish()
    }
}

impl Serialize for RecurrentClassifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecurrentClassifier {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
        let snapshot = RecurrentSnapshot::deserialize(deserializer)?;
        Self::restore(snapshot).map_err(De::Error::custom)
    }
}

impl Classifier for RecurrentClassifier {
    fn predict_one(&self, features: &FeatureVector) -> Result<usize> {
        let xs = self.inputs(std::iter::once(features))?;
        let logits = self.network.forward(&xs)?;
        let class = logits.argmax(D::Minus1)?.squeeze(0)?.to_scalar::<u32>()?;
        Ok(class as usize)
    }
}

impl IterativeModel for RecurrentClassifier {
    fn prepare(&mut self, training: &[EncodedExample]) -> Result<()> {
        for e in training {
            self.check_input(&e.features)?;
            self.check_class(e.class)?;
        }
        self.scaler = Standardizer::fit(training);
        Ok(())
    }

    fn train_step(&mut self, batch: &[EncodedExample]) -> Result<f64> {
        if batch.is_empty() {
            return Err(MotionError::InsufficientData("empty mini-batch".to_string()));
        }
        let loss = self.loss(batch)?;
        self.optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()? as f64)
    }

    fn evaluate(&self, examples: &[EncodedExample]) -> Result<f64> {
        if examples.is_empty() {
            return Err(MotionError::InsufficientData(
                "no examples to evaluate".to_string(),
            ));
        }
        Ok(self.loss(examples)?.to_scalar::<f32>()? as f64)
    }
}
