//! Linear support vector machine, one-vs-rest
//!
//! Each class gets a hinge-loss separator trained with Pegasos sub-gradient
//! sweeps over standardized features. The bias is folded into the weight
//! vector as a constant input.

use super::scaler::Standardizer;
use super::{Classifier, DirectFitModel};
use crate::error::{MotionError, Result};
use crate::models::{EncodedExample, FeatureVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const DEFAULT_LAMBDA: f64 = 1e-2;
const DEFAULT_EPOCHS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    lambda: f64,
    epochs: usize,
    seed: u64,
    scaler: Standardizer,
    /// One weight vector per class, bias last
    weights: Vec<Vec<f64>>,
}

impl LinearSvm {
    pub fn new(seed: u64) -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
            epochs: DEFAULT_EPOCHS,
            seed,
            scaler: Standardizer::default(),
            weights: Vec::new(),
        }
    }

    fn augmented(&self, features: &[f64]) -> Vec<f64> {
        let mut x = self.scaler.transform(features);
        x.push(1.0);
        x
    }

    fn decision(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|w| w.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }
}

impl Classifier for LinearSvm {
    fn predict_one(&self, features: &FeatureVector) -> Result<usize> {
        if self.weights.is_empty() {
            return Err(MotionError::Configuration(
                "SVM has not been fitted".to_string(),
            ));
        }
        if features.len() != self.scaler.dimension() {
            return Err(MotionError::InvalidInput(format!(
                "expected {} features, got {}",
                self.scaler.dimension(),
                features.len()
            )));
        }
        let scores = self.decision(&self.augmented(features.as_slice()));
        let mut best = 0;
        for (c, s) in scores.iter().enumerate() {
            if *s > scores[best] {
                best = c;
            }
        }
        Ok(best)
    }
}

impl DirectFitModel for LinearSvm {
    fn fit(&mut self, training: &[EncodedExample]) -> Result<()> {
        if training.is_empty() {
            return Err(MotionError::InsufficientData(
                "SVM needs at least one training example".to_string(),
            ));
        }
        self.scaler = Standardizer::fit(training);
        let inputs: Vec<Vec<f64>> = training
            .iter()
            .map(|e| self.augmented(e.features.as_slice()))
            .collect();
        let num_classes = training.iter().map(|e| e.class).max().unwrap_or(0) + 1;
        let dim = inputs[0].len();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..training.len()).collect();
        let mut weights = vec![vec![0.0; dim]; num_classes];
        let mut t = 1.0;

        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let eta = 1.0 / (self.lambda * t);
                let x = &inputs[i];
                for (c, w) in weights.iter_mut().enumerate() {
                    let y = if training[i].class == c { 1.0 } else { -1.0 };
                    let margin: f64 = y * w.iter().zip(x).map(|(a, b)| a * b).sum::<f64>();
                    for wj in w.iter_mut() {
                        *wj *= 1.0 - eta * self.lambda;
                    }
                    if margin < 1.0 {
                        for (wj, xj) in w.iter_mut().zip(x) {
                            *wj += eta * y * xj;
                        }
                    }
                }
                t += 1.0;
            }
        }

        self.weights = weights;
        Ok(())
    }
}
