//! Per-feature standardization fitted on the training partition

use crate::models::EncodedExample;
use serde::{Deserialize, Serialize};

/// Features whose spread falls below this are passed through centred only
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    pub fn fit(examples: &[EncodedExample]) -> Self {
        let dim = match examples.first() {
            Some(e) => e.features.len(),
            None => return Self::default(),
        };
        let n = examples.len() as f64;

        let mut mean = vec![0.0; dim];
        for e in examples {
            for (m, v) in mean.iter_mut().zip(e.features.as_slice()) {
                *m += v / n;
            }
        }

        let mut var = vec![0.0; dim];
        for e in examples {
            for ((s, v), m) in var.iter_mut().zip(e.features.as_slice()).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }

        let scale = var
            .into_iter()
            .map(|v| if v.sqrt() < MIN_SCALE { 1.0 } else { v.sqrt() })
            .collect();

        Self { mean, scale }
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        if self.mean.is_empty() {
            return features.to_vec();
        }
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}
