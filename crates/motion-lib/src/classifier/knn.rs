//! k-nearest-neighbour classifier

use super::{Classifier, DirectFitModel};
use crate::error::{MotionError, Result};
use crate::models::{EncodedExample, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Euclidean k-NN with majority vote; ties go to the class of the nearest tied neighbour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    n_neighbors: usize,
    points: Vec<Vec<f64>>,
    classes: Vec<usize>,
}

impl KnnClassifier {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            points: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Indices of the k closest stored points, nearest first
    fn neighbors(&self, query: &[f64]) -> Vec<usize> {
        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d: f64 = p.iter().zip(query).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .collect();
        distances.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        distances
            .into_iter()
            .take(self.n_neighbors)
            .map(|(_, i)| i)
            .collect()
    }
}

impl Classifier for KnnClassifier {
    fn predict_one(&self, features: &FeatureVector) -> Result<usize> {
        let dim = match self.points.first() {
            Some(p) => p.len(),
            None => {
                return Err(MotionError::Configuration(
                    "k-NN classifier has not been fitted".to_string(),
                ))
            }
        };
        if features.len() != dim {
            return Err(MotionError::InvalidInput(format!(
                "expected {} features, got {}",
                dim,
                features.len()
            )));
        }

        let neighbors = self.neighbors(features.as_slice());
        let mut votes: HashMap<usize, usize> = HashMap::new();
        for &i in &neighbors {
            *votes.entry(self.classes[i]).or_insert(0) += 1;
        }
        let best = votes.values().copied().max().unwrap_or(0);

        neighbors
            .iter()
            .map(|&i| self.classes[i])
            .find(|c| votes.get(c).copied() == Some(best))
            .ok_or_else(|| MotionError::Configuration("k-NN vote produced no class".to_string()))
    }
}

impl DirectFitModel for KnnClassifier {
    fn fit(&mut self, training: &[EncodedExample]) -> Result<()> {
        if training.is_empty() {
            return Err(MotionError::InsufficientData(
                "k-NN needs at least one training example".to_string(),
            ));
        }
        self.points = training.iter().map(|e| e.features.0.clone()).collect();
        self.classes = training.iter().map(|e| e.class).collect();
        Ok(())
    }
}
