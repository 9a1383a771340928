//! Positional label broadcast and label encoding
//!
//! Raw samples arrive grouped in contiguous blocks of `samples_per_label`,
//! one block per entry of the label set. Every window derived from a sample
//! inherits the label of its block.

use crate::error::{MotionError, Result};
use crate::models::LabelSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Label of raw sample `index` under the block layout
pub fn label_for_index(index: usize, samples_per_label: usize, labels: &LabelSet) -> Option<&str> {
    if samples_per_label == 0 {
        return None;
    }
    labels.get(index / samples_per_label)
}

/// Validated mapping from raw-sample index to class label
#[derive(Debug, Clone)]
pub struct LabelBroadcastScheme {
    labels: LabelSet,
    samples_per_label: usize,
}

impl LabelBroadcastScheme {
    /// Check `sample_count == labels.len() * samples_per_label`
    pub fn new(labels: LabelSet, samples_per_label: usize, sample_count: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(MotionError::InvalidInput("label set is empty".to_string()));
        }
        if samples_per_label == 0 {
            return Err(MotionError::InvalidInput(
                "samples_per_label must be at least 1".to_string(),
            ));
        }
        let expected = labels.len() * samples_per_label;
        if sample_count != expected {
            return Err(MotionError::InvalidInput(format!(
                "expected {} samples ({} labels x {} per label), got {}",
                expected,
                labels.len(),
                samples_per_label,
                sample_count
            )));
        }
        Ok(Self {
            labels,
            samples_per_label,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn sample_count(&self) -> usize {
        self.labels.len() * self.samples_per_label
    }

    pub fn label_for(&self, index: usize) -> Result<&str> {
        label_for_index(index, self.samples_per_label, &self.labels).ok_or_else(|| {
            MotionError::InvalidInput(format!(
                "sample index {} outside {} samples",
                index,
                self.sample_count()
            ))
        })
    }
}

/// Bijection between label strings and dense class codes
///
/// Classes are kept in sorted order, so codes do not depend on the order
/// labels were observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit over the realized label sequence
    pub fn fit<'a, I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: Vec<String> = labels
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if classes.is_empty() {
            return Err(MotionError::InsufficientData(
                "no labels to fit the encoder on".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| MotionError::Configuration(format!("label '{}' unknown to encoder", label)))
    }

    pub fn decode(&self, class: usize) -> Result<&str> {
        self.classes.get(class).map(String::as_str).ok_or_else(|| {
            MotionError::Configuration(format!(
                "class {} outside encoder range 0..{}",
                class,
                self.classes.len()
            ))
        })
    }

    /// Every label of `labels` must be known to this encoder
    pub fn validate_vocabulary(&self, labels: &LabelSet) -> Result<()> {
        let unknown: Vec<&str> = labels.iter().filter(|l| self.encode(l).is_err()).collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(MotionError::Configuration(format!(
                "labels {:?} were not seen during training",
                unknown
            )))
        }
    }
}
