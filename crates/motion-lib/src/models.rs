//! Core data models for the motion pipeline

use serde::{Deserialize, Serialize};

/// Fixed acquisition rate of every recording
pub const SAMPLING_RATE_HZ: f64 = 100.0;

/// Upper edge of the band searched for the dominant frequency
pub const BAND_LIMIT_HZ: f64 = 10.0;

/// One accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccelRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub magnitude: f64,
}

impl AccelRecord {
    pub fn new(x: f64, y: f64, z: f64, magnitude: f64) -> Self {
        Self { x, y, z, magnitude }
    }

    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::X => self.x,
            Channel::Y => self.y,
            Channel::Z => self.z,
            Channel::Magnitude => self.magnitude,
        }
    }
}

/// Signal channels carried by each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    X,
    Y,
    Z,
    Magnitude,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::X, Channel::Y, Channel::Z, Channel::Magnitude];
}

/// One recorded multi-channel acceleration time series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    records: Vec<AccelRecord>,
}

impl RawSample {
    pub fn new(records: Vec<AccelRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AccelRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Extract a single channel as a contiguous signal
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.records.iter().map(|r| r.channel(channel)).collect()
    }
}

impl From<Vec<AccelRecord>> for RawSample {
    fn from(records: Vec<AccelRecord>) -> Self {
        Self::new(records)
    }
}

/// Ordered class labels, one per contiguous block of raw samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Contiguous, full-length slice of one raw sample
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// Offset of the first record within the source sample
    pub start: usize,
    pub records: &'a [AccelRecord],
}

impl<'a> Window<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.records.iter().map(|r| r.channel(channel)).collect()
    }
}

/// Fixed-length numeric description of one window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Feature vector paired with its broadcast label
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: String,
}

/// Encoded example handed to the classifiers
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedExample {
    pub features: FeatureVector,
    pub class: usize,
}
