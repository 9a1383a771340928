//! Feature extraction from windows
//!
//! The pipeline only relies on the `FeatureExtractor` contract: a pure,
//! deterministic mapping from one window to a fixed-length vector. The
//! built-in extractor computes per-channel statistics selected by a bit
//! mask plus the strongest spectral peaks of each channel.

use crate::error::{MotionError, Result};
use crate::models::{Channel, FeatureVector, Window, SAMPLING_RATE_HZ};
use crate::windowing::{bin_frequency, magnitude_spectrum};
use serde::{Deserialize, Serialize};

/// Statistic mask used when none is configured
pub const DEFAULT_STAT_VARIABLE: u32 = 103;

/// Spectral peaks per channel used when none is configured
pub const DEFAULT_FFT_VARIABLE: u32 = 1;

/// Upper bound on spectral peaks per channel
pub const MAX_FFT_VARIABLE: u32 = 16;

/// Selection of features to compute for each window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Bit mask over [`Statistic`]
    pub stat_variable: u32,
    /// Number of spectral peaks per channel
    pub fft_variable: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            stat_variable: DEFAULT_STAT_VARIABLE,
            fft_variable: DEFAULT_FFT_VARIABLE,
        }
    }
}

impl FeatureConfig {
    pub fn new(stat_variable: u32, fft_variable: u32) -> Self {
        Self {
            stat_variable,
            fft_variable,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let known = Statistic::ALL.iter().fold(0u32, |acc, s| acc | s.bit());
        if self.stat_variable & !known != 0 {
            return Err(MotionError::Configuration(format!(
                "stat_variable {:#b} sets unknown statistic bits (known mask {:#b})",
                self.stat_variable, known
            )));
        }
        if self.fft_variable > MAX_FFT_VARIABLE {
            return Err(MotionError::Configuration(format!(
                "fft_variable {} exceeds {}",
                self.fft_variable, MAX_FFT_VARIABLE
            )));
        }
        if self.stat_variable == 0 && self.fft_variable == 0 {
            return Err(MotionError::Configuration(
                "feature selection is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Statistics selected by the mask, in bit order
    pub fn statistics(&self) -> impl Iterator<Item = Statistic> + '_ {
        Statistic::ALL
            .into_iter()
            .filter(move |s| self.stat_variable & s.bit() != 0)
    }
}

/// Per-channel summary statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    StdDev,
    Min,
    Max,
    Median,
    Rms,
    Slope,
    Range,
}

impl Statistic {
    pub const ALL: [Statistic; 8] = [
        Statistic::Mean,
        Statistic::StdDev,
        Statistic::Min,
        Statistic::Max,
        Statistic::Median,
        Statistic::Rms,
        Statistic::Slope,
        Statistic::Range,
    ];

    pub fn bit(&self) -> u32 {
        1 << (*self as u32)
    }

    fn read(&self, summary: &ChannelSummary) -> f64 {
        match self {
            Statistic::Mean => summary.mean,
            Statistic::StdDev => summary.std_dev,
            Statistic::Min => summary.min,
            Statistic::Max => summary.max,
            Statistic::Median => summary.median,
            Statistic::Rms => summary.rms,
            Statistic::Slope => summary.slope,
            Statistic::Range => summary.max - summary.min,
        }
    }
}

/// Every statistic of one channel inside one window
///
/// An empty channel summarizes to all zeros. Spread and slope stay zero
/// below two samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ChannelSummary {
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
    median: f64,
    rms: f64,
    /// Change per sample, least squares over the sample index
    slope: f64,
}

impl ChannelSummary {
    fn of(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::default();
        }
        let len = n as f64;

        let (sum, sum_sq, min, max) = values.iter().fold(
            (0.0, 0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, sum_sq, min, max), &v| (sum + v, sum_sq + v * v, min.min(v), max.max(v)),
        );
        let mean = sum / len;

        // Index centre of the window; x deviations are symmetric around it
        let centre = (len - 1.0) / 2.0;
        let (spread, co_moment, index_spread) =
            values
                .iter()
                .enumerate()
                .fold((0.0, 0.0, 0.0), |(spread, co, idx), (i, &v)| {
                    let dx = i as f64 - centre;
                    let dy = v - mean;
                    (spread + dy * dy, co + dx * dy, idx + dx * dx)
                });

        let mut ordered = values.to_vec();
        ordered.sort_by(f64::total_cmp);
        let median = if n % 2 == 1 {
            ordered[n / 2]
        } else {
            (ordered[n / 2 - 1] + ordered[n / 2]) / 2.0
        };

        Self {
            mean,
            std_dev: if n > 1 { (spread / (len - 1.0)).sqrt() } else { 0.0 },
            min,
            max,
            median,
            rms: (sum_sq / len).sqrt(),
            slope: if index_spread > 0.0 { co_moment / index_spread } else { 0.0 },
        }
    }
}

/// Maps one window to a fixed-length feature vector
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector produced under `config`
    fn dimension(&self, config: &FeatureConfig) -> usize;

    /// Must be a deterministic function of its inputs
    fn extract(&self, window: &Window<'_>, config: &FeatureConfig) -> FeatureVector;
}

/// Statistics and spectral peaks over the x, y, z and magnitude channels
#[derive(Debug, Clone, Copy)]
pub struct StatisticalFeatureExtractor {
    sampling_rate: f64,
}

impl Default for StatisticalFeatureExtractor {
    fn default() -> Self {
        Self::new(SAMPLING_RATE_HZ)
    }
}

impl StatisticalFeatureExtractor {
    pub fn new(sampling_rate: f64) -> Self {
        Self { sampling_rate }
    }

    /// Strongest non-DC bins as (frequency Hz, magnitude / len), zero padded
    fn spectral_peaks(&self, values: &[f64], count: usize, out: &mut Vec<f64>) {
        let n = values.len();
        let mut bins: Vec<(f64, f64)> = if n < 2 {
            Vec::new()
        } else {
            magnitude_spectrum(values)
                .into_iter()
                .enumerate()
                .take(n.div_ceil(2))
                .skip(1)
                .map(|(k, amp)| (bin_frequency(k, n, self.sampling_rate), amp / n as f64))
                .collect()
        };
        // Stable sort keeps lower bins first among equal magnitudes
        bins.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for i in 0..count {
            let (freq, amp) = bins.get(i).copied().unwrap_or((0.0, 0.0));
            out.push(freq);
            out.push(amp);
        }
    }
}

impl FeatureExtractor for StatisticalFeatureExtractor {
    fn dimension(&self, config: &FeatureConfig) -> usize {
        let per_channel = config.statistics().count() + 2 * config.fft_variable as usize;
        per_channel * Channel::ALL.len()
    }

    fn extract(&self, window: &Window<'_>, config: &FeatureConfig) -> FeatureVector {
        let mut features = Vec::with_capacity(self.dimension(config));
        for channel in Channel::ALL {
            let values = window.channel(channel);
            let summary = ChannelSummary::of(&values);
            features.extend(config.statistics().map(|s| s.read(&summary)));
            self.spectral_peaks(&values, config.fft_variable as usize, &mut features);
        }
        FeatureVector(features)
    }
}
