//! Configuration management for the CLI

use anyhow::{Context, Result};
use motion_lib::features::{DEFAULT_FFT_VARIABLE, DEFAULT_STAT_VARIABLE};
use motion_lib::{
    AdaptiveSegmenter, ComputeDevice, FeatureConfig, FrequencyEstimator, BAND_LIMIT_HZ,
    SAMPLING_RATE_HZ,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given
const DEFAULT_CONFIG_NAME: &str = "motion";

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate_hz: f64,

    /// Upper edge of the dominant-frequency search
    #[serde(default = "default_band_limit")]
    pub band_limit_hz: f64,

    /// Recordings per label in a training directory
    #[serde(default = "default_samples_per_label")]
    pub samples_per_label: usize,

    /// Length of each test segment cut from an uploaded recording
    #[serde(default = "default_recording_seconds")]
    pub recording_seconds: f64,

    /// Held-out fraction used when `--params` is omitted
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    #[serde(default = "default_split_seed")]
    pub split_seed: u64,

    /// Root directory of the model store
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    #[serde(default)]
    pub device: ComputeDevice,

    #[serde(default = "default_stat_variable")]
    pub stat_variable: u32,

    #[serde(default = "default_fft_variable")]
    pub fft_variable: u32,
}

fn default_sampling_rate() -> f64 {
    SAMPLING_RATE_HZ
}

fn default_band_limit() -> f64 {
    BAND_LIMIT_HZ
}

fn default_samples_per_label() -> usize {
    10
}

fn default_recording_seconds() -> f64 {
    3.0
}

fn default_validation_fraction() -> f64 {
    0.2
}

fn default_split_seed() -> u64 {
    42
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_stat_variable() -> u32 {
    DEFAULT_STAT_VARIABLE
}

fn default_fft_variable() -> u32 {
    DEFAULT_FFT_VARIABLE
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: default_sampling_rate(),
            band_limit_hz: default_band_limit(),
            samples_per_label: default_samples_per_label(),
            recording_seconds: default_recording_seconds(),
            validation_fraction: default_validation_fraction(),
            split_seed: default_split_seed(),
            store_dir: default_store_dir(),
            device: ComputeDevice::default(),
            stat_variable: default_stat_variable(),
            fft_variable: default_fft_variable(),
        }
    }
}

impl MotionConfig {
    /// Load from an optional file plus `MOTION_*` environment variables
    ///
    /// Without `path`, `motion.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("MOTION"))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn features(&self) -> FeatureConfig {
        FeatureConfig::new(self.stat_variable, self.fft_variable)
    }

    pub fn segmenter(&self) -> AdaptiveSegmenter {
        AdaptiveSegmenter::new(FrequencyEstimator::new(
            self.sampling_rate_hz,
            self.band_limit_hz,
        ))
    }
}
