//! Error taxonomy for the motion pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionError {
    /// Unknown model kind or malformed model parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable training examples could be assembled
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Dominant frequency is zero or not finite, so no window length can be derived
    #[error("undefined window: dominant frequency {frequency} Hz")]
    UndefinedWindow { frequency: f64 },

    /// A recording produced no full-length window
    #[error("sample {index} yields no full window ({len} records, window of {window} records)")]
    EmptyWindowSet {
        index: usize,
        len: usize,
        window: usize,
    },

    /// Model or label encoder missing or unreadable
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, MotionError>;

impl From<serde_json::Error> for MotionError {
    fn from(e: serde_json::Error) -> Self {
        MotionError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for MotionError {
    fn from(e: csv::Error) -> Self {
        MotionError::InvalidInput(format!("malformed CSV: {}", e))
    }
}

impl From<ndarray_npy::ReadNpyError> for MotionError {
    fn from(e: ndarray_npy::ReadNpyError) -> Self {
        MotionError::InvalidInput(format!("malformed NPY array: {}", e))
    }
}
