//! Frequency-adaptive windowing
//!
//! Each raw sample gets its own window length: the dominant frequency of
//! the magnitude channel fixes one period per window, stepping half a
//! period at a time.

mod frequency;
mod segmenter;

pub use frequency::{estimate_dominant_frequency, FrequencyEstimator};
pub use segmenter::{AdaptiveSegmenter, SegmentedSample, WindowParams, WindowSegmenter};

pub(crate) use frequency::{bin_frequency, magnitude_spectrum};
