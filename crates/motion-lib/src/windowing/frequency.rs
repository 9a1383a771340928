//! Dominant frequency estimation
//!
//! Computes the DFT magnitude of one signal channel, keeps the
//! non-negative bins up to a band limit and picks the strongest one.
//! The zero-frequency bin stays in the candidate set but is never the
//! comparison baseline, so it can never be selected.

use crate::error::{MotionError, Result};
use crate::models::{BAND_LIMIT_HZ, SAMPLING_RATE_HZ};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Estimates the dominant frequency of a signal within a capped band
#[derive(Debug, Clone, Copy)]
pub struct FrequencyEstimator {
    sampling_rate: f64,
    band_limit: f64,
}

impl Default for FrequencyEstimator {
    fn default() -> Self {
        Self::new(SAMPLING_RATE_HZ, BAND_LIMIT_HZ)
    }
}

impl FrequencyEstimator {
    pub fn new(sampling_rate: f64, band_limit: f64) -> Self {
        Self {
            sampling_rate,
            band_limit,
        }
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn band_limit(&self) -> f64 {
        self.band_limit
    }

    /// Shortest signal that has at least one non-DC bin inside the band
    pub fn min_signal_len(&self) -> usize {
        if self.band_limit <= 0.0 {
            return usize::MAX;
        }
        ((self.sampling_rate / self.band_limit).ceil() as usize).max(2)
    }

    pub fn estimate(&self, signal: &[f64]) -> Result<f64> {
        estimate_dominant_frequency(signal, self.sampling_rate, self.band_limit)
    }
}

/// Return the frequency (Hz) of the strongest in-band, non-DC spectral bin
pub fn estimate_dominant_frequency(
    signal: &[f64],
    sampling_rate: f64,
    band_limit: f64,
) -> Result<f64> {
    let n = signal.len();
    if n < 2 {
        return Err(MotionError::InvalidInput(format!(
            "dominant frequency needs at least 2 samples, got {}",
            n
        )));
    }

    let magnitudes = magnitude_spectrum(signal);

    // Candidates in ascending bin order: (frequency, magnitude)
    let candidates: Vec<(f64, f64)> = magnitudes
        .iter()
        .enumerate()
        .map(|(k, &amp)| (bin_frequency(k, n, sampling_rate), amp))
        .filter(|&(freq, _)| freq >= 0.0 && freq <= band_limit)
        .collect();

    if candidates.len() < 2 {
        return Err(MotionError::InvalidInput(format!(
            "no non-zero frequency bin within {} Hz for {} samples at {} Hz",
            band_limit, n, sampling_rate
        )));
    }

    let mut max_index = 1;
    for i in 1..candidates.len() {
        if candidates[max_index].1 < candidates[i].1 {
            max_index = i;
        }
    }

    Ok(candidates[max_index].0)
}

/// Signed frequency of DFT bin `k`, laid out the way a two-sided spectrum is
pub(crate) fn bin_frequency(k: usize, n: usize, sampling_rate: f64) -> f64 {
    let positive_bins = n.div_ceil(2);
    if k < positive_bins {
        k as f64 * sampling_rate / n as f64
    } else {
        (k as f64 - n as f64) * sampling_rate / n as f64
    }
}

/// Magnitude of the full complex DFT of a real signal
pub(crate) fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer.iter().map(|c| c.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sinusoid(freq: f64, offset: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| offset + (2.0 * PI * freq * i as f64 / SAMPLING_RATE_HZ).sin())
            .collect()
    }

    #[test]
    fn test_recovers_embedded_sinusoid() {
        let estimator = FrequencyEstimator::default();
        for &f0 in &[1.0, 2.0, 3.0, 4.0, 7.5] {
            let freq = estimator.estimate(&sinusoid(f0, 0.0, 400)).unwrap();
            let bin_width = SAMPLING_RATE_HZ / 400.0;
            assert!((freq - f0).abs() <= bin_width, "expected {} got {}", f0, freq);
        }
    }

    #[test]
    fn test_dc_offset_never_wins() {
        let estimator = FrequencyEstimator::default();
        // Offset dwarfs the oscillation, the DC bin is by far the largest
        let freq = estimator.estimate(&sinusoid(2.0, 50.0, 300)).unwrap();
        assert!((freq - 2.0).abs() < 1e-9, "got {}", freq);
    }

    #[test]
    fn test_band_limit_excludes_high_frequencies() {
        let estimator = FrequencyEstimator::default();
        let signal: Vec<f64> = sinusoid(3.0, 0.0, 300)
            .iter()
            .zip(sinusoid(25.0, 0.0, 300))
            .map(|(a, b)| 0.2 * a + 5.0 * b)
            .collect();
        let freq = estimator.estimate(&signal).unwrap();
        assert!((freq - 3.0).abs() < 1e-9, "got {}", freq);
    }

    #[test]
    fn test_flat_signal_picks_lowest_scanned_bin() {
        let freq = estimate_dominant_frequency(&[0.0; 300], 100.0, 10.0).unwrap();
        assert!((freq - 100.0 / 300.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_short_signal_is_invalid() {
        assert!(matches!(
            estimate_dominant_frequency(&[1.0], 100.0, 10.0),
            Err(MotionError::InvalidInput(_))
        ));
        assert!(matches!(
            estimate_dominant_frequency(&[], 100.0, 10.0),
            Err(MotionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_no_in_band_bin_is_invalid() {
        // 5 samples at 100 Hz: first non-DC bin is 20 Hz, above the band
        assert!(matches!(
            estimate_dominant_frequency(&[1.0, 2.0, 3.0, 2.0, 1.0], 100.0, 10.0),
            Err(MotionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bin_frequency_layout() {
        assert_eq!(bin_frequency(0, 4, 100.0), 0.0);
        assert_eq!(bin_frequency(1, 4, 100.0), 25.0);
        assert_eq!(bin_frequency(2, 4, 100.0), -50.0);
        assert_eq!(bin_frequency(2, 5, 100.0), 40.0);
        assert_eq!(bin_frequency(3, 5, 100.0), -40.0);
    }

    #[test]
    fn test_min_signal_len() {
        assert_eq!(FrequencyEstimator::default().min_signal_len(), 10);
        assert_eq!(FrequencyEstimator::new(100.0, 60.0).min_signal_len(), 2);
    }
}
