//! Sliding-window segmentation with frequency-derived parameters

use super::frequency::FrequencyEstimator;
use crate::error::{MotionError, Result};
use crate::models::{Channel, RawSample, Window};
use tracing::debug;

/// Window length and step, both in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub window_seconds: f64,
    pub step_seconds: f64,
}

impl WindowParams {
    pub fn new(window_seconds: f64, step_seconds: f64) -> Self {
        Self {
            window_seconds,
            step_seconds,
        }
    }

    /// One period per window, advancing half a period (50% overlap)
    pub fn from_frequency(frequency: f64) -> Result<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(MotionError::UndefinedWindow { frequency });
        }
        Ok(Self {
            window_seconds: 1.0 / frequency,
            step_seconds: 0.5 / frequency,
        })
    }

    /// Window length in records (truncated)
    pub fn window_len(&self, sampling_rate: f64) -> usize {
        (self.window_seconds * sampling_rate) as usize
    }

    /// Step length in records (truncated)
    pub fn step_len(&self, sampling_rate: f64) -> usize {
        (self.step_seconds * sampling_rate) as usize
    }
}

/// Slices raw samples into fixed-length windows
#[derive(Debug, Clone, Copy)]
pub struct WindowSegmenter {
    sampling_rate: f64,
}

impl WindowSegmenter {
    pub fn new(sampling_rate: f64) -> Self {
        Self { sampling_rate }
    }

    /// Cut `sample` into full-length windows; a short trailing slice is dropped
    pub fn segment<'a>(&self, sample: &'a RawSample, params: WindowParams) -> Result<Vec<Window<'a>>> {
        let window_len = params.window_len(self.sampling_rate);
        let step_len = params.step_len(self.sampling_rate);
        if window_len == 0 || step_len == 0 {
            return Err(MotionError::InvalidInput(format!(
                "window of {}s stepping {}s is shorter than one record at {} Hz",
                params.window_seconds, params.step_seconds, self.sampling_rate
            )));
        }

        let records = sample.records();
        if records.len() < window_len {
            return Ok(Vec::new());
        }

        Ok((0..=records.len() - window_len)
            .step_by(step_len)
            .map(|start| Window {
                start,
                records: &records[start..start + window_len],
            })
            .collect())
    }
}

/// Windows of one sample together with the parameters that produced them
#[derive(Debug, Clone)]
pub struct SegmentedSample<'a> {
    pub dominant_frequency: f64,
    pub params: WindowParams,
    pub windows: Vec<Window<'a>>,
}

impl<'a> SegmentedSample<'a> {
    /// Window at the temporal midpoint of the sample
    pub fn midpoint(&self) -> Option<&Window<'a>> {
        self.windows.get(self.windows.len() / 2)
    }
}

/// Derives per-sample window parameters from the magnitude channel's dominant frequency
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveSegmenter {
    estimator: FrequencyEstimator,
}

impl AdaptiveSegmenter {
    pub fn new(estimator: FrequencyEstimator) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &FrequencyEstimator {
        &self.estimator
    }

    /// Derive `T = 1/f` and `n = 0.5/f` from the magnitude channel
    pub fn derive_params(&self, sample: &RawSample) -> Result<(f64, WindowParams)> {
        let frequency = self.estimator.estimate(&sample.channel(Channel::Magnitude))?;
        Ok((frequency, WindowParams::from_frequency(frequency)?))
    }

    /// Segment sample `index`; fails with `EmptyWindowSet` when no full window fits
    pub fn segment<'a>(&self, index: usize, sample: &'a RawSample) -> Result<SegmentedSample<'a>> {
        let min_len = self.estimator.min_signal_len();
        if sample.len() < min_len {
            return Err(MotionError::EmptyWindowSet {
                index,
                len: sample.len(),
                window: min_len,
            });
        }

        let (dominant_frequency, params) = self.derive_params(sample)?;
        let segmenter = WindowSegmenter::new(self.estimator.sampling_rate());
        let windows = segmenter.segment(sample, params)?;

        debug!(
            sample = index,
            dominant_frequency,
            window_len = params.window_len(self.estimator.sampling_rate()),
            step_len = params.step_len(self.estimator.sampling_rate()),
            windows = windows.len(),
            "Segmented sample"
        );

        if windows.is_empty() {
            return Err(MotionError::EmptyWindowSet {
                index,
                len: sample.len(),
                window: params.window_len(self.estimator.sampling_rate()),
            });
        }

        Ok(SegmentedSample {
            dominant_frequency,
            params,
            windows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccelRecord, SAMPLING_RATE_HZ};
    use std::f64::consts::PI;

    fn ramp(len: usize) -> RawSample {
        (0..len)
            .map(|i| AccelRecord::new(i as f64, 0.0, 0.0, i as f64))
            .collect::<Vec<_>>()
            .into()
    }

    fn tone(freq: f64, len: usize) -> RawSample {
        (0..len)
            .map(|i| {
                let v = 1.0 + 0.5 * (2.0 * PI * freq * i as f64 / SAMPLING_RATE_HZ).sin();
                AccelRecord::new(v, 0.0, 0.0, v)
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_window_count_matches_formula() {
        let segmenter = WindowSegmenter::new(100.0);
        let cases = [(300, 1.0, 0.4), (300, 0.5, 0.25), (275, 0.25, 0.12), (99, 1.0, 0.5)];
        for (len, t, n) in cases {
            let sample = ramp(len);
            let params = WindowParams::new(t, n);
            let windows = segmenter.segment(&sample, params).unwrap();
            let t_len = params.window_len(100.0);
            let step = params.step_len(100.0);
            let expected = if len >= t_len { (len - t_len) / step + 1 } else { 0 };
            assert_eq!(windows.len(), expected, "len={} T={} n={}", len, t, n);
            assert!(windows.iter().all(|w| w.len() == t_len));
        }
    }

    #[test]
    fn test_windows_are_contiguous_slices() {
        let sample = ramp(100);
        let windows = WindowSegmenter::new(100.0)
            .segment(&sample, WindowParams::new(0.3, 0.2))
            .unwrap();
        assert_eq!(windows.len(), 4);
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.start, i * 20);
            assert_eq!(w.records[0].x, (i * 20) as f64);
            assert_eq!(w.records[29].x, (i * 20 + 29) as f64);
        }
    }

    #[test]
    fn test_segmentation_is_restartable() {
        let sample = ramp(250);
        let segmenter = WindowSegmenter::new(100.0);
        let params = WindowParams::new(0.5, 0.25);
        let first: Vec<usize> = segmenter.segment(&sample, params).unwrap().iter().map(|w| w.start).collect();
        let second: Vec<usize> = segmenter.segment(&sample, params).unwrap().iter().map(|w| w.start).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let sample = ramp(100);
        let result = WindowSegmenter::new(100.0).segment(&sample, WindowParams::new(0.5, 0.001));
        assert!(matches!(result, Err(MotionError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_frequency_is_undefined_window() {
        assert!(matches!(
            WindowParams::from_frequency(0.0),
            Err(MotionError::UndefinedWindow { .. })
        ));
        assert!(matches!(
            WindowParams::from_frequency(f64::NAN),
            Err(MotionError::UndefinedWindow { .. })
        ));
        assert!(matches!(
            WindowParams::from_frequency(f64::INFINITY),
            Err(MotionError::UndefinedWindow { .. })
        ));
    }

    #[test]
    fn test_adaptive_parameters_follow_dominant_frequency() {
        let segmenter = AdaptiveSegmenter::default();

        let slow = tone(2.0, 300);
        let seg = segmenter.segment(0, &slow).unwrap();
        assert!((seg.dominant_frequency - 2.0).abs() < 1e-9);
        assert_eq!(seg.params.window_len(100.0), 50);
        assert_eq!(seg.params.step_len(100.0), 25);
        assert_eq!(seg.windows.len(), 11);
        assert_eq!(seg.midpoint().unwrap().start, 125);

        let fast = tone(4.0, 300);
        let seg = segmenter.segment(1, &fast).unwrap();
        assert_eq!(seg.params.window_len(100.0), 25);
        assert_eq!(seg.params.step_len(100.0), 12);
        assert_eq!(seg.windows.len(), 23);
    }

    #[test]
    fn test_empty_sample_yields_empty_window_set() {
        let empty = RawSample::default();
        let result = AdaptiveSegmenter::default().segment(7, &empty);
        assert!(matches!(
            result,
            Err(MotionError::EmptyWindowSet { index: 7, len: 0, .. })
        ));
    }
}
