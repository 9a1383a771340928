//! Loading accelerometer recordings
//!
//! Two sources are understood: one phyphox CSV export per recording, or a
//! single NPY array of shape `(recordings, records, 4)` whose last axis holds
//! `x, y, z, magnitude`.

use crate::error::{MotionError, Result};
use crate::labels::LabelBroadcastScheme;
use crate::models::{AccelRecord, LabelSet, RawSample};
use ndarray::{Array3, Axis};
use ndarray_npy::read_npy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const COLUMN_X: &str = "Linear Acceleration x (m/s^2)";
pub const COLUMN_Y: &str = "Linear Acceleration y (m/s^2)";
pub const COLUMN_Z: &str = "Linear Acceleration z (m/s^2)";
pub const COLUMN_MAGNITUDE: &str = "Absolute acceleration (m/s^2)";

/// Length of one test segment cut from an uploaded recording
pub const DEFAULT_SEGMENT_SECONDS: f64 = 3.0;

/// Channels per record in an NPY stack
pub const NPY_CHANNELS: usize = 4;

/// Read one recording; the time column is ignored
pub fn load_recording_csv(path: impl AsRef<Path>) -> Result<RawSample> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path)?;
    read_recording(reader, &path.display().to_string())
}

/// Whether `path` names an NPY array file
pub fn is_npy(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("npy"))
        .unwrap_or(false)
}

/// Read a stack of recordings from an NPY file, `float64` or `float32`
pub fn load_recordings_npy(path: impl AsRef<Path>) -> Result<Vec<RawSample>> {
    let path = path.as_ref();
    let stack: Array3<f64> = match read_npy::<_, Array3<f64>>(path) {
        Ok(stack) => stack,
        Err(wide) => match read_npy::<_, Array3<f32>>(path) {
            Ok(narrow) => narrow.mapv(f64::from),
            Err(_) => return Err(wide.into()),
        },
    };

    let (count, len, channels) = stack.dim();
    if channels != NPY_CHANNELS {
        return Err(MotionError::InvalidInput(format!(
            "{} has {} channels per record, expected {} (x, y, z, magnitude)",
            path.display(),
            channels,
            NPY_CHANNELS
        )));
    }

    let samples: Vec<RawSample> = stack
        .axis_iter(Axis(0))
        .map(|recording| {
            RawSample::new(
                recording
                    .axis_iter(Axis(0))
                    .map(|r| AccelRecord::new(r[0], r[1], r[2], r[3]))
                    .collect(),
            )
        })
        .collect();
    debug!(origin = %path.display(), recordings = count, records = len, "Loaded NPY stack");
    Ok(samples)
}

/// Recordings at `path`: every recording of an NPY stack, or one CSV export
pub fn load_recordings(path: impl AsRef<Path>) -> Result<Vec<RawSample>> {
    let path = path.as_ref();
    if is_npy(path) {
        load_recordings_npy(path)
    } else {
        Ok(vec![load_recording_csv(path)?])
    }
}

fn read_recording<R: std::io::Read>(mut reader: csv::Reader<R>, origin: &str) -> Result<RawSample> {
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            MotionError::InvalidInput(format!("{} is missing column '{}'", origin, name))
        })
    };
    let indices = [
        column(COLUMN_X)?,
        column(COLUMN_Y)?,
        column(COLUMN_Z)?,
        column(COLUMN_MAGNITUDE)?,
    ];

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = result?;
        let mut values = [0.0; 4];
        for (value, &idx) in values.iter_mut().zip(&indices) {
            let cell = row.get(idx).unwrap_or("").trim();
            *value = cell.parse::<f64>().map_err(|_| {
                MotionError::InvalidInput(format!(
                    "{} row {}: '{}' in column '{}' is not a number",
                    origin, row_no, cell, headers[idx]
                ))
            })?;
        }
        records.push(AccelRecord::new(values[0], values[1], values[2], values[3]));
    }

    debug!(origin = %origin, records = records.len(), "Loaded recording");
    Ok(RawSample::new(records))
}

/// CSV files of `dir`, sorted by file name
pub fn list_recordings(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Load a labeled training set laid out as consecutive blocks per label
///
/// `source` is either a directory of CSV exports or one NPY stack. The
/// recording count must equal `labels.len() * samples_per_label`; for a
/// directory this is checked before any file is parsed.
pub fn load_training_set(
    source: impl AsRef<Path>,
    labels: &LabelSet,
    samples_per_label: usize,
) -> Result<Vec<RawSample>> {
    let source = source.as_ref();
    let samples = if source.is_file() && is_npy(source) {
        let samples = load_recordings_npy(source)?;
        LabelBroadcastScheme::new(labels.clone(), samples_per_label, samples.len())?;
        samples
    } else {
        let files = list_recordings(source)?;
        LabelBroadcastScheme::new(labels.clone(), samples_per_label, files.len())?;
        files
            .iter()
            .map(load_recording_csv)
            .collect::<Result<Vec<_>>>()?
    };
    info!(
        source = ?source,
        samples = samples.len(),
        labels = labels.len(),
        "Loaded training recordings"
    );
    Ok(samples)
}

/// Drop `trim_seconds` of leading records and cut consecutive segments
///
/// Seconds convert to records at `sampling_rate` Hz. Returns
/// `min(segments, available)` segments of `segment_seconds` each.
pub fn segment_recording(
    sample: &RawSample,
    trim_seconds: f64,
    segments: usize,
    segment_seconds: f64,
    sampling_rate: f64,
) -> Result<Vec<RawSample>> {
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return Err(MotionError::InvalidInput(format!(
            "sampling rate must be positive, got {}",
            sampling_rate
        )));
    }
    if !trim_seconds.is_finite() || trim_seconds < 0.0 {
        return Err(MotionError::InvalidInput(format!(
            "trim_seconds must be 0 or more, got {}",
            trim_seconds
        )));
    }
    if segments == 0 {
        return Err(MotionError::InvalidInput(
            "segments must be at least 1".to_string(),
        ));
    }
    let segment_len = (segment_seconds * sampling_rate) as usize;
    if segment_len == 0 {
        return Err(MotionError::InvalidInput(format!(
            "segment of {}s is shorter than one record",
            segment_seconds
        )));
    }

    let total = sample.len();
    let trim = (trim_seconds * sampling_rate) as usize;
    if trim >= total {
        return Err(MotionError::InvalidInput(format!(
            "trim of {}s must be shorter than the recording ({:.2}s)",
            trim_seconds,
            total as f64 / sampling_rate
        )));
    }

    let remaining = &sample.records()[trim..];
    let available = remaining.len() / segment_len;
    if remaining.len() < segments * segment_len {
        return Err(MotionError::InsufficientData(format!(
            "after trimming {}s only {} segment(s) of {}s are available, {} requested",
            trim_seconds, available, segment_seconds, segments
        )));
    }

    Ok(remaining
        .chunks_exact(segment_len)
        .take(segments.min(available))
        .map(|chunk| RawSample::new(chunk.to_vec()))
        .collect())
}
