//! `motion predict`: classify recordings with a stored model

use anyhow::{Context, Result};
use motion_lib::ingest::{self, DEFAULT_SEGMENT_SECONDS};
use motion_lib::{
    FsModelStore, InferenceOrchestrator, InferenceRequest, LabelSet, ModelStore, RawSample,
    StatisticalFeatureExtractor,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tracing::{debug, info};

use crate::config::MotionConfig;
use crate::output::{print_progress, print_table, print_warning, OutputFormat};

/// Arguments of `motion predict`
#[derive(Debug, Clone, clap::Args)]
pub struct PredictArgs {
    /// CSV recordings or NPY stacks to classify
    #[arg(long, num_args = 1.., required = true)]
    pub input: Vec<PathBuf>,

    /// Job id of the stored model
    #[arg(long)]
    pub job: String,

    /// Seconds dropped from the start of each recording before segmenting
    #[arg(long)]
    pub trim_seconds: Option<f64>,

    /// Cut each recording into this many consecutive test segments
    #[arg(long)]
    pub segments: Option<usize>,

    /// Labels expected by the caller, checked against the stored model
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Delay between streamed predictions in milliseconds
    #[arg(long, default_value_t = 0)]
    pub pace_ms: u64,
}

#[derive(Serialize, Tabled)]
struct PredictionRow {
    #[tabled(rename = "Sample")]
    sample: usize,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Prediction")]
    prediction: String,
}

/// Load every input, optionally cut into test segments; returns samples with their source names
///
/// Recordings of an NPY stack are named `file#n`, segments add another `#n`.
pub fn load_inputs(
    args: &PredictArgs,
    segment_seconds: f64,
    sampling_rate: f64,
) -> Result<Vec<(String, RawSample)>> {
    let mut samples = Vec::new();
    for path in &args.input {
        let recordings = ingest::load_recordings(path)
            .with_context(|| format!("Failed to load recordings from {:?}", path))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let stacked = ingest::is_npy(path);

        for (r, recording) in recordings.into_iter().enumerate() {
            let name = if stacked {
                format!("{}#{}", file_name, r + 1)
            } else {
                file_name.clone()
            };

            if args.trim_seconds.is_none() && args.segments.is_none() {
                samples.push((name, recording));
                continue;
            }

            let segments = ingest::segment_recording(
                &recording,
                args.trim_seconds.unwrap_or(0.0),
                args.segments.unwrap_or(1),
                segment_seconds,
                sampling_rate,
            )
            .with_context(|| format!("Failed to segment recording {}", name))?;
            debug!(source = %name, segments = segments.len(), "Segmented recording");
            for (i, segment) in segments.into_iter().enumerate() {
                samples.push((format!("{}#{}", name, i + 1), segment));
            }
        }
    }
    Ok(samples)
}

pub async fn run(config: &MotionConfig, args: PredictArgs, format: OutputFormat) -> Result<()> {
    let store = FsModelStore::new(&config.store_dir);
    let trained = store
        .load(&args.job)
        .await
        .with_context(|| format!("No usable model stored for job '{}'", args.job))?;

    let segment_seconds = if config.recording_seconds > 0.0 {
        config.recording_seconds
    } else {
        DEFAULT_SEGMENT_SECONDS
    };
    let inputs = load_inputs(&args, segment_seconds, config.sampling_rate_hz)?;
    if inputs.is_empty() {
        print_warning("Nothing to classify");
        return Ok(());
    }
    let (sources, samples): (Vec<String>, Vec<RawSample>) = inputs.into_iter().unzip();

    let expected_labels = if args.labels.is_empty() {
        None
    } else {
        Some(LabelSet::new(args.labels.iter().map(|l| l.trim().to_string())))
    };

    let orchestrator = Arc::new(
        InferenceOrchestrator::new()
            .with_segmenter(config.segmenter())
            .with_extractor(Arc::new(StatisticalFeatureExtractor::new(
                config.sampling_rate_hz,
            ))),
    );

    info!(job_id = %args.job, samples = samples.len(), "Starting inference job");
    let (mut progress, handle) = orchestrator.spawn_inference(
        InferenceRequest {
            job_id: args.job.clone(),
            samples,
            expected_labels,
        },
        Arc::new(trained),
    )?;

    let pace = Duration::from_millis(args.pace_ms);
    while let Some(message) = progress.recv().await {
        if matches!(format, OutputFormat::Table) {
            print_progress(&message);
        }
        if !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }
    }

    let predictions = handle.await.context("Inference task panicked")??;
    let rows: Vec<PredictionRow> = predictions
        .into_iter()
        .zip(sources)
        .enumerate()
        .map(|(sample, (prediction, source))| PredictionRow {
            sample,
            source,
            prediction,
        })
        .collect();

    if matches!(format, OutputFormat::Table) {
        println!();
    }
    print_table(&rows, format);
    Ok(())
}
