//! `motion train`: fit a classifier on labeled recordings

use anyhow::{Context, Result};
use colored::Colorize;
use motion_lib::classifier::ModelFamily;
use motion_lib::{
    ingest, FsModelStore, LabelSet, ModelKind, ModelSpec, ModelStore,
    StatisticalFeatureExtractor, StructuredLogger, TrainingOrchestrator, TrainingRequest,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;
use tokio_stream::StreamExt;
use tracing::info;

use crate::config::MotionConfig;
use crate::output::{
    format_percentage, print_json, print_progress, print_success, print_table, short_checksum,
    OutputFormat,
};

/// Arguments of `motion train`
#[derive(Debug, Clone, clap::Args)]
pub struct TrainArgs {
    /// Directory of CSV recordings sorted by file name into label blocks,
    /// or one NPY array of shape (recordings, records, 4)
    #[arg(long)]
    pub data: PathBuf,

    /// Comma-separated labels, one per block of recordings
    #[arg(long, value_delimiter = ',', required = true)]
    pub labels: Vec<String>,

    /// Model kind: GRU, RNN, KNN or SVM
    #[arg(long)]
    pub model: String,

    /// Positional parameters: GRU/RNN take
    /// validation_fraction,batch_size,learning_rate,epochs;
    /// KNN/SVM take validation_fraction,n_neighbors
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub params: Vec<f64>,

    /// Job id the trained model is stored under
    #[arg(long)]
    pub job: String,

    /// Replace a model already stored under the job id
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize, Tabled)]
struct TrainSummary {
    #[tabled(rename = "Job")]
    job_id: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Classes")]
    classes: String,
    #[tabled(rename = "Validation")]
    validation: String,
    #[tabled(rename = "Checksum")]
    checksum: String,
}

/// Parameters used when `--params` is omitted
pub fn default_params(kind: ModelKind, validation_fraction: f64) -> Vec<f64> {
    match kind.family() {
        ModelFamily::Iterative => vec![validation_fraction, 32.0, 0.001, 50.0],
        ModelFamily::DirectFit => vec![validation_fraction, 5.0],
    }
}

pub async fn run(config: &MotionConfig, args: TrainArgs, format: OutputFormat) -> Result<()> {
    let kind: ModelKind = args.model.parse()?;
    let params = if args.params.is_empty() {
        default_params(kind, config.validation_fraction)
    } else {
        args.params.clone()
    };
    let spec = ModelSpec::from_values(kind, &params)?;

    let store = FsModelStore::new(&config.store_dir);
    if store.exists(&args.job).await && !args.force {
        anyhow::bail!(
            "Job '{}' already has a stored model, pass --force to replace it",
            args.job
        );
    }

    let labels = LabelSet::new(args.labels.iter().map(|l| l.trim().to_string()));
    let samples = ingest::load_training_set(&args.data, &labels, config.samples_per_label)
        .with_context(|| format!("Failed to load training recordings from {:?}", args.data))?;

    let orchestrator = Arc::new(
        TrainingOrchestrator::new()
            .with_segmenter(config.segmenter())
            .with_extractor(Arc::new(StatisticalFeatureExtractor::new(
                config.sampling_rate_hz,
            )))
            .with_device(config.device)
            .with_split_seed(config.split_seed),
    );

    let request = TrainingRequest {
        job_id: args.job.clone(),
        samples,
        labels,
        samples_per_label: config.samples_per_label,
        model: spec,
        features: config.features(),
    };

    info!(job_id = %args.job, model = %kind, "Starting training job");
    let (progress, handle) = orchestrator.spawn_training(request)?;

    let stream = progress.into_stream();
    tokio::pin!(stream);
    while let Some(message) = stream.next().await {
        print_progress(&message);
    }

    let trained = handle.await.context("Training task panicked")??;

    let manifest = store
        .save(&args.job, &trained)
        .await
        .with_context(|| format!("Failed to store model for job '{}'", args.job))?;
    StructuredLogger::new(&args.job).log_model_saved(
        &kind.to_string(),
        &store.job_dir(&args.job)?.display().to_string(),
        &manifest.model_sha256,
    );

    let summary = TrainSummary {
        job_id: args.job.clone(),
        model: kind.to_string(),
        classes: manifest.classes.join(", "),
        validation: format_percentage(spec.validation_fraction),
        checksum: short_checksum(&manifest.model_sha256),
    };
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            println!();
            print_table(&[summary], format);
            print_success(&format!(
                "Model for job {} stored in {}",
                args.job.cyan(),
                config.store_dir.display()
            ));
        }
    }

    Ok(())
}
