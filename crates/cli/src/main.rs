//! Motion classifier CLI
//!
//! Trains GRU, RNN, KNN and SVM motion classifiers on labeled accelerometer
//! recordings, streams job progress to the terminal and runs stored models
//! on new recordings.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, train};
use motion_lib::PipelineMetrics;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Motion classifier CLI
#[derive(Parser)]
#[command(name = "motion")]
#[command(author, version, about = "Train and run accelerometer motion classifiers", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./motion.toml when present)
    #[arg(long, global = true, env = "MOTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log line format, written to stderr
    #[arg(long, global = true, default_value = "text")]
    pub log_format: output::LogFormat,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Print pipeline metrics in Prometheus text format to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on a directory of labeled recordings
    Train(train::TrainArgs),

    /// Classify recordings with a stored model
    Predict(predict::PredictArgs),

    /// Show the stored model and label vocabulary of a job
    Inspect {
        /// Job id of the stored model
        #[arg(long)]
        job: String,
    },
}

fn init_tracing(format: output::LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        output::LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        output::LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = config::MotionConfig::load(cli.config.as_deref())?;
    debug!(?config, "Configuration loaded");

    let result = match cli.command {
        Commands::Train(args) => train::run(&config, args, cli.format).await,
        Commands::Predict(args) => predict::run(&config, args, cli.format).await,
        Commands::Inspect { job } => inspect::run(&config, &job, cli.format).await,
    };

    if cli.metrics {
        eprint!("{}", PipelineMetrics::new().gather_text());
    }

    result
}
