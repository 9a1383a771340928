//! `motion inspect`: show what is stored for a job

use anyhow::{Context, Result};
use colored::Colorize;
use motion_lib::{FsModelStore, ModelStore};

use crate::config::MotionConfig;
use crate::output::{format_timestamp, print_json, short_checksum, OutputFormat};

pub async fn run(config: &MotionConfig, job: &str, format: OutputFormat) -> Result<()> {
    let store = FsModelStore::new(&config.store_dir);
    let manifest = store
        .manifest(job)
        .await
        .with_context(|| format!("No model stored for job '{}'", job))?;

    match format {
        OutputFormat::Json => print_json(&manifest),
        OutputFormat::Table => {
            println!("{}", "Stored Model".bold());
            println!("{}", "=".repeat(60));
            println!("Job:        {}", manifest.job_id.cyan());
            println!("Model:      {}", manifest.model_kind.to_string().cyan());
            println!("Saved:      {}", format_timestamp(&manifest.saved_at));
            println!(
                "Features:   stat_variable={} fft_variable={}",
                manifest.features.stat_variable, manifest.features.fft_variable
            );
            println!();
            println!("{}", "Labels".bold());
            for (code, label) in manifest.classes.iter().enumerate() {
                println!("  {:>3}  {}", code, label.green());
            }
            println!();
            println!("Model checksum:   {}", short_checksum(&manifest.model_sha256));
            println!("Encoder checksum: {}", short_checksum(&manifest.encoder_sha256));
        }
    }

    Ok(())
}
