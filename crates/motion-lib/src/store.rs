//! Model persistence keyed by job id
//!
//! Each job gets its own directory holding the serialized model, the label
//! encoder and a manifest with SHA-256 checksums of both. Files are written
//! to a temp path and renamed into place.

use crate::classifier::{Model, ModelKind};
use crate::error::{MotionError, Result};
use crate::features::FeatureConfig;
use crate::labels::LabelEncoder;
use crate::pipeline::TrainedModel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MODEL_FILE: &str = "model.json";
const ENCODER_FILE: &str = "label_encoder.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Metadata written next to every stored model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub job_id: String,
    pub model_kind: ModelKind,
    pub classes: Vec<String>,
    pub features: FeatureConfig,
    pub model_sha256: String,
    pub encoder_sha256: String,
    pub saved_at: DateTime<Utc>,
}

/// Storage for trained models, keyed by job id
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn save(&self, job_id: &str, trained: &TrainedModel) -> Result<ModelManifest>;

    /// Fails with `Persistence` when nothing usable is stored for `job_id`
    async fn load(&self, job_id: &str) -> Result<TrainedModel>;

    async fn manifest(&self, job_id: &str) -> Result<ModelManifest>;

    async fn exists(&self, job_id: &str) -> bool;
}

/// Filesystem-backed store rooted at one directory
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of `job_id`; ids are restricted to a safe file-name alphabet
    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf> {
        let valid = !job_id.is_empty()
            && job_id != "."
            && job_id != ".."
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(MotionError::InvalidInput(format!(
                "job id '{}' must be non-empty and use only letters, digits, '-', '_' or '.'",
                job_id
            )));
        }
        Ok(self.root.join(job_id))
    }

    fn read_file(&self, dir: &Path, name: &str, job_id: &str) -> Result<Vec<u8>> {
        let path = dir.join(name);
        fs::read(&path).map_err(|e| {
            MotionError::Persistence(format!(
                "{} for job '{}' could not be read from {:?}: {}",
                name, job_id, path, e
            ))
        })
    }
}

#[async_trait]
impl ModelStore for FsModelStore {
    async fn save(&self, job_id: &str, trained: &TrainedModel) -> Result<ModelManifest> {
        let dir = self.job_dir(job_id)?;
        fs::create_dir_all(&dir)?;

        let model_bytes = serde_json::to_vec(&trained.model)?;
        let encoder_bytes = serde_json::to_vec(&trained.encoder)?;

        let manifest = ModelManifest {
            job_id: job_id.to_string(),
            model_kind: trained.model.kind(),
            classes: trained.encoder.classes().to_vec(),
            features: trained.features,
            model_sha256: compute_checksum(&model_bytes),
            encoder_sha256: compute_checksum(&encoder_bytes),
            saved_at: Utc::now(),
        };

        write_atomic(&dir.join(MODEL_FILE), &model_bytes)?;
        write_atomic(&dir.join(ENCODER_FILE), &encoder_bytes)?;
        write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            job_id = %job_id,
            model = %manifest.model_kind,
            path = ?dir,
            "Stored trained model"
        );
        Ok(manifest)
    }

    async fn load(&self, job_id: &str) -> Result<TrainedModel> {
        let dir = self.job_dir(job_id)?;
        let manifest = self.manifest(job_id).await?;

        let model_bytes = self.read_file(&dir, MODEL_FILE, job_id)?;
        let encoder_bytes = self.read_file(&dir, ENCODER_FILE, job_id)?;

        for (name, bytes, expected) in [
            (MODEL_FILE, &model_bytes, &manifest.model_sha256),
            (ENCODER_FILE, &encoder_bytes, &manifest.encoder_sha256),
        ] {
            let actual = compute_checksum(bytes);
            if &actual != expected {
                return Err(MotionError::Persistence(format!(
                    "{} for job '{}' failed checksum verification (expected {}, got {})",
                    name, job_id, expected, actual
                )));
            }
        }

        let model: Model = serde_json::from_slice(&model_bytes)?;
        let encoder: LabelEncoder = serde_json::from_slice(&encoder_bytes)?;
        debug!(job_id = %job_id, model = %model.kind(), "Loaded trained model");

        Ok(TrainedModel {
            model,
            encoder,
            features: manifest.features,
        })
    }

    async fn manifest(&self, job_id: &str) -> Result<ModelManifest> {
        let dir = self.job_dir(job_id)?;
        let bytes = self.read_file(&dir, MANIFEST_FILE, job_id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn exists(&self, job_id: &str) -> bool {
        match self.job_dir(job_id) {
            Ok(dir) => [MODEL_FILE, ENCODER_FILE, MANIFEST_FILE]
                .iter()
                .all(|name| dir.join(name).is_file()),
            Err(_) => false,
        }
    }
}

/// Write to a temp file, sync, then rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
