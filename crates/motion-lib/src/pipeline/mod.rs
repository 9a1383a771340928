//! Training and inference orchestration
//!
//! This module provides:
//! - Example assembly from adaptively windowed raw samples
//! - Seeded train/validation partitioning
//! - Iterative and direct-fit training protocols with progress streaming
//! - Midpoint-window inference with progress streaming

mod inference;
mod split;
mod training;

#[cfg(test)]
mod tests;

pub use inference::{InferenceOrchestrator, InferenceRequest};
pub use split::{train_validation_split, DEFAULT_SPLIT_SEED};
pub use training::{
    TrainedModel, TrainingOrchestrator, TrainingRequest, PROGRESS_EVERY_EPOCHS,
};
