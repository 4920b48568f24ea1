//! Error types for the actiscore engine

use crate::types::{AlgorithmDataRequirement, DataSourceType};
use thiserror::Error;

/// Errors that can occur during scoring
///
/// Every variant carries enough machine-readable context for a presentation
/// layer to render a specific message without re-deriving it.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not determine data shape: no recognized column pattern (columns found: {columns:?})")]
    DetectionError { columns: Vec<String> },

    #[error("Algorithm '{algorithm}' requires {requirement} data but the source provides {source} data: {reason}")]
    Incompatible {
        algorithm: String,
        requirement: AlgorithmDataRequirement,
        source: DataSourceType,
        reason: String,
        /// Algorithms that can run on this source instead
        alternatives: Vec<String>,
    },

    #[error("Epoching failed: {0}")]
    EpochingError(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unknown parameter '{parameter}' for algorithm '{algorithm}'")]
    UnknownParameter {
        algorithm: String,
        parameter: String,
    },

    #[error("No sleep score column found in classifier output (columns: {columns:?})")]
    MissingScoreColumn { columns: Vec<String> },

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
