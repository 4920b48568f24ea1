//! Actiscore - Actigraphy scoring engine for wearable accelerometer recordings
//!
//! Actiscore turns accelerometer recordings into sleep analyses through a
//! deterministic pipeline: source detection → compatibility routing →
//! epoching (when needed) → sleep/wake classification → period detection →
//! summary metrics.
//!
//! ## Modules
//!
//! - **Algorithms**: Cole-Kripke, Sadeh, and van Hees SIB classifiers
//! - **Period**: sleep-onset/offset and automatic SPT-window detection
//! - **Nonwear**: range/SD device-removal detection
//! - **Metrics**: clinical summary statistics for a resolved sleep period

pub mod algorithms;
pub mod detect;
pub mod epoching;
pub mod error;
pub mod metrics;
pub mod nonwear;
pub mod period;
pub mod pipeline;
pub mod registry;
pub mod signal;
pub mod table;
pub mod types;

pub use error::ScoreError;
pub use pipeline::{determine_pipeline_type, ScoringPipeline, ScoringResult, ScoringSummary};
pub use registry::{AlgorithmDescriptor, AlgorithmRegistry};
pub use table::SampleTable;

// Algorithm exports
pub use algorithms::{ColeKripke, Sadeh, SibClassifier, SleepWakeAlgorithm};

// Period and metrics exports
pub use metrics::SleepMetricsCalculator;
pub use nonwear::{NonwearDetector, NonwearResult};
pub use period::{AutoWindowDetector, ConsecutiveDetector, ConsecutiveRules};
pub use types::{
    AlgorithmDataRequirement, CompatibilityResult, DataSourceType, NonwearPeriod, PipelineType,
    SleepPeriod, SleepPeriodMetrics, SptWindow, Warning,
};

/// Engine version embedded in exported results
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported results
pub const PRODUCER_NAME: &str = "actiscore";
