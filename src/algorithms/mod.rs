//! Sleep/wake classification algorithms
//!
//! Each published algorithm sits behind [`SleepWakeAlgorithm`], so the
//! orchestrator can dispatch on a boxed trait object without knowing which
//! formula runs. Two data regimes exist: epoch-count classifiers (weighted
//! sliding windows over 1-minute counts) and raw-signal classifiers
//! (posture-stability detection over tri-axial data).

mod cole_kripke;
mod sadeh;
mod sib;

pub use cole_kripke::{ColeKripke, ColeKripkeVariant};
pub use sadeh::{Sadeh, SadehVariant};
pub use sib::SibClassifier;

use crate::error::ScoreError;
use crate::signal::{resample_epochs, Aggregate};
use crate::table::SampleTable;
use crate::types::{AlgorithmDataRequirement, Warning};
use chrono::{DateTime, Utc};

/// Expected cadence of epoch-count classifier input
pub const CLASSIFIER_EPOCH_SECONDS: f64 = 60.0;

/// Tolerance around the 1-minute cadence before collapsing/rejecting
const CADENCE_TOLERANCE_SECONDS: f64 = 2.0;

/// A single algorithm parameter (name and current value)
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub value: f64,
}

/// A reconfigured algorithm plus warnings for ignored override keys
pub struct ParamUpdate {
    pub algorithm: Box<dyn SleepWakeAlgorithm>,
    pub warnings: Vec<Warning>,
}

/// Interchangeable sleep/wake classifier
///
/// Implementations are pure functions of their input plus immutable
/// construction-time parameters; instances are safe to share across threads
/// once built. Reconfiguration goes through [`with_overrides`], which
/// returns a new instance rather than mutating in place.
///
/// [`with_overrides`]: SleepWakeAlgorithm::with_overrides
pub trait SleepWakeAlgorithm: Send + Sync {
    /// Stable identifier used by the registry
    fn id(&self) -> &'static str;

    /// Human-readable display name
    fn name(&self) -> &'static str;

    /// Data shape this algorithm requires
    fn requirement(&self) -> AlgorithmDataRequirement;

    /// Tunable parameters and their current values
    fn parameters(&self) -> Vec<Parameter>;

    /// Rebuild with partial overrides
    ///
    /// Unknown keys are a typed error; attempts to change fixed published
    /// constants are ignored with a warning.
    fn with_overrides(&self, overrides: &[(String, f64)]) -> Result<ParamUpdate, ScoreError>;

    /// Score a table, returning the input plus a `sleep_score` column
    /// (epoch algorithms may also re-cadence the table to 1 minute; raw
    /// algorithms emit a 60 s grid plus diagnostic columns)
    fn score(&self, table: &SampleTable) -> Result<SampleTable, ScoreError>;

    /// Score a bare series at the given cadence
    ///
    /// For epoch algorithms the series is activity counts; for the
    /// raw-signal classifier it is the short-epoch angle-change series.
    fn score_array(&self, values: &[f64], epoch_seconds: f64) -> Result<Vec<u8>, ScoreError>;
}

/// Validate counts for NaN/negative/infinite values
pub(crate) fn validate_counts(counts: &[f64]) -> Result<(), ScoreError> {
    if counts.is_empty() {
        return Err(ScoreError::InvalidInput(
            "activity series is empty".to_string(),
        ));
    }
    for (i, &c) in counts.iter().enumerate() {
        if c.is_nan() || c.is_infinite() {
            return Err(ScoreError::InvalidInput(format!(
                "activity count at epoch {i} is not finite"
            )));
        }
        if c < 0.0 {
            return Err(ScoreError::InvalidInput(format!(
                "activity count at epoch {i} is negative ({c})"
            )));
        }
    }
    Ok(())
}

/// Activity series normalized to 1-minute cadence
pub(crate) struct MinuteSeries {
    pub timestamps: Option<Vec<DateTime<Utc>>>,
    pub counts: Vec<f64>,
}

/// Pull the activity column out of an epoch table and normalize its cadence
///
/// Epochs coarser than 1 minute are rejected; finer epochs are collapsed to
/// 1 minute by summation (a no-op on already-1-minute data). Tables without
/// timestamps are assumed to be at 1-minute cadence already.
pub(crate) fn minute_series(table: &SampleTable) -> Result<MinuteSeries, ScoreError> {
    let name = table.activity_column_name().ok_or_else(|| {
        ScoreError::InvalidInput(format!(
            "no activity column found (columns: {:?})",
            table.column_names()
        ))
    })?;
    let counts = table
        .column(&name)
        .ok_or_else(|| ScoreError::InvalidInput(format!("activity column '{name}' disappeared")))?
        .to_vec();
    validate_counts(&counts)?;

    let Some(timestamps) = table.timestamps() else {
        return Ok(MinuteSeries {
            timestamps: None,
            counts,
        });
    };

    match table.median_interval_seconds() {
        Some(interval) if interval > CLASSIFIER_EPOCH_SECONDS + CADENCE_TOLERANCE_SECONDS => {
            Err(ScoreError::InvalidInput(format!(
                "epoch cadence {interval:.1}s is coarser than 1 minute and cannot be refined"
            )))
        }
        Some(interval) if interval < CLASSIFIER_EPOCH_SECONDS - CADENCE_TOLERANCE_SECONDS => {
            let (ts, collapsed) =
                resample_epochs(timestamps, &counts, CLASSIFIER_EPOCH_SECONDS, Aggregate::Sum)?;
            Ok(MinuteSeries {
                timestamps: Some(ts),
                counts: collapsed,
            })
        }
        _ => Ok(MinuteSeries {
            timestamps: Some(timestamps.to_vec()),
            counts,
        }),
    }
}

/// Assemble the standard epoch-classifier output table
pub(crate) fn scored_table(
    series: MinuteSeries,
    scores: Vec<u8>,
) -> Result<SampleTable, ScoreError> {
    let mut out = match series.timestamps {
        Some(ts) => SampleTable::with_timestamps(ts),
        None => SampleTable::new(),
    };
    out.add_column("activity", series.counts)?;
    out.add_column(
        crate::table::SCORE_COLUMN,
        scores.into_iter().map(f64::from).collect(),
    )?;
    Ok(out)
}
