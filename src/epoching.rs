//! Epoching service
//!
//! Converts a raw acceleration stream into fixed-length activity-count
//! epochs, the format the legacy epoch-based classifiers expect. A chosen
//! signal (vertical-axis absolute value or tri-axial vector magnitude) is
//! summed within each window and rounded to a non-negative integer count.

use crate::error::ScoreError;
use crate::signal::{resample_epochs, Aggregate};
use crate::table::SampleTable;
use crate::types::Warning;
use serde::{Deserialize, Serialize};

/// Default epoch length for derived activity counts
pub const DEFAULT_EPOCH_SECONDS: f64 = 60.0;

/// Signal the raw stream is reduced to before summation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochingSignal {
    /// Absolute value of the vertical axis
    VerticalAbs,
    /// Tri-axial vector magnitude
    VectorMagnitude,
}

/// Raw-to-epoch aggregation service
#[derive(Debug, Clone)]
pub struct EpochingService {
    epoch_seconds: f64,
    signal: EpochingSignal,
}

impl Default for EpochingService {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_SECONDS, EpochingSignal::VectorMagnitude)
    }
}

impl EpochingService {
    pub fn new(epoch_seconds: f64, signal: EpochingSignal) -> Self {
        Self {
            epoch_seconds,
            signal,
        }
    }

    pub fn epoch_seconds(&self) -> f64 {
        self.epoch_seconds
    }

    /// Aggregate a raw acceleration table into (timestamp, activity) epochs
    ///
    /// Fails when axis or timestamp columns are missing or when the
    /// timestamps cannot be resampled (non-monotonic input).
    pub fn epoch(&self, table: &SampleTable) -> Result<(SampleTable, Vec<Warning>), ScoreError> {
        let mut warnings = Vec::new();

        let axes = table
            .axes()
            .map_err(|e| ScoreError::EpochingError(e.to_string()))?;
        if let Some(col) = &axes.promoted_from {
            warnings.push(Warning::PromotedSingleAxis(col.clone()));
        }

        let timestamps = table.timestamps().ok_or_else(|| {
            ScoreError::EpochingError("raw input has no timestamp column".to_string())
        })?;

        let signal: Vec<f64> = match self.signal {
            EpochingSignal::VerticalAbs => (0..axes.len()).map(|i| axes.get(i).2.abs()).collect(),
            EpochingSignal::VectorMagnitude => (0..axes.len())
                .map(|i| {
                    let (x, y, z) = axes.get(i);
                    (x * x + y * y + z * z).sqrt()
                })
                .collect(),
        };

        let (epoch_ts, sums) =
            resample_epochs(timestamps, &signal, self.epoch_seconds, Aggregate::Sum)
                .map_err(|e| ScoreError::EpochingError(e.to_string()))?;

        // Counts are integers and never negative
        let counts: Vec<f64> = sums.iter().map(|s| s.round().max(0.0)).collect();

        let mut out = SampleTable::with_timestamps(epoch_ts);
        out.add_column("activity", counts)?;
        Ok((out, warnings))
    }
}
