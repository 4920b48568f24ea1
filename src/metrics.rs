//! Sleep metrics calculation
//!
//! Turns classified epochs plus a resolved period into the clinical summary
//! statistics: duration, efficiency, awakenings, and fragmentation. Formula
//! conventions follow the reference actigraphy definitions: sleep-onset
//! latency is zero by definition, WASO is TIB minus TST, and the combined
//! fragmentation index is the sum of the movement and fragmentation
//! indices.

use crate::error::ScoreError;
use crate::types::{SleepPeriodMetrics, Warning};
use chrono::{DateTime, Utc};

/// Relative deviation of the observed epoch interval tolerated before a
/// cadence warning is raised
const CADENCE_WARNING_FRACTION: f64 = 0.1;

/// Sleep metrics calculator
pub struct SleepMetricsCalculator;

impl SleepMetricsCalculator {
    /// Compute metrics for the period `[onset_idx, offset_idx]` (inclusive)
    ///
    /// `scores` is the binary sleep/wake series, `activity` the matching
    /// activity counts, `epoch_seconds` the declared epoch duration.
    /// Timestamps, when given, are only used to verify the declared cadence.
    pub fn calculate(
        scores: &[u8],
        activity: &[f64],
        timestamps: Option<&[DateTime<Utc>]>,
        onset_idx: usize,
        offset_idx: usize,
        epoch_seconds: f64,
    ) -> Result<(SleepPeriodMetrics, Vec<Warning>), ScoreError> {
        if scores.len() != activity.len() {
            return Err(ScoreError::MetricsError(format!(
                "score length {} does not match activity length {}",
                scores.len(),
                activity.len()
            )));
        }
        if let Some(ts) = timestamps {
            if ts.len() != scores.len() {
                return Err(ScoreError::MetricsError(format!(
                    "timestamp length {} does not match score length {}",
                    ts.len(),
                    scores.len()
                )));
            }
        }
        if onset_idx >= offset_idx {
            return Err(ScoreError::MetricsError(format!(
                "onset index {onset_idx} is not before offset index {offset_idx}"
            )));
        }
        if offset_idx >= scores.len() {
            return Err(ScoreError::MetricsError(format!(
                "offset index {offset_idx} is out of range for {} epochs",
                scores.len()
            )));
        }
        if epoch_seconds <= 0.0 {
            return Err(ScoreError::MetricsError(format!(
                "epoch duration must be positive, got {epoch_seconds}"
            )));
        }
        if let Some(&bad) = scores.iter().find(|&&s| s > 1) {
            return Err(ScoreError::MetricsError(format!(
                "score series contains non-binary value {bad}"
            )));
        }

        let mut warnings = Vec::new();
        if let Some(ts) = timestamps {
            if ts.len() >= 2 {
                let observed = median_interval(ts);
                if (observed - epoch_seconds).abs() > epoch_seconds * CADENCE_WARNING_FRACTION {
                    warnings.push(Warning::EpochIntervalMismatch {
                        declared_seconds: epoch_seconds,
                        observed_seconds: observed,
                    });
                }
            }
        }

        let period_scores = &scores[onset_idx..=offset_idx];
        let period_activity = &activity[onset_idx..=offset_idx];
        let epoch_minutes = epoch_seconds / 60.0;

        let time_in_bed_minutes = period_scores.len() as f64 * epoch_minutes;
        let sleep_epochs = period_scores.iter().filter(|&&s| s == 1).count();
        let total_sleep_minutes = sleep_epochs as f64 * epoch_minutes;
        let waso_minutes = time_in_bed_minutes - total_sleep_minutes;

        let awakenings = interior_wake_runs(period_scores);
        let mean_awakening_minutes = if awakenings > 0 {
            waso_minutes / awakenings as f64
        } else {
            0.0
        };

        let efficiency_pct = if time_in_bed_minutes > 0.0 {
            total_sleep_minutes / time_in_bed_minutes * 100.0
        } else {
            0.0
        };

        let moving_epochs = period_activity.iter().filter(|&&a| a > 0.0).count();
        let movement_index_pct = moving_epochs as f64 / period_scores.len() as f64 * 100.0;

        let (bouts, one_epoch_bouts) = sleep_bouts(period_scores);
        let fragmentation_index_pct = if bouts > 0 {
            one_epoch_bouts as f64 / bouts as f64 * 100.0
        } else {
            0.0
        };

        let metrics = SleepPeriodMetrics {
            time_in_bed_minutes,
            total_sleep_minutes,
            sleep_onset_latency_minutes: 0.0,
            waso_minutes,
            awakenings,
            mean_awakening_minutes,
            efficiency_pct,
            movement_index_pct,
            fragmentation_index_pct,
            sleep_fragmentation_index_pct: movement_index_pct + fragmentation_index_pct,
        };
        Ok((metrics, warnings))
    }
}

fn median_interval(timestamps: &[DateTime<Utc>]) -> f64 {
    let mut deltas: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    deltas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = deltas.len() / 2;
    if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2.0
    } else {
        deltas[mid]
    }
}

/// Count wake runs strictly inside the period (runs touching either
/// boundary are settling/rising time, not awakenings)
fn interior_wake_runs(scores: &[u8]) -> u32 {
    let mut runs = 0u32;
    let mut run_start: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        match (s, run_start) {
            (0, None) => run_start = Some(i),
            (1, Some(start)) => {
                if start > 0 {
                    runs += 1;
                }
                run_start = None;
            }
            _ => {}
        }
    }
    // A trailing wake run touches the offset boundary and is not counted
    runs
}

/// (total sleep bouts, bouts exactly one epoch long)
fn sleep_bouts(scores: &[u8]) -> (u32, u32) {
    let mut bouts = 0u32;
    let mut short_bouts = 0u32;
    let mut length = 0usize;
    for &s in scores {
        if s == 1 {
            length += 1;
        } else if length > 0 {
            bouts += 1;
            if length == 1 {
                short_bouts += 1;
            }
            length = 0;
        }
    }
    if length > 0 {
        bouts += 1;
        if length == 1 {
            short_bouts += 1;
        }
    }
    (bouts, short_bouts)
}
