//! Sustained-inactivity-bout classifier (raw signal)
//!
//! van Hees et al. (2015): posture stability as a sleep proxy. The arm
//! angle is computed per sample, median-resampled to short epochs, and
//! differenced; epochs whose absolute angle change exceeds a threshold are
//! posture changes. Gaps between consecutive posture changes longer than a
//! minimum duration are sustained inactivity bouts and classified as sleep.
//! The short-epoch classification is majority-resampled to 60 s.

use super::{ParamUpdate, Parameter, SleepWakeAlgorithm};
use crate::detect::EPOCH_INTERVAL_BAND;
use crate::error::ScoreError;
use crate::signal::{arm_angle, majority_resample, resample_epochs, Aggregate};
use crate::table::SampleTable;
use crate::types::AlgorithmDataRequirement;
use chrono::{DateTime, Utc};

/// Default short-epoch length for angle resampling
pub const DEFAULT_EPOCH_SECONDS: f64 = 5.0;
/// Default posture-change angle threshold (degrees)
pub const DEFAULT_ANGLE_THRESHOLD: f64 = 5.0;
/// Default minimum gap between posture changes to count as sleep (minutes)
pub const DEFAULT_MIN_GAP_MINUTES: f64 = 5.0;
/// Output cadence
const OUTPUT_EPOCH_SECONDS: f64 = 60.0;

/// Below this many posture changes, the whole segment is classified at once
const FEW_CHANGES_SLEEP_LIMIT: usize = 10;

/// Posture-stability sleep/wake classifier for raw tri-axial data
#[derive(Debug, Clone)]
pub struct SibClassifier {
    epoch_seconds: f64,
    angle_threshold: f64,
    min_gap_minutes: f64,
}

impl Default for SibClassifier {
    fn default() -> Self {
        Self {
            epoch_seconds: DEFAULT_EPOCH_SECONDS,
            angle_threshold: DEFAULT_ANGLE_THRESHOLD,
            min_gap_minutes: DEFAULT_MIN_GAP_MINUTES,
        }
    }
}

impl SibClassifier {
    pub fn new(epoch_seconds: f64, angle_threshold: f64, min_gap_minutes: f64) -> Self {
        Self {
            epoch_seconds,
            angle_threshold,
            min_gap_minutes,
        }
    }

    fn gap_epochs(&self) -> usize {
        (self.min_gap_minutes * 60.0 / self.epoch_seconds).round() as usize
    }

    /// Derive the short-epoch angle-change series from a raw table
    ///
    /// Returns (epoch timestamps, angle-change values); the change series is
    /// one shorter than the epoch grid and is padded with a leading zero so
    /// both align.
    pub fn angle_change_series(
        &self,
        table: &SampleTable,
    ) -> Result<(Vec<DateTime<Utc>>, Vec<f64>), ScoreError> {
        reject_epoch_shaped(table)?;
        let axes = table.axes()?;
        let timestamps = table.timestamps().ok_or_else(|| {
            ScoreError::InvalidInput("raw input has no timestamp column".to_string())
        })?;

        let x: Vec<f64> = (0..axes.len()).map(|i| axes.get(i).0).collect();
        let y: Vec<f64> = (0..axes.len()).map(|i| axes.get(i).1).collect();
        let angle = arm_angle(&x, &y, axes.z);

        let (epoch_ts, epoch_angle) =
            resample_epochs(timestamps, &angle, self.epoch_seconds, Aggregate::Median)?;

        let mut change = Vec::with_capacity(epoch_angle.len());
        change.push(0.0);
        for w in epoch_angle.windows(2) {
            change.push((w[1] - w[0]).abs());
        }
        Ok((epoch_ts, change))
    }

    /// Classify a short-epoch angle-change series into sleep/wake
    ///
    /// Index i holds the change between epochs i-1 and i (index 0 is the
    /// zero pad). Output is at the same short-epoch cadence.
    fn classify_changes(&self, change: &[f64]) -> Vec<u8> {
        let changes: Vec<usize> = change
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > self.angle_threshold)
            .map(|(i, _)| i)
            .collect();

        if changes.len() < 2 {
            // Too few posture changes to delimit bouts; classify the whole
            // segment by the posture-change count.
            let all = u8::from(changes.len() < FEW_CHANGES_SLEEP_LIMIT);
            return vec![all; change.len()];
        }

        let gap_epochs = self.gap_epochs();
        let mut scores = vec![0u8; change.len()];
        for pair in changes.windows(2) {
            let (c1, c2) = (pair[0], pair[1]);
            if c2 - c1 > gap_epochs {
                for score in scores.iter_mut().take(c2).skip(c1 + 1) {
                    *score = 1;
                }
            }
        }
        scores
    }
}

/// Reject input that looks like pre-aggregated epoch data
fn reject_epoch_shaped(table: &SampleTable) -> Result<(), ScoreError> {
    if table.axis_column_names().is_none() && table.activity_column_name().is_some() {
        return Err(ScoreError::InvalidInput(
            "input has an activity-count column; SIB requires raw tri-axial acceleration"
                .to_string(),
        ));
    }
    if let Some(interval) = table.median_interval_seconds() {
        let (lo, hi) = EPOCH_INTERVAL_BAND;
        if interval >= lo && interval <= hi {
            return Err(ScoreError::InvalidInput(format!(
                "median sample interval {interval:.1}s looks like epoch data; SIB requires raw acceleration"
            )));
        }
    }
    Ok(())
}

impl SleepWakeAlgorithm for SibClassifier {
    fn id(&self) -> &'static str {
        "sib"
    }

    fn name(&self) -> &'static str {
        "Sustained inactivity bouts (van Hees)"
    }

    fn requirement(&self) -> AlgorithmDataRequirement {
        AlgorithmDataRequirement::RawData
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "epoch_seconds",
                value: self.epoch_seconds,
            },
            Parameter {
                name: "angle_threshold",
                value: self.angle_threshold,
            },
            Parameter {
                name: "min_gap_minutes",
                value: self.min_gap_minutes,
            },
        ]
    }

    fn with_overrides(&self, overrides: &[(String, f64)]) -> Result<ParamUpdate, ScoreError> {
        let mut next = self.clone();
        for (key, value) in overrides {
            if *value <= 0.0 {
                return Err(ScoreError::InvalidInput(format!(
                    "{key} must be positive, got {value}"
                )));
            }
            match key.as_str() {
                "epoch_seconds" => next.epoch_seconds = *value,
                "angle_threshold" => next.angle_threshold = *value,
                "min_gap_minutes" => next.min_gap_minutes = *value,
                _ => {
                    return Err(ScoreError::UnknownParameter {
                        algorithm: self.id().to_string(),
                        parameter: key.clone(),
                    });
                }
            }
        }
        Ok(ParamUpdate {
            algorithm: Box::new(next),
            warnings: Vec::new(),
        })
    }

    fn score(&self, table: &SampleTable) -> Result<SampleTable, ScoreError> {
        let (epoch_ts, change) = self.angle_change_series(table)?;
        if change.is_empty() {
            return Err(ScoreError::InvalidInput(
                "no samples left after angle resampling".to_string(),
            ));
        }
        let scores5 = self.classify_changes(&change);

        let factor = (OUTPUT_EPOCH_SECONDS / self.epoch_seconds).round() as usize;
        let scores60 = majority_resample(&scores5, factor);

        let out_ts: Vec<DateTime<Utc>> = epoch_ts.iter().step_by(factor.max(1)).copied().collect();
        let change60: Vec<f64> = change
            .chunks(factor.max(1))
            .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
            .collect();

        let mut out = SampleTable::with_timestamps(out_ts);
        out.add_column("angle_change", change60)?;
        out.add_column(
            crate::table::SCORE_COLUMN,
            scores60.into_iter().map(f64::from).collect(),
        )?;
        Ok(out)
    }

    /// Classify a short-epoch angle-change series directly
    fn score_array(&self, values: &[f64], epoch_seconds: f64) -> Result<Vec<u8>, ScoreError> {
        if (epoch_seconds - self.epoch_seconds).abs() > 1e-6 {
            return Err(ScoreError::InvalidInput(format!(
                "angle-change series must be at {}s cadence, got {epoch_seconds}s",
                self.epoch_seconds
            )));
        }
        if values.iter().any(|v| v.is_nan() || v.is_infinite()) {
            return Err(ScoreError::InvalidInput(
                "angle-change series contains non-finite values".to_string(),
            ));
        }
        Ok(self.classify_changes(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    /// Raw table at 1 Hz with the given z-axis signal (x = y = 0.1)
    fn make_raw_table(z: Vec<f64>) -> SampleTable {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let n = z.len();
        let timestamps: Vec<DateTime<Utc>> =
            (0..n).map(|i| start + Duration::seconds(i as i64)).collect();
        let mut table = SampleTable::with_timestamps(timestamps);
        table.add_column("x", vec![0.1; n]).unwrap();
        table.add_column("y", vec![0.1; n]).unwrap();
        table.add_column("z", z).unwrap();
        table
    }

    #[test]
    fn test_flat_signal_is_all_sleep() {
        // Perfectly still device: no posture changes at any length
        let table = make_raw_table(vec![0.7; 1800]);
        let out = SibClassifier::default().score(&table).unwrap();
        let scores = out.column("sleep_score").unwrap();
        assert!(!scores.is_empty());
        assert!(scores.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_score_array_flat_is_all_sleep() {
        let change = vec![0.0; 720];
        let scores = SibClassifier::default().score_array(&change, 5.0).unwrap();
        assert_eq!(scores, vec![1; 720]);
    }

    #[test]
    fn test_long_gap_between_changes_is_sleep() {
        // Changes at indices 10 and 100: gap of 90 epochs (7.5 min) > 60
        let mut change = vec![0.0; 200];
        change[10] = 20.0;
        change[100] = 20.0;
        // Need a third change so the few-changes path is not taken
        change[110] = 20.0;

        let scores = SibClassifier::default().score_array(&change, 5.0).unwrap();
        // Gap interior is sleep
        assert!(scores[11..100].iter().all(|&s| s == 1));
        // The short 10-epoch gap after index 100 stays wake
        assert!(scores[101..110].iter().all(|&s| s == 0));
        // Posture-change epochs themselves are wake
        assert_eq!(scores[10], 0);
        assert_eq!(scores[100], 0);
    }

    #[test]
    fn test_rejects_epoch_shaped_input() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let timestamps: Vec<DateTime<Utc>> = (0..10)
            .map(|i| start + Duration::seconds(60 * i as i64))
            .collect();
        let mut table = SampleTable::with_timestamps(timestamps);
        table.add_column("activity", vec![0.0; 10]).unwrap();

        assert!(SibClassifier::default().score(&table).is_err());
    }

    #[test]
    fn test_output_is_minute_cadence() {
        // 10 minutes at 1 Hz: 600 samples -> 120 5s epochs -> 10 minute epochs
        let table = make_raw_table(vec![0.7; 600]);
        let out = SibClassifier::default().score(&table).unwrap();
        assert_eq!(out.column("sleep_score").unwrap().len(), 10);
        assert!(out.column("angle_change").is_some());
        let ts = out.timestamps().unwrap();
        assert_eq!(ts[1] - ts[0], Duration::seconds(60));
    }

    #[test]
    fn test_override_angle_threshold() {
        let update = SibClassifier::default()
            .with_overrides(&[("angle_threshold".to_string(), 3.0)])
            .unwrap();
        assert!(update
            .algorithm
            .parameters()
            .iter()
            .any(|p| p.name == "angle_threshold" && (p.value - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        assert!(matches!(
            SibClassifier::default().with_overrides(&[("frequency".to_string(), 1.0)]),
            Err(ScoreError::UnknownParameter { .. })
        ));
    }
}
