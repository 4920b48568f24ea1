//! Nonwear detection (raw-signal regime)
//!
//! Device-removal intervals show near-zero variance and range on all axes.
//! Per medium-length epoch and per axis, an axis votes nonwear when its
//! peak-to-peak range is below a range threshold and, only then, its sample
//! standard deviation is below an SD threshold; two or more axis votes mark
//! the epoch nonwear. Consecutive nonwear epochs merge into periods.
//!
//! Nonwear runs independently of sleep classification and is consumed
//! alongside it.

use crate::error::ScoreError;
use crate::table::SampleTable;
use crate::types::NonwearPeriod;
use chrono::{DateTime, Duration, Utc};

/// Default medium-epoch length (minutes)
pub const DEFAULT_EPOCH_MINUTES: f64 = 15.0;
/// Default peak-to-peak range threshold (g)
pub const DEFAULT_RANGE_THRESHOLD: f64 = 0.05;
/// Default standard-deviation threshold (g)
pub const DEFAULT_SD_THRESHOLD: f64 = 0.013;
/// Axis votes required to mark an epoch nonwear
const MIN_AXIS_VOTES: u8 = 2;

/// Per-epoch nonwear detection output
#[derive(Debug, Clone)]
pub struct NonwearResult {
    /// Merged nonwear periods
    pub periods: Vec<NonwearPeriod>,
    /// Per-epoch axis-vote score (0-3)
    pub epoch_scores: Vec<u8>,
    /// Start timestamp of each medium epoch
    pub epoch_timestamps: Vec<DateTime<Utc>>,
}

/// Range/SD nonwear detector over raw tri-axial acceleration
#[derive(Debug, Clone)]
pub struct NonwearDetector {
    epoch_minutes: f64,
    range_threshold: f64,
    sd_threshold: f64,
}

impl Default for NonwearDetector {
    fn default() -> Self {
        Self {
            epoch_minutes: DEFAULT_EPOCH_MINUTES,
            range_threshold: DEFAULT_RANGE_THRESHOLD,
            sd_threshold: DEFAULT_SD_THRESHOLD,
        }
    }
}

impl NonwearDetector {
    pub fn new(epoch_minutes: f64, range_threshold: f64, sd_threshold: f64) -> Self {
        Self {
            epoch_minutes,
            range_threshold,
            sd_threshold,
        }
    }

    /// Algorithm identifier recorded on produced periods
    pub fn id(&self) -> &'static str {
        "nonwear_range_sd"
    }

    /// Detect nonwear periods in a raw acceleration table
    pub fn detect(&self, table: &SampleTable) -> Result<NonwearResult, ScoreError> {
        let axes = table.axes()?;
        let timestamps = table.timestamps().ok_or_else(|| {
            ScoreError::InvalidInput("raw input has no timestamp column".to_string())
        })?;
        if timestamps.is_empty() {
            return Err(ScoreError::InvalidInput("input is empty".to_string()));
        }

        let epoch_duration = Duration::milliseconds((self.epoch_minutes * 60_000.0) as i64);
        let start = timestamps[0];

        // Bucket sample indices into medium epochs
        let mut epoch_scores = Vec::new();
        let mut epoch_timestamps = Vec::new();
        let mut epoch_start_idx = 0;
        let mut epoch_idx: i64 = 0;

        for i in 0..=timestamps.len() {
            let bucket = if i < timestamps.len() {
                ((timestamps[i] - start).num_milliseconds())
                    / epoch_duration.num_milliseconds().max(1)
            } else {
                i64::MAX
            };
            if bucket == epoch_idx {
                continue;
            }

            let range = epoch_start_idx..i;
            if !range.is_empty() {
                let mut votes: u8 = 0;
                for axis in [axes.x, axes.y, axes.z] {
                    let samples: Vec<f64> = if axis.is_empty() {
                        vec![0.0; range.len()]
                    } else {
                        axis[range.clone()].to_vec()
                    };
                    if axis_votes_nonwear(&samples, self.range_threshold, self.sd_threshold) {
                        votes += 1;
                    }
                }
                epoch_scores.push(votes);
                epoch_timestamps.push(start + epoch_duration * epoch_idx as i32);
            }

            epoch_start_idx = i;
            if i < timestamps.len() {
                epoch_idx = bucket;
            }
        }

        let periods = merge_periods(
            &epoch_scores,
            &epoch_timestamps,
            epoch_duration,
            self.epoch_minutes,
            self.id(),
        );

        Ok(NonwearResult {
            periods,
            epoch_scores,
            epoch_timestamps,
        })
    }
}

/// Axis-level vote: range below threshold and (only then) SD below threshold
///
/// The SD pass is skipped unless the cheap range check already passed.
fn axis_votes_nonwear(samples: &[f64], range_threshold: f64, sd_threshold: f64) -> bool {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &s in samples {
        min = min.min(s);
        max = max.max(s);
    }
    if max - min >= range_threshold {
        return false;
    }

    if samples.len() < 2 {
        return true;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance =
        samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt() < sd_threshold
}

/// Merge consecutive nonwear epochs into periods
fn merge_periods(
    scores: &[u8],
    timestamps: &[DateTime<Utc>],
    epoch_duration: Duration,
    epoch_minutes: f64,
    source: &str,
) -> Vec<NonwearPeriod> {
    let mut periods: Vec<NonwearPeriod> = Vec::new();
    for (i, &score) in scores.iter().enumerate() {
        if score < MIN_AXIS_VOTES {
            continue;
        }
        match periods.last_mut() {
            Some(last) if last.end_index + 1 == i => {
                last.end_index = i;
                last.end_time = timestamps[i] + epoch_duration;
                last.duration_minutes += epoch_minutes;
            }
            _ => periods.push(NonwearPeriod {
                start_index: i,
                end_index: i,
                start_time: timestamps[i],
                end_time: timestamps[i] + epoch_duration,
                duration_minutes: epoch_minutes,
                source: source.to_string(),
            }),
        }
    }
    periods
}
