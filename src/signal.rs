//! Angle and epoch signal utilities
//!
//! Shared numeric building blocks for the raw-data algorithms:
//! - per-sample arm angle from tri-axial acceleration
//! - resampling a timestamped series to fixed-length epochs
//! - centered rolling median and interpolated percentiles
//! - noon-to-noon day segmentation
//! - majority-vote resampling of binary series

use crate::error::ScoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Aggregation rule for epoch resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
    Mean,
    Median,
}

/// A contiguous noon-to-noon day segment of a recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySegment {
    /// YYYY-MM-DD of the noon-shifted date
    pub label: String,
    /// Sample index range within the recording
    pub range: Range<usize>,
}

/// Arm angle per sample, in degrees: atan2(vertical, sqrt(x^2 + y^2))
///
/// Stable during stillness, variable during movement. The vertical axis is
/// z by device convention.
pub fn arm_angle(x: &[f64], y: &[f64], z: &[f64]) -> Vec<f64> {
    (0..z.len())
        .map(|i| {
            let xi = x.get(i).copied().unwrap_or(0.0);
            let yi = y.get(i).copied().unwrap_or(0.0);
            let zi = z[i];
            zi.atan2((xi * xi + yi * yi).sqrt()).to_degrees()
        })
        .collect()
}

/// Resample a timestamped series to fixed-length epochs
///
/// Buckets are anchored at the first timestamp; empty buckets are dropped so
/// sparse input cannot manufacture values. Timestamps must be strictly
/// increasing.
pub fn resample_epochs(
    timestamps: &[DateTime<Utc>],
    values: &[f64],
    epoch_seconds: f64,
    aggregate: Aggregate,
) -> Result<(Vec<DateTime<Utc>>, Vec<f64>), ScoreError> {
    if timestamps.len() != values.len() {
        return Err(ScoreError::InvalidInput(format!(
            "timestamp length {} does not match value length {}",
            timestamps.len(),
            values.len()
        )));
    }
    if epoch_seconds <= 0.0 {
        return Err(ScoreError::InvalidInput(format!(
            "epoch length must be positive, got {epoch_seconds}"
        )));
    }
    if timestamps.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    for w in timestamps.windows(2) {
        if w[1] <= w[0] {
            return Err(ScoreError::InvalidInput(format!(
                "timestamps are not strictly increasing at {}",
                w[1]
            )));
        }
    }

    let start = timestamps[0];
    let epoch_ms = (epoch_seconds * 1000.0).round() as i64;

    let mut out_ts = Vec::new();
    let mut out_values = Vec::new();
    let mut bucket: Vec<f64> = Vec::new();
    let mut current_bucket: i64 = 0;

    let flush = |bucket: &mut Vec<f64>,
                 bucket_idx: i64,
                 out_ts: &mut Vec<DateTime<Utc>>,
                 out_values: &mut Vec<f64>| {
        if bucket.is_empty() {
            return;
        }
        out_ts.push(start + Duration::milliseconds(bucket_idx * epoch_ms));
        out_values.push(aggregate_values(bucket, aggregate));
        bucket.clear();
    };

    for (ts, value) in timestamps.iter().zip(values) {
        let offset_ms = (*ts - start).num_milliseconds();
        let bucket_idx = offset_ms / epoch_ms;
        if bucket_idx != current_bucket {
            flush(&mut bucket, current_bucket, &mut out_ts, &mut out_values);
            current_bucket = bucket_idx;
        }
        bucket.push(*value);
    }
    flush(&mut bucket, current_bucket, &mut out_ts, &mut out_values);

    Ok((out_ts, out_values))
}

fn aggregate_values(values: &[f64], aggregate: Aggregate) -> f64 {
    match aggregate {
        Aggregate::Sum => values.iter().sum(),
        Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregate::Median => median(values),
    }
}

/// Median of a slice (average of the middle pair for even lengths)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Centered rolling median with truncated edges
///
/// NaN input samples are excluded from each window; a window with no valid
/// samples yields NaN.
pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let half = window.max(1) / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            let valid: Vec<f64> = values[lo..hi].iter().copied().filter(|v| !v.is_nan()).collect();
            median(&valid)
        })
        .collect()
}

/// Percentile (0..=1) with linear interpolation between order statistics
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Split a multi-day series into contiguous noon-to-noon day segments
///
/// Each sample belongs to the day of (timestamp - 12h), so an evening and
/// the following morning land in the same segment.
pub fn noon_to_noon_segments(timestamps: &[DateTime<Utc>]) -> Vec<DaySegment> {
    let mut segments: Vec<DaySegment> = Vec::new();
    for (i, ts) in timestamps.iter().enumerate() {
        let label = (*ts - Duration::hours(12)).date_naive().to_string();
        match segments.last_mut() {
            Some(last) if last.label == label => last.range.end = i + 1,
            _ => segments.push(DaySegment {
                label,
                range: i..i + 1,
            }),
        }
    }
    segments
}

/// Majority-vote resample a binary series by an integer factor
///
/// Each output epoch covers `factor` input epochs (the tail group may be
/// shorter); mean >= 0.5 yields 1.
pub fn majority_resample(binary: &[u8], factor: usize) -> Vec<u8> {
    if factor <= 1 {
        return binary.to_vec();
    }
    binary
        .chunks(factor)
        .map(|chunk| {
            let mean = chunk.iter().map(|&v| v as f64).sum::<f64>() / chunk.len() as f64;
            u8::from(mean >= 0.5)
        })
        .collect()
}
