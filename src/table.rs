//! In-memory sample tables
//!
//! The engine consumes and produces column tables: an optional timestamp
//! vector plus ordered, named f64 columns. This is the exchange format with
//! the excluded import/export layers (decoded raw recordings come in as
//! (timestamp, x, y, z); scored output goes out as (timestamp, sleep_score)).

use crate::error::ScoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column-name sets recognized as tri-axial acceleration
pub const AXIS_COLUMN_SETS: [[&str; 3]; 4] = [
    ["x", "y", "z"],
    ["acc_x", "acc_y", "acc_z"],
    ["accel_x", "accel_y", "accel_z"],
    ["axis_x", "axis_y", "axis_z"],
];

/// Column names recognized as a pre-aggregated activity count
pub const ACTIVITY_COLUMNS: [&str; 6] = [
    "activity",
    "counts",
    "activity_counts",
    "vector_magnitude",
    "vm",
    "axis1",
];

/// Canonical name of the binary sleep/wake output column
pub const SCORE_COLUMN: &str = "sleep_score";

/// A named column of f64 values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Tri-axial acceleration slices resolved from a table
#[derive(Debug, Clone)]
pub struct Axes<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub z: &'a [f64],
    /// Name of the single column promoted to tri-axial, if any
    pub promoted_from: Option<String>,
}

impl<'a> Axes<'a> {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.z.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z.is_empty()
    }

    /// Sample at index i; zero-filled for promoted axes
    pub fn get(&self, i: usize) -> (f64, f64, f64) {
        let x = self.x.get(i).copied().unwrap_or(0.0);
        let y = self.y.get(i).copied().unwrap_or(0.0);
        let z = self.z.get(i).copied().unwrap_or(0.0);
        (x, y, z)
    }
}

/// Ordered column table with an optional timestamp vector
///
/// Invariant: all columns (and timestamps, when present) have equal length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleTable {
    timestamps: Option<Vec<DateTime<Utc>>>,
    columns: Vec<Column>,
}

impl SampleTable {
    /// Create an empty table without timestamps
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with a timestamp vector
    pub fn with_timestamps(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps: Some(timestamps),
            columns: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        if let Some(ts) = &self.timestamps {
            ts.len()
        } else {
            self.columns.first().map_or(0, |c| c.values.len())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a column, enforcing uniform length
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), ScoreError> {
        let expected = self.len();
        if (expected > 0 || self.timestamps.is_some() || !self.columns.is_empty())
            && values.len() != expected
        {
            return Err(ScoreError::InvalidInput(format!(
                "column length {} does not match table length {}",
                values.len(),
                expected
            )));
        }
        self.columns.push(Column {
            name: name.into(),
            values,
        });
        Ok(())
    }

    /// Timestamps, if present
    pub fn timestamps(&self) -> Option<&[DateTime<Utc>]> {
        self.timestamps.as_deref()
    }

    /// Column values by case-insensitive name
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.values.as_slice())
    }

    /// All column names in insertion order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Locate the binary score column: exact name first, then the first
    /// column whose name contains "score". Returns (name, fuzzy).
    pub fn find_score_column(&self) -> Option<(String, bool)> {
        if self.column(SCORE_COLUMN).is_some() {
            return Some((SCORE_COLUMN.to_string(), false));
        }
        self.columns
            .iter()
            .find(|c| c.name.to_ascii_lowercase().contains("score"))
            .map(|c| (c.name.clone(), true))
    }

    /// Names of the tri-axial axis columns present, if a full set exists
    pub fn axis_column_names(&self) -> Option<[String; 3]> {
        for set in AXIS_COLUMN_SETS {
            if set.iter().all(|n| self.column(n).is_some()) {
                return Some([set[0].to_string(), set[1].to_string(), set[2].to_string()]);
            }
        }
        None
    }

    /// Name of the activity-count column, if present
    pub fn activity_column_name(&self) -> Option<String> {
        ACTIVITY_COLUMNS
            .iter()
            .find(|n| self.column(n).is_some())
            .map(|n| n.to_string())
    }

    /// Resolve tri-axial acceleration, promoting a lone axis column to
    /// tri-axial with zero-filled siblings when necessary
    pub fn axes(&self) -> Result<Axes<'_>, ScoreError> {
        if let Some([nx, ny, nz]) = self.axis_column_names() {
            let x = self.column(&nx).ok_or_else(|| {
                ScoreError::InvalidInput(format!("axis column '{nx}' disappeared"))
            })?;
            let y = self.column(&ny).ok_or_else(|| {
                ScoreError::InvalidInput(format!("axis column '{ny}' disappeared"))
            })?;
            let z = self.column(&nz).ok_or_else(|| {
                ScoreError::InvalidInput(format!("axis column '{nz}' disappeared"))
            })?;
            return Ok(Axes {
                x,
                y,
                z,
                promoted_from: None,
            });
        }

        // Degraded fallback: a single axis-like column stands in for the
        // vertical axis, the other two are zero.
        for set in AXIS_COLUMN_SETS {
            for name in set {
                if let Some(values) = self.column(name) {
                    return Ok(Axes {
                        x: &[],
                        y: &[],
                        z: values,
                        promoted_from: Some(name.to_string()),
                    });
                }
            }
        }

        Err(ScoreError::InvalidInput(format!(
            "no acceleration axis columns found (columns: {:?})",
            self.column_names()
        )))
    }

    /// Median inter-sample interval in seconds, if timestamps are usable
    pub fn median_interval_seconds(&self) -> Option<f64> {
        let ts = self.timestamps.as_ref()?;
        if ts.len() < 2 {
            return None;
        }
        let mut deltas: Vec<f64> = ts
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
            .collect();
        deltas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = deltas.len() / 2;
        if deltas.len() % 2 == 0 {
            Some((deltas[mid - 1] + deltas[mid]) / 2.0)
        } else {
            Some(deltas[mid])
        }
    }

    /// Export the table as a JSON string
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_timestamps(n: usize, step_seconds: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::seconds(step_seconds * i as i64))
            .collect()
    }

    #[test]
    fn test_uniform_length_enforced() {
        let mut table = SampleTable::with_timestamps(make_timestamps(4, 60));
        assert!(table.add_column("activity", vec![1.0, 2.0, 3.0, 4.0]).is_ok());
        assert!(table.add_column("short", vec![1.0]).is_err());
    }

    #[test]
    fn test_axis_recognition_case_insensitive() {
        let mut table = SampleTable::new();
        table.add_column("Acc_X", vec![0.0]).unwrap();
        table.add_column("Acc_Y", vec![0.0]).unwrap();
        table.add_column("Acc_Z", vec![1.0]).unwrap();

        let axes = table.axes().unwrap();
        assert!(axes.promoted_from.is_none());
        assert_eq!(axes.z, &[1.0]);
    }

    #[test]
    fn test_single_axis_promotion() {
        let mut table = SampleTable::new();
        table.add_column("z", vec![1.0, 1.0]).unwrap();

        let axes = table.axes().unwrap();
        assert_eq!(axes.promoted_from.as_deref(), Some("z"));
        assert!(axes.x.is_empty());
        assert_eq!(axes.z.len(), 2);
    }

    #[test]
    fn test_score_column_lookup() {
        let mut table = SampleTable::new();
        table.add_column("activity", vec![0.0]).unwrap();
        assert!(table.find_score_column().is_none());

        table.add_column("my_score_v2", vec![1.0]).unwrap();
        let (name, fuzzy) = table.find_score_column().unwrap();
        assert_eq!(name, "my_score_v2");
        assert!(fuzzy);

        table.add_column(SCORE_COLUMN, vec![1.0]).unwrap();
        let (name, fuzzy) = table.find_score_column().unwrap();
        assert_eq!(name, SCORE_COLUMN);
        assert!(!fuzzy);
    }

    #[test]
    fn test_median_interval() {
        let table = SampleTable::with_timestamps(make_timestamps(5, 60));
        let interval = table.median_interval_seconds().unwrap();
        assert!((interval - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_round_trip() {
        let mut table = SampleTable::with_timestamps(make_timestamps(2, 60));
        table.add_column("activity", vec![3.0, 4.0]).unwrap();

        let json = table.to_json().unwrap();
        let back: SampleTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.column("activity").unwrap(), &[3.0, 4.0]);
    }
}
