//! Data-source detection
//!
//! Classifies an input (file path or in-memory table) as raw binary, raw
//! tabular, or epoch tabular. Detection runs once per input; ambiguous
//! shapes fail rather than guess, and degraded assumptions are surfaced as
//! warnings.

use crate::error::ScoreError;
use crate::table::SampleTable;
use crate::types::{DataSourceType, Warning};
use std::path::Path;

/// Median inter-sample interval band (seconds) that confirms 1-minute epochs
pub const EPOCH_INTERVAL_BAND: (f64, f64) = (50.0, 70.0);

/// File extensions of binary container recordings (decoded upstream)
const BINARY_EXTENSIONS: [&str; 2] = ["gt3x", "bin"];

/// Outcome of data-source detection
#[derive(Debug, Clone)]
pub struct DetectedSource {
    pub source: DataSourceType,
    pub warnings: Vec<Warning>,
}

/// Classify a file path by container format
///
/// Binary container formats always hold raw acceleration. Tabular files
/// must be loaded and classified by [`detect`].
pub fn detect_from_path(path: &Path) -> Option<DataSourceType> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if BINARY_EXTENSIONS.contains(&ext.as_str()) {
        Some(DataSourceType::RawBinary)
    } else {
        None
    }
}

/// Classify an in-memory table by its column pattern
///
/// Three acceleration-axis columns mean raw tabular data. A single
/// aggregated activity column means epoch data, confirmed by the median
/// inter-sample interval falling in the 1-minute band; an absent or
/// ambiguous timestamp column defaults to epoch with a warning.
pub fn detect(table: &SampleTable) -> Result<DetectedSource, ScoreError> {
    if table.axis_column_names().is_some() {
        return Ok(DetectedSource {
            source: DataSourceType::RawTabular,
            warnings: Vec::new(),
        });
    }

    if table.activity_column_name().is_some() {
        let mut warnings = Vec::new();
        match table.median_interval_seconds() {
            Some(interval) => {
                let (lo, hi) = EPOCH_INTERVAL_BAND;
                if interval < lo || interval > hi {
                    // Activity column present but cadence is off the 1-minute
                    // band; still epoch data, the classifiers will collapse
                    // or reject the cadence themselves.
                    warnings.push(Warning::EpochIntervalMismatch {
                        declared_seconds: 60.0,
                        observed_seconds: interval,
                    });
                }
            }
            None => warnings.push(Warning::AssumedEpochCadence),
        }
        return Ok(DetectedSource {
            source: DataSourceType::EpochTabular,
            warnings,
        });
    }

    Err(ScoreError::DetectionError {
        columns: table.column_names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn make_timestamps(n: usize, step_seconds: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        (0..n)
            .map(|i| start + Duration::seconds(step_seconds * i as i64))
            .collect()
    }

    #[test]
    fn test_binary_path_detection() {
        assert_eq!(
            detect_from_path(&PathBuf::from("subject01.gt3x")),
            Some(DataSourceType::RawBinary)
        );
        assert_eq!(
            detect_from_path(&PathBuf::from("SUBJECT01.GT3X")),
            Some(DataSourceType::RawBinary)
        );
        assert_eq!(detect_from_path(&PathBuf::from("subject01.csv")), None);
        assert_eq!(detect_from_path(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_raw_tabular_detection() {
        let mut table = SampleTable::with_timestamps(make_timestamps(4, 1));
        table.add_column("x", vec![0.0; 4]).unwrap();
        table.add_column("y", vec![0.0; 4]).unwrap();
        table.add_column("z", vec![1.0; 4]).unwrap();

        let detected = detect(&table).unwrap();
        assert_eq!(detected.source, DataSourceType::RawTabular);
        assert!(detected.warnings.is_empty());
    }

    #[test]
    fn test_epoch_tabular_confirmed_by_interval() {
        let mut table = SampleTable::with_timestamps(make_timestamps(5, 60));
        table.add_column("activity", vec![0.0; 5]).unwrap();

        let detected = detect(&table).unwrap();
        assert_eq!(detected.source, DataSourceType::EpochTabular);
        assert!(detected.warnings.is_empty());
    }

    #[test]
    fn test_epoch_tabular_without_timestamps_warns() {
        let mut table = SampleTable::new();
        table.add_column("counts", vec![0.0; 5]).unwrap();

        let detected = detect(&table).unwrap();
        assert_eq!(detected.source, DataSourceType::EpochTabular);
        assert_eq!(detected.warnings, vec![Warning::AssumedEpochCadence]);
    }

    #[test]
    fn test_epoch_tabular_off_band_warns() {
        let mut table = SampleTable::with_timestamps(make_timestamps(5, 30));
        table.add_column("activity", vec![0.0; 5]).unwrap();

        let detected = detect(&table).unwrap();
        assert_eq!(detected.source, DataSourceType::EpochTabular);
        assert!(matches!(
            detected.warnings[0],
            Warning::EpochIntervalMismatch { .. }
        ));
    }

    #[test]
    fn test_unrecognized_columns_fail() {
        let mut table = SampleTable::new();
        table.add_column("temperature", vec![36.5]).unwrap();
        table.add_column("lux", vec![120.0]).unwrap();

        match detect(&table) {
            Err(ScoreError::DetectionError { columns }) => {
                assert_eq!(columns, vec!["temperature", "lux"]);
            }
            other => panic!("expected DetectionError, got {other:?}"),
        }
    }
}
