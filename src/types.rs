//! Core types for the actiscore scoring pipeline
//!
//! This module defines the value objects that flow between pipeline stages:
//! data-source classification, pipeline routing, sleep/nonwear periods,
//! derived metrics, and compatibility results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Classification of an input by origin and column shape
///
/// Determined once per input and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceType {
    /// Binary container recording (GT3X etc.), always raw acceleration
    RawBinary,
    /// Tabular data with three acceleration-axis columns
    RawTabular,
    /// Tabular data with a single pre-aggregated activity-count column
    EpochTabular,
}

impl DataSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::RawBinary => "raw_binary",
            DataSourceType::RawTabular => "raw_tabular",
            DataSourceType::EpochTabular => "epoch_tabular",
        }
    }

    /// True for raw acceleration sources (binary or tabular)
    pub fn is_raw(&self) -> bool {
        matches!(self, DataSourceType::RawBinary | DataSourceType::RawTabular)
    }

    /// True for pre-aggregated epoch sources
    pub fn is_epoched(&self) -> bool {
        matches!(self, DataSourceType::EpochTabular)
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// thiserror treats the `source`-named field of `ScoreError::Incompatible` as
// the error source, which requires this type to implement `Error`.
impl std::error::Error for DataSourceType {}

/// Data shape an algorithm requires; a fixed property of each classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmDataRequirement {
    /// Raw tri-axial acceleration at device sample rate
    RawData,
    /// Fixed-cadence activity-count epochs
    EpochData,
}

impl AlgorithmDataRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmDataRequirement::RawData => "raw",
            AlgorithmDataRequirement::EpochData => "epoch",
        }
    }
}

impl fmt::Display for AlgorithmDataRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing path resolved from (data source x algorithm requirement)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineType {
    /// Raw source, raw-requiring algorithm: classifier runs directly
    RawToRaw,
    /// Raw source, epoch-requiring algorithm: epoching runs first
    RawToEpoch,
    /// Epoch source, epoch-requiring algorithm: classifier runs directly
    EpochDirect,
    /// Epoch source, raw-requiring algorithm: terminal, never executed
    Incompatible,
}

impl PipelineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::RawToRaw => "raw_to_raw",
            PipelineType::RawToEpoch => "raw_to_epoch",
            PipelineType::EpochDirect => "epoch_direct",
            PipelineType::Incompatible => "incompatible",
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a registered algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmCategory {
    /// Per-epoch binary sleep/wake classification
    SleepWake,
    /// Main sleep-period boundary detection
    SleepPeriod,
}

/// Sleep period category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepCategory {
    /// Main nightly sleep episode
    MainSleep,
    /// Daytime nap
    Nap,
}

/// A resolved (or partially resolved) sleep period
///
/// Owned by the caller; one active period per analysis slot, replaced on
/// re-scoring. Once both endpoints are set, onset < offset holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepPeriod {
    /// Identity of this period record
    pub id: Uuid,
    /// Sleep onset (UTC)
    pub onset: DateTime<Utc>,
    /// Sleep offset (UTC); None until the period is complete
    pub offset: Option<DateTime<Utc>>,
    /// Epoch index of onset in the scored series
    pub onset_index: usize,
    /// Epoch index of offset; None until complete
    pub offset_index: Option<usize>,
    /// Main sleep vs. nap
    pub category: SleepCategory,
}

impl SleepPeriod {
    /// Open a new period at the given onset
    pub fn new(onset: DateTime<Utc>, onset_index: usize, category: SleepCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            onset,
            offset: None,
            onset_index,
            offset_index: None,
            category,
        }
    }

    /// Close the period, enforcing onset < offset
    pub fn complete(
        mut self,
        offset: DateTime<Utc>,
        offset_index: usize,
    ) -> Result<Self, crate::error::ScoreError> {
        if offset <= self.onset {
            return Err(crate::error::ScoreError::InvalidInput(format!(
                "sleep period offset {} is not after onset {}",
                offset, self.onset
            )));
        }
        self.offset = Some(offset);
        self.offset_index = Some(offset_index);
        Ok(self)
    }

    /// True once both endpoints are set
    pub fn is_complete(&self) -> bool {
        self.offset.is_some()
    }

    /// Duration in minutes, if complete
    pub fn duration_minutes(&self) -> Option<f64> {
        self.offset
            .map(|off| (off - self.onset).num_seconds() as f64 / 60.0)
    }
}

/// A device-removal interval detected from raw signal statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonwearPeriod {
    /// First nonwear epoch index (medium-epoch grid)
    pub start_index: usize,
    /// Last nonwear epoch index (inclusive)
    pub end_index: usize,
    /// Start time (UTC)
    pub start_time: DateTime<Utc>,
    /// End time (UTC)
    pub end_time: DateTime<Utc>,
    /// Duration in minutes
    pub duration_minutes: f64,
    /// Identifier of the producing algorithm
    pub source: String,
}

/// A detected main-sleep window for one noon-to-noon day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SptWindow {
    /// Day label (YYYY-MM-DD of the noon-shifted date)
    pub day: String,
    /// Window onset (UTC)
    pub onset: DateTime<Utc>,
    /// Window offset (UTC)
    pub offset: DateTime<Utc>,
    /// Onset index in the short-epoch series
    pub onset_index: usize,
    /// Offset index in the short-epoch series (inclusive)
    pub offset_index: usize,
    /// Window duration in minutes
    pub duration_minutes: f64,
}

/// Summary sleep-quality statistics for one resolved period
///
/// Created once per resolved period, immutable, never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepPeriodMetrics {
    /// Time in bed (minutes): period length x epoch duration
    pub time_in_bed_minutes: f64,
    /// Total sleep time (minutes)
    pub total_sleep_minutes: f64,
    /// Sleep-onset latency (minutes); zero by convention
    pub sleep_onset_latency_minutes: f64,
    /// Wake after sleep onset (minutes)
    pub waso_minutes: f64,
    /// Number of contiguous wake runs strictly inside the period
    pub awakenings: u32,
    /// Average awakening length (minutes); zero when no awakenings
    pub mean_awakening_minutes: f64,
    /// Sleep efficiency (percent): TST / TIB x 100
    pub efficiency_pct: f64,
    /// Percentage of epochs with nonzero activity
    pub movement_index_pct: f64,
    /// Percentage of 1-epoch sleep bouts among all sleep bouts
    pub fragmentation_index_pct: f64,
    /// Movement index + fragmentation index
    pub sleep_fragmentation_index_pct: f64,
}

/// Compatibility verdict for (data source, algorithm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityStatus {
    /// Algorithm can run on this source directly
    Compatible,
    /// Raw source feeding an epoch-only algorithm; epoching required first
    RequiresPreprocessing,
    /// Epoch source feeding a raw-only algorithm; cannot run
    Incompatible,
}

/// Result of a compatibility check; computed on demand, not persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub status: CompatibilityStatus,
    /// Resolved pipeline type; None when incompatible
    pub pipeline: Option<PipelineType>,
    /// Human-readable reason
    pub reason: String,
    /// On incompatibility, algorithms sharing the source's requirement
    pub alternatives: Vec<String>,
}

/// Non-fatal degradations surfaced alongside results
///
/// Fallbacks are documented here instead of being silently absorbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum Warning {
    /// Timestamp column absent or ambiguous; epoch cadence assumed
    AssumedEpochCadence,
    /// 1-D raw input promoted to tri-axial with zero-filled axes
    PromotedSingleAxis(String),
    /// Score column located by fuzzy "contains 'score'" match
    FuzzyScoreColumn(String),
    /// Attempt to override a fixed published constant was ignored
    FixedParameterIgnored(String),
    /// Observed inter-epoch interval deviates from the declared duration
    EpochIntervalMismatch {
        declared_seconds: f64,
        observed_seconds: f64,
    },
    /// Sub-minute epochs were collapsed to 1-minute cadence by summation
    SubMinuteEpochsCollapsed { from_seconds: f64 },
}

impl Warning {
    /// Human-readable message for presentation layers
    pub fn message(&self) -> String {
        match self {
            Warning::AssumedEpochCadence => {
                "timestamp column absent or ambiguous; assuming epoch cadence".to_string()
            }
            Warning::PromotedSingleAxis(col) => {
                format!("single axis column '{col}' promoted to tri-axial with zero-filled axes")
            }
            Warning::FuzzyScoreColumn(col) => {
                format!("score column '{col}' located by fuzzy match")
            }
            Warning::FixedParameterIgnored(key) => {
                format!("parameter '{key}' is a fixed published constant; override ignored")
            }
            Warning::EpochIntervalMismatch {
                declared_seconds,
                observed_seconds,
            } => format!(
                "observed inter-epoch interval {observed_seconds:.1}s deviates from declared {declared_seconds:.1}s"
            ),
            Warning::SubMinuteEpochsCollapsed { from_seconds } => {
                format!("{from_seconds:.0}s epochs collapsed to 1-minute cadence by summation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_type_partition() {
        assert!(DataSourceType::RawBinary.is_raw());
        assert!(DataSourceType::RawTabular.is_raw());
        assert!(!DataSourceType::EpochTabular.is_raw());

        assert!(DataSourceType::EpochTabular.is_epoched());
        assert!(!DataSourceType::RawTabular.is_epoched());
        assert!(!DataSourceType::RawBinary.is_epoched());
    }

    #[test]
    fn test_sleep_period_completion() {
        let onset = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        let offset = Utc.with_ymd_and_hms(2024, 3, 11, 7, 0, 0).unwrap();

        let period = SleepPeriod::new(onset, 0, SleepCategory::MainSleep);
        assert!(!period.is_complete());
        assert!(period.duration_minutes().is_none());

        let period = period.complete(offset, 480).unwrap();
        assert!(period.is_complete());
        assert!((period.duration_minutes().unwrap() - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_period_rejects_inverted_endpoints() {
        let onset = Utc.with_ymd_and_hms(2024, 3, 11, 7, 0, 0).unwrap();
        let offset = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();

        let period = SleepPeriod::new(onset, 0, SleepCategory::MainSleep);
        assert!(period.complete(offset, 480).is_err());
    }

    #[test]
    fn test_warning_serialization() {
        let warning = Warning::FuzzyScoreColumn("my_score".to_string());
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("fuzzy_score_column"));
        assert!(json.contains("my_score"));
    }
}
