//! Pipeline orchestration
//!
//! Top-level composition of the scoring engine: detect the input's data
//! shape, resolve compatibility against the registry, pick one of the four
//! processing paths, run epoching when required, invoke the classifier, and
//! return a uniform scored result. Incompatible combinations are refused
//! with a reason and alternatives; they never silently proceed.

use crate::detect;
use crate::epoching::EpochingService;
use crate::error::ScoreError;
use crate::registry::AlgorithmRegistry;
use crate::table::SampleTable;
use crate::types::{
    AlgorithmDataRequirement, CompatibilityResult, CompatibilityStatus, DataSourceType,
    PipelineType, Warning,
};
use serde::Serialize;

/// Resolve the processing path for (data source, algorithm requirement)
///
/// The only terminal combination is an epoch source feeding a raw-requiring
/// algorithm: epoch counts cannot be expanded back into raw acceleration.
pub fn determine_pipeline_type(
    source: DataSourceType,
    requirement: AlgorithmDataRequirement,
) -> PipelineType {
    match (source.is_raw(), requirement) {
        (true, AlgorithmDataRequirement::RawData) => PipelineType::RawToRaw,
        (true, AlgorithmDataRequirement::EpochData) => PipelineType::RawToEpoch,
        (false, AlgorithmDataRequirement::EpochData) => PipelineType::EpochDirect,
        (false, AlgorithmDataRequirement::RawData) => PipelineType::Incompatible,
    }
}

/// Scoring run summary emitted alongside the scored table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringSummary {
    pub epochs: usize,
    pub sleep_epochs: usize,
    pub sleep_fraction: f64,
}

/// Uniform output of one pipeline run
#[derive(Debug, Serialize)]
pub struct ScoringResult {
    /// Engine identity stamped on every export
    pub producer: &'static str,
    pub engine_version: &'static str,
    /// Algorithm that produced the scores
    pub algorithm: String,
    /// Detected input shape
    pub source: DataSourceType,
    /// Path that was executed
    pub pipeline: PipelineType,
    /// Scored table: input cadence plus the score column
    pub table: SampleTable,
    /// Name of the located score column
    pub score_column: String,
    pub summary: ScoringSummary,
    /// Non-fatal degradations encountered along the way
    pub warnings: Vec<Warning>,
}

impl ScoringResult {
    /// Export the result as a JSON string for persistence layers
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Top-level scoring pipeline
///
/// Read-only after construction; safe to share across worker threads
/// processing independent recordings.
pub struct ScoringPipeline {
    registry: AlgorithmRegistry,
    epoching: EpochingService,
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(AlgorithmRegistry::with_builtin(), EpochingService::default())
    }
}

impl ScoringPipeline {
    /// Build a pipeline around an explicit registry and epoching service
    pub fn new(registry: AlgorithmRegistry, epoching: EpochingService) -> Self {
        Self { registry, epoching }
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Compatibility check without executing anything
    pub fn check(
        &self,
        source: DataSourceType,
        algorithm_id: &str,
    ) -> Result<CompatibilityResult, ScoreError> {
        self.registry.check(source, algorithm_id)
    }

    /// Run the full pipeline: detect, validate, route, score, summarize
    pub fn process(
        &self,
        table: &SampleTable,
        algorithm_id: &str,
    ) -> Result<ScoringResult, ScoreError> {
        let detected = detect::detect(table)?;
        let mut warnings = detected.warnings;
        let source = detected.source;

        let compatibility = self.registry.check(source, algorithm_id)?;
        let descriptor = self.registry.describe(algorithm_id)?;
        if compatibility.status == CompatibilityStatus::Incompatible {
            return Err(ScoreError::Incompatible {
                algorithm: algorithm_id.to_string(),
                requirement: descriptor.requirement,
                source,
                reason: compatibility.reason,
                alternatives: compatibility.alternatives,
            });
        }

        let pipeline = determine_pipeline_type(source, descriptor.requirement);
        let algorithm = self.registry.create(algorithm_id)?;

        // The classifier is never invoked before epoching succeeds on the
        // raw-to-epoch path.
        let scored = match pipeline {
            PipelineType::RawToEpoch => {
                let (epochs, epoching_warnings) = self.epoching.epoch(table)?;
                warnings.extend(epoching_warnings);
                algorithm.score(&epochs)?
            }
            PipelineType::RawToRaw | PipelineType::EpochDirect => algorithm.score(table)?,
            PipelineType::Incompatible => unreachable!("refused above"),
        };

        // Epoch classifiers collapse sub-minute cadence by summation;
        // surface that alongside the detector's interval warning.
        if pipeline == PipelineType::EpochDirect {
            if let Some(observed) = table.median_interval_seconds() {
                if observed < detect::EPOCH_INTERVAL_BAND.0 {
                    warnings.push(Warning::SubMinuteEpochsCollapsed {
                        from_seconds: observed,
                    });
                }
            }
        }

        let (score_column, fuzzy) =
            scored
                .find_score_column()
                .ok_or_else(|| ScoreError::MissingScoreColumn {
                    columns: scored.column_names(),
                })?;
        if fuzzy {
            warnings.push(Warning::FuzzyScoreColumn(score_column.clone()));
        }

        let scores = scored.column(&score_column).ok_or_else(|| {
            ScoreError::MissingScoreColumn {
                columns: scored.column_names(),
            }
        })?;
        let epochs = scores.len();
        let sleep_epochs = scores.iter().filter(|&&s| s == 1.0).count();
        let summary = ScoringSummary {
            epochs,
            sleep_epochs,
            sleep_fraction: if epochs > 0 {
                sleep_epochs as f64 / epochs as f64
            } else {
                0.0
            },
        };

        Ok(ScoringResult {
            producer: crate::PRODUCER_NAME,
            engine_version: crate::ENGINE_VERSION,
            algorithm: algorithm_id.to_string(),
            source,
            pipeline,
            table: scored,
            score_column,
            summary,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn make_timestamps(n: usize, step_ms: i64) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap();
        (0..n)
            .map(|i| start + Duration::milliseconds(step_ms * i as i64))
            .collect()
    }

    fn epoch_table(counts: Vec<f64>) -> SampleTable {
        let mut table = SampleTable::with_timestamps(make_timestamps(counts.len(), 60_000));
        table.add_column("activity", counts).unwrap();
        table
    }

    fn raw_table(n: usize, z: f64) -> SampleTable {
        let mut table = SampleTable::with_timestamps(make_timestamps(n, 1000));
        table.add_column("x", vec![0.0; n]).unwrap();
        table.add_column("y", vec![0.0; n]).unwrap();
        table.add_column("z", vec![z; n]).unwrap();
        table
    }

    #[test]
    fn test_transition_function() {
        use AlgorithmDataRequirement::*;
        use DataSourceType::*;

        assert_eq!(determine_pipeline_type(RawBinary, RawData), PipelineType::RawToRaw);
        assert_eq!(determine_pipeline_type(RawTabular, RawData), PipelineType::RawToRaw);
        assert_eq!(
            determine_pipeline_type(RawBinary, EpochData),
            PipelineType::RawToEpoch
        );
        assert_eq!(
            determine_pipeline_type(RawTabular, EpochData),
            PipelineType::RawToEpoch
        );
        assert_eq!(
            determine_pipeline_type(EpochTabular, EpochData),
            PipelineType::EpochDirect
        );
        assert_eq!(
            determine_pipeline_type(EpochTabular, RawData),
            PipelineType::Incompatible
        );
    }

    #[test]
    fn test_epoch_direct_path() {
        let pipeline = ScoringPipeline::default();
        let table = epoch_table(vec![0.0; 30]);

        let result = pipeline.process(&table, "cole_kripke").unwrap();
        assert_eq!(result.pipeline, PipelineType::EpochDirect);
        assert_eq!(result.source, DataSourceType::EpochTabular);
        assert_eq!(result.score_column, "sleep_score");
        assert_eq!(result.summary.epochs, 30);
        assert_eq!(result.summary.sleep_epochs, 30);
        assert!((result.summary.sleep_fraction - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_raw_to_epoch_path_runs_epoching() {
        let pipeline = ScoringPipeline::default();
        // 10 min of still 1 Hz raw data
        let table = raw_table(600, 0.0);

        let result = pipeline.process(&table, "cole_kripke").unwrap();
        assert_eq!(result.pipeline, PipelineType::RawToEpoch);
        assert_eq!(result.summary.epochs, 10);
        // Still signal epochs to zero counts: all sleep
        assert_eq!(result.summary.sleep_epochs, 10);
    }

    #[test]
    fn test_raw_to_epoch_epoching_failure_stops_before_classifier() {
        let pipeline = ScoringPipeline::default();
        // Raw axis columns but no timestamps: epoching must fail
        let mut table = SampleTable::new();
        table.add_column("x", vec![0.0; 10]).unwrap();
        table.add_column("y", vec![0.0; 10]).unwrap();
        table.add_column("z", vec![1.0; 10]).unwrap();

        let result = pipeline.process(&table, "cole_kripke");
        assert!(matches!(result, Err(ScoreError::EpochingError(_))));
    }

    #[test]
    fn test_raw_to_raw_path() {
        let pipeline = ScoringPipeline::default();
        let table = raw_table(1800, 0.7);

        let result = pipeline.process(&table, "sib").unwrap();
        assert_eq!(result.pipeline, PipelineType::RawToRaw);
        // Still device: everything sleep
        assert_eq!(result.summary.sleep_epochs, result.summary.epochs);
        assert!(result.table.column("angle_change").is_some());
    }

    #[test]
    fn test_incompatible_combination_refused() {
        let pipeline = ScoringPipeline::default();
        let table = epoch_table(vec![0.0; 10]);

        match pipeline.process(&table, "sib") {
            Err(ScoreError::Incompatible {
                algorithm,
                requirement,
                source,
                alternatives,
                ..
            }) => {
                assert_eq!(algorithm, "sib");
                assert_eq!(requirement, AlgorithmDataRequirement::RawData);
                assert_eq!(source, DataSourceType::EpochTabular);
                assert!(alternatives.contains(&"cole_kripke".to_string()));
            }
            other => panic!("expected Incompatible, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_algorithm_refused() {
        let pipeline = ScoringPipeline::default();
        let table = epoch_table(vec![0.0; 10]);
        assert!(matches!(
            pipeline.process(&table, "lstm"),
            Err(ScoreError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_sub_minute_epochs_collapse_with_warning() {
        let pipeline = ScoringPipeline::default();
        // 30 s epochs: detector warns, classifier collapses 2:1
        let mut table = SampleTable::with_timestamps(make_timestamps(20, 30_000));
        table.add_column("activity", vec![0.0; 20]).unwrap();

        let result = pipeline.process(&table, "cole_kripke").unwrap();
        assert_eq!(result.summary.epochs, 10);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::SubMinuteEpochsCollapsed { .. })));
    }

    #[test]
    fn test_result_json_export() {
        let pipeline = ScoringPipeline::default();
        let result = pipeline
            .process(&epoch_table(vec![0.0; 5]), "sadeh")
            .unwrap();
        let json = result.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["algorithm"], "sadeh");
        assert_eq!(value["producer"], "actiscore");
        assert_eq!(value["summary"]["epochs"], 5);
        assert_eq!(value["pipeline"], "epoch_direct");
    }
}
