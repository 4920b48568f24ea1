//! Algorithm registry and compatibility checking
//!
//! A constructed registry object maps algorithm identifiers to their
//! descriptors and factory constructors. The registry is built once, passed
//! to the orchestrator, and read-only afterwards; registering new
//! algorithms happens at construction time, never through process-wide
//! state.

use crate::algorithms::{ColeKripke, Sadeh, SibClassifier, SleepWakeAlgorithm};
use crate::error::ScoreError;
use crate::period::AutoWindowDetector;
use crate::types::{
    AlgorithmCategory, AlgorithmDataRequirement, CompatibilityResult, CompatibilityStatus,
    DataSourceType, PipelineType,
};

/// Static descriptor of a registered algorithm
#[derive(Debug, Clone)]
pub struct AlgorithmDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub requirement: AlgorithmDataRequirement,
    pub category: AlgorithmCategory,
}

type Constructor = fn() -> Box<dyn SleepWakeAlgorithm>;

struct Entry {
    descriptor: AlgorithmDescriptor,
    constructor: Constructor,
}

/// Registry of available scoring algorithms
pub struct AlgorithmRegistry {
    entries: Vec<Entry>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl AlgorithmRegistry {
    /// Empty registry (for callers composing their own algorithm set)
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with all built-in algorithms
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            AlgorithmDescriptor {
                id: "cole_kripke",
                name: "Cole-Kripke",
                requirement: AlgorithmDataRequirement::EpochData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(ColeKripke::scaled()),
        );
        registry.register(
            AlgorithmDescriptor {
                id: "cole_kripke_original",
                name: "Cole-Kripke (original counts)",
                requirement: AlgorithmDataRequirement::EpochData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(ColeKripke::original()),
        );
        registry.register(
            AlgorithmDescriptor {
                id: "sadeh",
                name: "Sadeh",
                requirement: AlgorithmDataRequirement::EpochData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(Sadeh::scaled()),
        );
        registry.register(
            AlgorithmDescriptor {
                id: "sadeh_original",
                name: "Sadeh (original counts)",
                requirement: AlgorithmDataRequirement::EpochData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(Sadeh::original()),
        );
        registry.register(
            AlgorithmDescriptor {
                id: "sib",
                name: "Sustained inactivity bouts (van Hees)",
                requirement: AlgorithmDataRequirement::RawData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(SibClassifier::default()),
        );
        registry.register(
            AlgorithmDescriptor {
                id: "hdcza",
                name: "Automatic SPT window (HDCZA)",
                requirement: AlgorithmDataRequirement::RawData,
                category: AlgorithmCategory::SleepPeriod,
            },
            || Box::new(AutoWindowDetector::default()),
        );
        registry
    }

    /// Register an algorithm; the extension point for custom classifiers
    pub fn register(&mut self, descriptor: AlgorithmDescriptor, constructor: Constructor) {
        self.entries.retain(|e| e.descriptor.id != descriptor.id);
        self.entries.push(Entry {
            descriptor,
            constructor,
        });
    }

    /// Descriptor for an identifier
    pub fn describe(&self, id: &str) -> Result<&AlgorithmDescriptor, ScoreError> {
        self.entries
            .iter()
            .map(|e| &e.descriptor)
            .find(|d| d.id == id)
            .ok_or_else(|| ScoreError::UnknownAlgorithm(id.to_string()))
    }

    /// Construct a fresh instance for an identifier
    pub fn create(&self, id: &str) -> Result<Box<dyn SleepWakeAlgorithm>, ScoreError> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.constructor)())
            .ok_or_else(|| ScoreError::UnknownAlgorithm(id.to_string()))
    }

    /// All registered descriptors
    pub fn descriptors(&self) -> Vec<&AlgorithmDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Identifiers of algorithms compatible with a data source as-is or via
    /// preprocessing
    pub fn alternatives_for(&self, source: DataSourceType) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| &e.descriptor)
            .filter(|d| match d.requirement {
                // Raw sources can feed everything (epoching covers the rest);
                // epoch sources can only feed epoch algorithms.
                AlgorithmDataRequirement::RawData => source.is_raw(),
                AlgorithmDataRequirement::EpochData => true,
            })
            .map(|d| d.id.to_string())
            .collect()
    }

    /// Can `algorithm_id` run on `source`?
    pub fn check(
        &self,
        source: DataSourceType,
        algorithm_id: &str,
    ) -> Result<CompatibilityResult, ScoreError> {
        let descriptor = self.describe(algorithm_id)?;
        let pipeline = crate::pipeline::determine_pipeline_type(source, descriptor.requirement);

        let result = match pipeline {
            PipelineType::RawToRaw | PipelineType::EpochDirect => CompatibilityResult {
                status: CompatibilityStatus::Compatible,
                pipeline: Some(pipeline),
                reason: format!(
                    "{} accepts {} data directly",
                    descriptor.name,
                    source.as_str()
                ),
                alternatives: Vec::new(),
            },
            PipelineType::RawToEpoch => CompatibilityResult {
                status: CompatibilityStatus::RequiresPreprocessing,
                pipeline: Some(pipeline),
                reason: format!(
                    "{} requires epoch counts; raw data will be epoched first",
                    descriptor.name
                ),
                alternatives: Vec::new(),
            },
            PipelineType::Incompatible => CompatibilityResult {
                status: CompatibilityStatus::Incompatible,
                pipeline: None,
                reason: format!(
                    "{} requires raw acceleration, which cannot be reconstructed from epoch counts",
                    descriptor.name
                ),
                alternatives: self
                    .alternatives_for(source)
                    .into_iter()
                    .filter(|id| id != algorithm_id)
                    .collect(),
            },
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_set() {
        let registry = AlgorithmRegistry::with_builtin();
        let ids: Vec<&str> = registry.descriptors().iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                "cole_kripke",
                "cole_kripke_original",
                "sadeh",
                "sadeh_original",
                "sib",
                "hdcza"
            ]
        );
    }

    #[test]
    fn test_create_matches_descriptor() {
        let registry = AlgorithmRegistry::with_builtin();
        for descriptor in registry.descriptors() {
            let algorithm = registry.create(descriptor.id).unwrap();
            assert_eq!(algorithm.id(), descriptor.id);
            assert_eq!(algorithm.requirement(), descriptor.requirement);
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let registry = AlgorithmRegistry::with_builtin();
        assert!(matches!(
            registry.create("perceptron"),
            Err(ScoreError::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            registry.check(DataSourceType::RawTabular, "perceptron"),
            Err(ScoreError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_epoch_source_raw_algorithm_incompatible() {
        let registry = AlgorithmRegistry::with_builtin();
        let result = registry
            .check(DataSourceType::EpochTabular, "sib")
            .unwrap();
        assert_eq!(result.status, CompatibilityStatus::Incompatible);
        assert_eq!(result.pipeline, None);
        // Alternatives are the epoch-capable algorithms
        assert_eq!(
            result.alternatives,
            vec!["cole_kripke", "cole_kripke_original", "sadeh", "sadeh_original"]
        );
    }

    #[test]
    fn test_raw_source_epoch_algorithm_needs_preprocessing() {
        let registry = AlgorithmRegistry::with_builtin();
        let result = registry
            .check(DataSourceType::RawTabular, "cole_kripke")
            .unwrap();
        assert_eq!(result.status, CompatibilityStatus::RequiresPreprocessing);
        assert_eq!(result.pipeline, Some(PipelineType::RawToEpoch));
    }

    #[test]
    fn test_direct_compatibility() {
        let registry = AlgorithmRegistry::with_builtin();

        let raw = registry.check(DataSourceType::RawBinary, "sib").unwrap();
        assert_eq!(raw.status, CompatibilityStatus::Compatible);
        assert_eq!(raw.pipeline, Some(PipelineType::RawToRaw));

        let epoch = registry
            .check(DataSourceType::EpochTabular, "sadeh")
            .unwrap();
        assert_eq!(epoch.status, CompatibilityStatus::Compatible);
        assert_eq!(epoch.pipeline, Some(PipelineType::EpochDirect));
    }

    #[test]
    fn test_register_replaces_existing_id() {
        let mut registry = AlgorithmRegistry::with_builtin();
        let before = registry.descriptors().len();
        registry.register(
            AlgorithmDescriptor {
                id: "cole_kripke",
                name: "Cole-Kripke (replacement)",
                requirement: AlgorithmDataRequirement::EpochData,
                category: AlgorithmCategory::SleepWake,
            },
            || Box::new(ColeKripke::scaled()),
        );
        assert_eq!(registry.descriptors().len(), before);
    }
}
