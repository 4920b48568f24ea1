//! Cole-Kripke weighted-window classifier
//!
//! Cole et al. (1992): a 7-epoch window (4 lagging, current, 2 leading,
//! zero-padded at the boundaries) of 1-minute activity counts is combined
//! with published integer weights and a fixed scale factor; the epoch is
//! sleep when the weighted sum falls below 1.0.
//!
//! Variants differ only in the pre-scaling step:
//! - scaled: counts / 100, capped at 300 (modern-device compatible)
//! - original: raw counts, paper-faithful
//! - custom: user-supplied divide/cap pair for devices whose count
//!   magnitude differs further
//!
//! The weights, scale, and threshold are fixed published constants and are
//! never tunable; override attempts are ignored with a warning.

use super::{
    minute_series, scored_table, validate_counts, ParamUpdate, Parameter, SleepWakeAlgorithm,
};
use crate::error::ScoreError;
use crate::table::SampleTable;
use crate::types::{AlgorithmDataRequirement, Warning};

/// Published window weights: A(t-4) .. A(t+2)
const WEIGHTS: [f64; 7] = [106.0, 54.0, 58.0, 76.0, 230.0, 74.0, 67.0];
/// Lagging epochs in the window
const LAG: usize = 4;
/// Published scale factor
const SCALE: f64 = 0.001;
/// Sleep when the weighted sum is strictly below this
const THRESHOLD: f64 = 1.0;

/// Default pre-scaling divisor for the scaled variant
pub const DEFAULT_DIVIDE: f64 = 100.0;
/// Default post-division cap for the scaled variant
pub const DEFAULT_CAP: f64 = 300.0;

/// Pre-scaling variant of the Cole-Kripke formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColeKripkeVariant {
    /// Counts divided by 100 and capped at 300 before the weighted sum
    Scaled,
    /// Weighted sum applied to raw counts unmodified
    Original,
    /// User-configurable divide/cap pair
    Custom { divide: f64, cap: f64 },
}

/// Cole-Kripke sleep/wake classifier over 1-minute activity counts
#[derive(Debug, Clone)]
pub struct ColeKripke {
    variant: ColeKripkeVariant,
}

impl ColeKripke {
    pub fn new(variant: ColeKripkeVariant) -> Self {
        Self { variant }
    }

    /// Modern-device compatible variant (divide by 100, cap at 300)
    pub fn scaled() -> Self {
        Self::new(ColeKripkeVariant::Scaled)
    }

    /// Paper-faithful variant operating on raw counts
    pub fn original() -> Self {
        Self::new(ColeKripkeVariant::Original)
    }

    pub fn variant(&self) -> ColeKripkeVariant {
        self.variant
    }

    fn prescale(&self, counts: &[f64]) -> Vec<f64> {
        match self.variant {
            ColeKripkeVariant::Original => counts.to_vec(),
            ColeKripkeVariant::Scaled => counts
                .iter()
                .map(|c| (c / DEFAULT_DIVIDE).min(DEFAULT_CAP))
                .collect(),
            ColeKripkeVariant::Custom { divide, cap } => {
                counts.iter().map(|c| (c / divide).min(cap)).collect()
            }
        }
    }
}

impl SleepWakeAlgorithm for ColeKripke {
    fn id(&self) -> &'static str {
        match self.variant {
            ColeKripkeVariant::Original => "cole_kripke_original",
            _ => "cole_kripke",
        }
    }

    fn name(&self) -> &'static str {
        match self.variant {
            ColeKripkeVariant::Original => "Cole-Kripke (original counts)",
            _ => "Cole-Kripke",
        }
    }

    fn requirement(&self) -> AlgorithmDataRequirement {
        AlgorithmDataRequirement::EpochData
    }

    fn parameters(&self) -> Vec<Parameter> {
        match self.variant {
            ColeKripkeVariant::Original => Vec::new(),
            ColeKripkeVariant::Scaled => vec![
                Parameter {
                    name: "divide",
                    value: DEFAULT_DIVIDE,
                },
                Parameter {
                    name: "cap",
                    value: DEFAULT_CAP,
                },
            ],
            ColeKripkeVariant::Custom { divide, cap } => vec![
                Parameter {
                    name: "divide",
                    value: divide,
                },
                Parameter {
                    name: "cap",
                    value: cap,
                },
            ],
        }
    }

    fn with_overrides(&self, overrides: &[(String, f64)]) -> Result<ParamUpdate, ScoreError> {
        let mut warnings = Vec::new();
        let (mut divide, mut cap) = match self.variant {
            ColeKripkeVariant::Original => (1.0, f64::INFINITY),
            ColeKripkeVariant::Scaled => (DEFAULT_DIVIDE, DEFAULT_CAP),
            ColeKripkeVariant::Custom { divide, cap } => (divide, cap),
        };
        let mut customized = false;

        for (key, value) in overrides {
            match key.as_str() {
                "divide" => {
                    if *value <= 0.0 {
                        return Err(ScoreError::InvalidInput(format!(
                            "divide must be positive, got {value}"
                        )));
                    }
                    divide = *value;
                    customized = true;
                }
                "cap" => {
                    if *value <= 0.0 {
                        return Err(ScoreError::InvalidInput(format!(
                            "cap must be positive, got {value}"
                        )));
                    }
                    cap = *value;
                    customized = true;
                }
                // The weighted-window constants are published and fixed
                "weights" | "scale" | "threshold" => {
                    warnings.push(Warning::FixedParameterIgnored(key.clone()));
                }
                _ => {
                    return Err(ScoreError::UnknownParameter {
                        algorithm: self.id().to_string(),
                        parameter: key.clone(),
                    });
                }
            }
        }

        let variant = if customized {
            ColeKripkeVariant::Custom { divide, cap }
        } else {
            self.variant
        };
        Ok(ParamUpdate {
            algorithm: Box::new(ColeKripke::new(variant)),
            warnings,
        })
    }

    fn score(&self, table: &SampleTable) -> Result<SampleTable, ScoreError> {
        let series = minute_series(table)?;
        let scores = weighted_window_scores(&self.prescale(&series.counts));
        scored_table(series, scores)
    }

    fn score_array(&self, values: &[f64], epoch_seconds: f64) -> Result<Vec<u8>, ScoreError> {
        if (epoch_seconds - super::CLASSIFIER_EPOCH_SECONDS).abs() > 1e-6 {
            return Err(ScoreError::InvalidInput(format!(
                "Cole-Kripke requires 1-minute epochs, got {epoch_seconds}s"
            )));
        }
        validate_counts(values)?;
        Ok(weighted_window_scores(&self.prescale(values)))
    }
}

/// Apply the published weighted window to pre-scaled counts
fn weighted_window_scores(counts: &[f64]) -> Vec<u8> {
    (0..counts.len())
        .map(|i| {
            let mut sum = 0.0;
            for (w, weight) in WEIGHTS.iter().enumerate() {
                // Window position w maps to epoch i - LAG + w; out-of-range
                // positions are zero-padded.
                let idx = i as isize - LAG as isize + w as isize;
                if idx >= 0 && (idx as usize) < counts.len() {
                    sum += weight * counts[idx as usize];
                }
            }
            u8::from(SCALE * sum < THRESHOLD)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_zero_counts_score_sleep() {
        // Weighted sum of zeros is 0 < 1.0 for every variant
        let counts = vec![0.0; 30];
        for algo in [
            ColeKripke::scaled(),
            ColeKripke::original(),
            ColeKripke::new(ColeKripkeVariant::Custom {
                divide: 50.0,
                cap: 100.0,
            }),
        ] {
            let scores = algo.score_array(&counts, 60.0).unwrap();
            assert_eq!(scores, vec![1; 30]);
        }
    }

    #[test]
    fn test_output_length_and_range() {
        let counts: Vec<f64> = (0..100).map(|i| (i * 37 % 500) as f64).collect();
        let scores = ColeKripke::scaled().score_array(&counts, 60.0).unwrap();
        assert_eq!(scores.len(), counts.len());
        assert!(scores.iter().all(|&s| s == 0 || s == 1));
    }

    #[test]
    fn test_high_activity_scores_wake() {
        // 500 counts/min everywhere; scaled to 5, weighted sum 0.001 x 665 x 5
        // = 3.3 > 1.0 in the window interior
        let counts = vec![500.0; 20];
        let scores = ColeKripke::scaled().score_array(&counts, 60.0).unwrap();
        assert_eq!(scores[10], 0);
    }

    #[test]
    fn test_original_variant_skips_prescaling() {
        // Counts of 2 raw: original sum = 0.001 x 665 x 2 = 1.33 (wake);
        // scaled divides to 0.02 first (sleep)
        let counts = vec![2.0; 20];
        let original = ColeKripke::original().score_array(&counts, 60.0).unwrap();
        let scaled = ColeKripke::scaled().score_array(&counts, 60.0).unwrap();
        assert_eq!(original[10], 0);
        assert_eq!(scaled[10], 1);
    }

    #[test]
    fn test_boundary_zero_padding() {
        // A single spike only affects epochs whose window covers it
        let mut counts = vec![0.0; 10];
        counts[0] = 1e6;
        let scores = ColeKripke::scaled().score_array(&counts, 60.0).unwrap();
        // Spike at 0 reaches epochs 0..=4 (lagging weights); epochs beyond
        // its window stay sleep
        assert_eq!(scores[5], 1);
        assert_eq!(scores[0], 0);
    }

    #[test]
    fn test_override_divide_cap() {
        let update = ColeKripke::scaled()
            .with_overrides(&[("divide".to_string(), 10.0), ("cap".to_string(), 50.0)])
            .unwrap();
        assert!(update.warnings.is_empty());
        assert_eq!(
            update.algorithm.parameters(),
            vec![
                Parameter {
                    name: "divide",
                    value: 10.0
                },
                Parameter {
                    name: "cap",
                    value: 50.0
                },
            ]
        );
    }

    #[test]
    fn test_weight_override_ignored_with_warning() {
        let update = ColeKripke::scaled()
            .with_overrides(&[("weights".to_string(), 1.0)])
            .unwrap();
        assert_eq!(
            update.warnings,
            vec![Warning::FixedParameterIgnored("weights".to_string())]
        );
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let result = ColeKripke::scaled().with_overrides(&[("bogus".to_string(), 1.0)]);
        assert!(matches!(
            result,
            Err(ScoreError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_counts() {
        assert!(ColeKripke::scaled().score_array(&[1.0, -1.0], 60.0).is_err());
    }
}
