//! Sadeh weighted-window classifier
//!
//! Sadeh et al. (1994): a probability-of-sleep score is computed per
//! 1-minute epoch from four window statistics and compared to a decision
//! threshold:
//!
//! PS = 7.601 − 0.065·AVG − 1.08·NATS − 0.056·SD − 0.703·LG
//!
//! - AVG: mean activity over an 11-epoch centered window (5 back, 5 forward)
//! - NATS: number of epochs in that window with 50 <= count < 100
//! - SD: sample standard deviation of the current + 5 preceding epochs
//! - LG: natural log of the current count + 1
//!
//! Sleep when PS >= threshold (default 0.0, configurable). Two published
//! variants: the un-scaled original and a pre-scaled device-compatible
//! variant sharing the Cole-Kripke divide/cap pre-scaling.

use super::{
    minute_series, scored_table, validate_counts, ParamUpdate, Parameter, SleepWakeAlgorithm,
};
use crate::error::ScoreError;
use crate::table::SampleTable;
use crate::types::{AlgorithmDataRequirement, Warning};

/// Published regression coefficients: intercept, AVG, NATS, SD, LG
const COEFFICIENTS: [f64; 5] = [7.601, 0.065, 1.08, 0.056, 0.703];
/// Epochs on each side of the centered AVG/NATS window
const HALF_WINDOW: usize = 5;
/// Trailing epochs (including current) in the SD window
const SD_WINDOW: usize = 6;
/// NATS band: 50 <= count < 100
const NATS_BAND: (f64, f64) = (50.0, 100.0);

/// Default decision threshold: sleep when PS >= 0
pub const DEFAULT_THRESHOLD: f64 = 0.0;

/// Pre-scaling variant of the Sadeh formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SadehVariant {
    /// Counts divided by 100 and capped at 300 before the score
    Scaled,
    /// Formula applied to raw counts, paper-faithful
    Original,
}

/// Sadeh sleep/wake classifier over 1-minute activity counts
#[derive(Debug, Clone)]
pub struct Sadeh {
    variant: SadehVariant,
    threshold: f64,
}

impl Sadeh {
    pub fn new(variant: SadehVariant, threshold: f64) -> Self {
        Self { variant, threshold }
    }

    /// Device-compatible variant with the default threshold
    pub fn scaled() -> Self {
        Self::new(SadehVariant::Scaled, DEFAULT_THRESHOLD)
    }

    /// Paper-faithful variant with the default threshold
    pub fn original() -> Self {
        Self::new(SadehVariant::Original, DEFAULT_THRESHOLD)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn prescale(&self, counts: &[f64]) -> Vec<f64> {
        match self.variant {
            SadehVariant::Original => counts.to_vec(),
            SadehVariant::Scaled => counts
                .iter()
                .map(|c| (c / super::cole_kripke::DEFAULT_DIVIDE).min(super::cole_kripke::DEFAULT_CAP))
                .collect(),
        }
    }

    fn scores(&self, counts: &[f64]) -> Vec<u8> {
        let scaled = self.prescale(counts);
        (0..scaled.len())
            .map(|i| u8::from(probability_score(&scaled, i) >= self.threshold))
            .collect()
    }
}

impl SleepWakeAlgorithm for Sadeh {
    fn id(&self) -> &'static str {
        match self.variant {
            SadehVariant::Scaled => "sadeh",
            SadehVariant::Original => "sadeh_original",
        }
    }

    fn name(&self) -> &'static str {
        match self.variant {
            SadehVariant::Scaled => "Sadeh",
            SadehVariant::Original => "Sadeh (original counts)",
        }
    }

    fn requirement(&self) -> AlgorithmDataRequirement {
        AlgorithmDataRequirement::EpochData
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter {
            name: "threshold",
            value: self.threshold,
        }]
    }

    fn with_overrides(&self, overrides: &[(String, f64)]) -> Result<ParamUpdate, ScoreError> {
        let mut warnings = Vec::new();
        let mut threshold = self.threshold;

        for (key, value) in overrides {
            match key.as_str() {
                "threshold" => threshold = *value,
                // Regression coefficients are published and fixed
                "coefficients" | "weights" => {
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

        Ok(ParamUpdate {
            algorithm: Box::new(Sadeh::new(self.variant, threshold)),
            warnings,
        })
    }

    fn score(&self, table: &SampleTable) -> Result<SampleTable, ScoreError> {
        let series = minute_series(table)?;
        let scores = self.scores(&series.counts);
        scored_table(series, scores)
    }

    fn score_array(&self, values: &[f64], epoch_seconds: f64) -> Result<Vec<u8>, ScoreError> {
        if (epoch_seconds - super::CLASSIFIER_EPOCH_SECONDS).abs() > 1e-6 {
            return Err(ScoreError::InvalidInput(format!(
                "Sadeh requires 1-minute epochs, got {epoch_seconds}s"
            )));
        }
        validate_counts(values)?;
        Ok(self.scores(values))
    }
}

/// PS score for one epoch (zero-padded windows at the boundaries)
fn probability_score(counts: &[f64], i: usize) -> f64 {
    let lo = i.saturating_sub(HALF_WINDOW);
    let hi = (i + HALF_WINDOW + 1).min(counts.len());

    // AVG and NATS over the centered window, zero-padded to 11 epochs
    let window_len = 2 * HALF_WINDOW + 1;
    let sum: f64 = counts[lo..hi].iter().sum();
    let avg = sum / window_len as f64;
    let nats = counts[lo..hi]
        .iter()
        .filter(|&&c| c >= NATS_BAND.0 && c < NATS_BAND.1)
        .count() as f64;

    // Sample SD over current + 5 preceding, zero-padded to 6 epochs
    let sd_lo = i.saturating_sub(SD_WINDOW - 1);
    let mut sd_values: Vec<f64> = vec![0.0; SD_WINDOW - (i - sd_lo + 1)];
    sd_values.extend_from_slice(&counts[sd_lo..=i]);
    let mean = sd_values.iter().sum::<f64>() / sd_values.len() as f64;
    let variance = sd_values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (sd_values.len() - 1) as f64;
    let sd = variance.sqrt();

    let lg = (counts[i] + 1.0).ln();

    COEFFICIENTS[0] - COEFFICIENTS[1] * avg - COEFFICIENTS[2] * nats - COEFFICIENTS[3] * sd
        - COEFFICIENTS[4] * lg
}
