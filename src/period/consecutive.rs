//! Consecutive-epoch sleep-period detector
//!
//! Fixes the onset/offset of the main sleep period in a classified epoch
//! series by scanning for runs of consecutive epochs in a target state.
//! Onset and offset each carry an independent rule: run length, target
//! state, and which epoch of the run to anchor on. Offset additionally
//! supports anchoring on the epoch immediately preceding the run, used to
//! emulate reference-metric conventions ("last sleep epoch before a wake
//! run").

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};

/// Default symmetric search extension around the approximate markers (epochs
/// at 1-minute cadence: 5 minutes)
pub const DEFAULT_SEARCH_EXTENSION: usize = 5;

/// Epoch state a run must match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Sleep,
    Wake,
}

impl TargetState {
    fn value(&self) -> u8 {
        match self {
            TargetState::Sleep => 1,
            TargetState::Wake => 0,
        }
    }
}

/// Which epoch of a qualifying run becomes the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAnchor {
    /// First epoch of the run
    Start,
    /// Last epoch of the run
    End,
    /// Epoch immediately preceding the run (offset only)
    Preceding,
}

/// One boundary rule: N consecutive epochs of a state, anchored somewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRule {
    pub length: usize,
    pub state: TargetState,
    pub anchor: RunAnchor,
}

/// Onset and offset rules plus the search extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsecutiveRules {
    pub onset: RunRule,
    pub offset: RunRule,
    /// Symmetric extension of the search window, in epochs
    pub search_extension: usize,
}

impl Default for ConsecutiveRules {
    fn default() -> Self {
        Self {
            onset: RunRule {
                length: 3,
                state: TargetState::Sleep,
                anchor: RunAnchor::Start,
            },
            offset: RunRule {
                length: 5,
                state: TargetState::Sleep,
                anchor: RunAnchor::End,
            },
            search_extension: DEFAULT_SEARCH_EXTENSION,
        }
    }
}

/// Consecutive-run onset/offset detector over classified epochs
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveDetector {
    rules: ConsecutiveRules,
}

impl ConsecutiveDetector {
    pub fn new(rules: ConsecutiveRules) -> Result<Self, ScoreError> {
        if rules.onset.length == 0 || rules.offset.length == 0 {
            return Err(ScoreError::InvalidInput(
                "run length must be at least 1".to_string(),
            ));
        }
        if rules.onset.anchor == RunAnchor::Preceding {
            return Err(ScoreError::InvalidInput(
                "the preceding-epoch anchor applies to offset rules only".to_string(),
            ));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &ConsecutiveRules {
        &self.rules
    }

    /// Resolve (onset_index, offset_index) around approximate markers
    ///
    /// The search window is the approximate marker pair extended
    /// symmetrically. Onset takes the first qualifying run; offset takes the
    /// latest qualifying run start strictly after the onset run (ties broken
    /// toward later time by the scan order). Returns None when either
    /// boundary stays unresolved.
    pub fn detect(
        &self,
        scores: &[u8],
        approx_onset: usize,
        approx_offset: usize,
    ) -> Result<Option<(usize, usize)>, ScoreError> {
        if scores.is_empty() {
            return Err(ScoreError::InvalidInput(
                "score series is empty".to_string(),
            ));
        }
        if let Some(&bad) = scores.iter().find(|&&s| s > 1) {
            return Err(ScoreError::InvalidInput(format!(
                "score series contains non-binary value {bad}"
            )));
        }
        if approx_onset > approx_offset || approx_offset >= scores.len() {
            return Err(ScoreError::InvalidInput(format!(
                "approximate markers ({approx_onset}, {approx_offset}) are out of range for {} epochs",
                scores.len()
            )));
        }

        let ext = self.rules.search_extension;
        let window_start = approx_onset.saturating_sub(ext);
        let window_end = (approx_offset + ext).min(scores.len() - 1);

        // Onset: first qualifying run in the extended window
        let onset_run = find_runs(scores, self.rules.onset, window_start, window_end)
            .into_iter()
            .next();
        let Some(onset_run_start) = onset_run else {
            return Ok(None);
        };
        let onset_idx = anchor_index(onset_run_start, self.rules.onset);

        // Offset: latest qualifying run strictly after the onset run
        let after_onset = onset_run_start + self.rules.onset.length;
        let offset_run = find_runs(scores, self.rules.offset, after_onset, window_end)
            .into_iter()
            .last();

        let offset_idx = match offset_run {
            Some(run_start) => {
                let idx = anchor_index(run_start, self.rules.offset);
                match self.rules.offset.anchor {
                    RunAnchor::Preceding if run_start == 0 => return Ok(None),
                    _ => idx,
                }
            }
            None => {
                // Fallback for the wake-run/preceding convention: last sleep
                // epoch before the end of the search window.
                if self.rules.offset.state == TargetState::Wake
                    && self.rules.offset.anchor == RunAnchor::Preceding
                {
                    match scores[..=window_end]
                        .iter()
                        .rposition(|&s| s == TargetState::Sleep.value())
                    {
                        Some(idx) if idx > onset_idx => idx,
                        _ => return Ok(None),
                    }
                } else {
                    return Ok(None);
                }
            }
        };

        if offset_idx <= onset_idx {
            return Ok(None);
        }
        Ok(Some((onset_idx, offset_idx)))
    }
}

/// Start indices of runs of `rule.length` epochs in `rule.state`, fully
/// inside [from, to]
fn find_runs(scores: &[u8], rule: RunRule, from: usize, to: usize) -> Vec<usize> {
    let target = rule.state.value();
    let mut starts = Vec::new();
    if from > to || to + 1 - from < rule.length {
        return starts;
    }
    for start in from..=(to + 1 - rule.length) {
        if scores[start..start + rule.length].iter().all(|&s| s == target) {
            starts.push(start);
        }
    }
    starts
}

fn anchor_index(run_start: usize, rule: RunRule) -> usize {
    match rule.anchor {
        RunAnchor::Start => run_start,
        RunAnchor::End => run_start + rule.length - 1,
        RunAnchor::Preceding => run_start.saturating_sub(1),
    }
}
