//! Sleep-period boundary detectors
//!
//! Two regimes: [`consecutive`] locates onset/offset in an already-classified
//! epoch series by consecutive-run rules; [`auto_window`] detects per-day
//! sleep-period windows directly from raw angle data.

pub mod auto_window;
pub mod consecutive;

pub use auto_window::{AutoWindowDetector, AutoWindowResult};
pub use consecutive::{ConsecutiveDetector, ConsecutiveRules, RunAnchor, RunRule, TargetState};
