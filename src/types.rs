use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pit_loss::Situation;
use crate::race::CompetitorId;
use crate::strategy::{Stint, Strategy};

/// Per-request simulation settings shared by every engine operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Base seed for the pit-loss random variation. Each stop derives its own
    /// sub-seed from this, the competitor and the stop lap, so a fixed seed
    /// makes whole simulations reproducible. `None` draws from the process
    /// generator.
    pub seed: Option<u64>,
    /// At most one situational factor applies per stop.
    pub situation: Option<Situation>,
}

impl SimOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            situation: None,
        }
    }
}

/// Stint-by-stint comparison row between the actual and alternative plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StintComparison {
    pub stint_number: usize,
    pub actual: Option<Stint>,
    pub alternative: Option<Stint>,
    pub actual_time_s: f64,
    pub alternative_time_s: f64,
    pub time_difference_s: f64,
}

/// Outcome of comparing one alternative stop plan against the recorded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub competitor: CompetitorId,
    pub competitor_name: Option<String>,
    pub actual_strategy: Strategy,
    pub alternative_strategy: Strategy,
    pub actual_total_s: f64,
    pub alternative_total_s: f64,
    /// Alternative minus actual; negative means the alternative was faster.
    pub time_difference_s: f64,
    pub improvement: bool,
    /// Filled by field analysis, advisory only.
    pub predicted_position: Option<usize>,
    pub stints: Vec<StintComparison>,
}

/// One ranked candidate from a strategy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub rank: usize,
    pub strategy: Strategy,
    pub total_s: f64,
    /// Candidate total minus the actual recorded strategy's total.
    pub improvement_s: f64,
}

/// Result of a top-N strategy search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub competitor: CompetitorId,
    pub actual_total_s: f64,
    pub strategies: Vec<RankedStrategy>,
    pub evaluated: usize,
    /// True when the search was cancelled or hit its deadline; `strategies`
    /// then holds the best candidates found so far.
    pub timed_out: bool,
}

/// Aggregate outcome of re-running the field on alternative plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReport {
    pub results: BTreeMap<CompetitorId, SimulationResult>,
    /// Competitors sorted by adjusted total time, fastest first.
    pub predicted_order: Vec<CompetitorId>,
    pub total_time_saved_s: f64,
    pub competitors_improved: usize,
    pub mean_improvement_s: f64,
}
