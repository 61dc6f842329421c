use thiserror::Error;

use crate::race::CompetitorId;

/// A single broken stop-plan invariant, naming the offending laps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyViolation {
    #[error("pit stop lap {lap} is outside the race range 1..={race_laps}")]
    StopLapOutOfRange { lap: u32, race_laps: u32 },

    #[error("pit stops must be strictly increasing: lap {lap} follows lap {prev}")]
    StopsNotIncreasing { prev: u32, lap: u32 },

    #[error("pit stops at laps {prev} and {lap} are closer than the minimum gap of {min_gap} laps")]
    MinGapViolated { prev: u32, lap: u32, min_gap: u32 },

    #[error("strategy has {count} stops, the maximum is {max}")]
    TooManyStops { count: usize, max: usize },
}

/// Engine errors. All validation happens before any simulation work, so a
/// returned error never carries partial results.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown tire compound '{0}'")]
    InvalidCompound(String),

    #[error("invalid strategy: {0}")]
    InvalidStrategy(#[from] StrategyViolation),

    #[error("no baseline data for competitor {0}")]
    UnknownCompetitor(CompetitorId),

    #[error(
        "computed pit loss {computed_s:.2}s is implausibly far outside {min_s:.1}..{max_s:.1}s; \
         check the coefficient tables"
    )]
    PitLossOutOfRange {
        computed_s: f64,
        min_s: f64,
        max_s: f64,
    },

    #[error("strategy search was cancelled before it could evaluate any candidate")]
    SearchTimedOut,
}
