//! Pit-strategy simulation and search engine.
//!
//! Takes recorded per-lap baselines for a race, simulates how a competitor's
//! total time changes under alternative tire-change plans, and searches the
//! space of stop plans for the fastest ones. Tire degradation, circuit-specific
//! pit loss and its contextual factors are closed-form models driven by an
//! immutable [`SimConfig`]; race ingestion, transport and persistence are the
//! caller's concern and everything at this boundary is plain serde data.

mod config;
mod error;
mod field;
mod pit_loss;
mod race;
mod search;
mod simulate;
mod strategy;
mod tire;
mod types;

use std::collections::BTreeMap;

pub use config::{Circuit, PitLaneTheory, SimConfig};
pub use error::{SimError, StrategyViolation};
pub use pit_loss::{
    Factor, PhaseFactors, PitLossBreakdown, PitLossModel, RandomVariation, Situation,
    SituationFactors, TeamFactors, PIT_LOSS_MAX_S, PIT_LOSS_MIN_S,
};
pub use race::{CompetitorData, CompetitorId, LapRecord, RaceData, TeamTier};
pub use search::{CancelToken, SearchControl, SearchParams};
pub use strategy::{PitStop, Stint, Strategy};
pub use tire::{Compound, CompoundSpec, CompoundTable, DegradationBands, TireModel};
pub use types::{
    FieldReport, RankedStrategy, SearchReport, SimOptions, SimulationResult, StintComparison,
};

use simulate::{BaselineTable, LapTimeIntegrator};

/// The engine: one immutable coefficient set plus one race's data. Every
/// operation borrows `&self`, so a shared engine can serve concurrent callers
/// without locking.
pub struct StrategyEngine {
    config: SimConfig,
    race: RaceData,
}

impl StrategyEngine {
    pub fn new(config: SimConfig, race: RaceData) -> Self {
        Self { config, race }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn race(&self) -> &RaceData {
        &self.race
    }

    /// Total simulated race time for one competitor under `strategy`.
    pub fn total_race_time(
        &self,
        competitor: CompetitorId,
        strategy: &Strategy,
        opts: &SimOptions,
    ) -> Result<f64, SimError> {
        let comp = self.race.competitor(competitor)?;
        let baseline = BaselineTable::build(comp, self.race.total_laps);
        LapTimeIntegrator::new(&self.config, &self.race)
            .total_race_time(comp, &baseline, strategy, opts)
    }

    /// Compare an alternative stop plan against the competitor's recorded one.
    pub fn compare(
        &self,
        competitor: CompetitorId,
        alternative: &Strategy,
        opts: &SimOptions,
    ) -> Result<SimulationResult, SimError> {
        simulate::compare(&self.config, &self.race, competitor, alternative, opts)
    }

    /// Search the candidate space of stop plans and return the `top_n`
    /// fastest, each annotated against the recorded strategy.
    pub fn find_top_strategies(
        &self,
        competitor: CompetitorId,
        params: &SearchParams,
        opts: &SimOptions,
        control: &SearchControl,
    ) -> Result<SearchReport, SimError> {
        search::find_top_strategies(&self.config, &self.race, competitor, params, opts, control)
    }

    /// Compare an alternative plan for every listed competitor and aggregate
    /// the outcome, including a naive predicted finishing order.
    pub fn analyze_field(
        &self,
        strategies: &BTreeMap<CompetitorId, Strategy>,
        opts: &SimOptions,
    ) -> Result<FieldReport, SimError> {
        field::analyze_field(&self.config, &self.race, strategies, opts)
    }
}
