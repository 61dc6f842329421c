use std::collections::BTreeMap;

use crate::config::{Circuit, SimConfig};
use crate::error::SimError;
use crate::pit_loss::PitLossModel;
use crate::race::{CompetitorData, CompetitorId, RaceData};
use crate::strategy::Strategy;
use crate::tire::{Compound, TireModel};
use crate::types::{SimOptions, SimulationResult, StintComparison};

/// Fallback lap time when a competitor has no usable baseline at all.
const DEFAULT_LAP_TIME_S: f64 = 90.0;

/// Baseline lap times for one competitor, indexed by lap for the hot path.
/// Missing laps fall back to the competitor's mean recorded time.
pub(crate) struct BaselineTable {
    times: Vec<Option<f64>>,
    mean_s: f64,
    start_compound: Compound,
}

impl BaselineTable {
    pub fn build(competitor: &CompetitorData, race_laps: u32) -> Self {
        let mut times = vec![None; race_laps as usize + 1];
        let mut sum = 0.0;
        let mut count = 0usize;
        for record in &competitor.laps {
            if record.lap >= 1 && record.lap <= race_laps && record.time_s.is_finite() {
                times[record.lap as usize] = Some(record.time_s);
                sum += record.time_s;
                count += 1;
            }
        }
        let mean_s = if count > 0 {
            sum / count as f64
        } else {
            DEFAULT_LAP_TIME_S
        };
        Self {
            times,
            mean_s,
            start_compound: competitor.starting_compound(),
        }
    }

    fn time(&self, lap: u32) -> f64 {
        self.times[lap as usize].unwrap_or(self.mean_s)
    }

    pub fn start_compound(&self) -> Compound {
        self.start_compound
    }
}

/// Derive the per-stop seed from the request seed, the competitor and the stop
/// lap, so one base seed reproduces a whole simulation.
fn stop_seed(base: Option<u64>, competitor: CompetitorId, lap: u32) -> Option<u64> {
    base.map(|s| s.wrapping_add(u64::from(competitor) * 100 + u64::from(lap)))
}

/// Converts a stop plan plus recorded baselines into a total race time.
pub(crate) struct LapTimeIntegrator<'a> {
    config: &'a SimConfig,
    circuit: Option<&'a Circuit>,
    race_laps: u32,
}

impl<'a> LapTimeIntegrator<'a> {
    pub fn new(config: &'a SimConfig, race: &'a RaceData) -> Self {
        Self {
            config,
            circuit: config.circuit(&race.circuit_id),
            race_laps: race.total_laps,
        }
    }

    pub fn total_race_time(
        &self,
        competitor: &CompetitorData,
        baseline: &BaselineTable,
        strategy: &Strategy,
        opts: &SimOptions,
    ) -> Result<f64, SimError> {
        self.integrate(competitor, baseline, strategy, opts, |_, _| {})
    }

    /// Total race time plus the simulated per-lap times (for stint analysis).
    pub fn lap_times(
        &self,
        competitor: &CompetitorData,
        baseline: &BaselineTable,
        strategy: &Strategy,
        opts: &SimOptions,
    ) -> Result<(BTreeMap<u32, f64>, f64), SimError> {
        let mut laps = BTreeMap::new();
        let total =
            self.integrate(competitor, baseline, strategy, opts, |lap, time_s| {
                laps.insert(lap, time_s);
            })?;
        Ok((laps, total))
    }

    fn integrate<F: FnMut(u32, f64)>(
        &self,
        competitor: &CompetitorData,
        baseline: &BaselineTable,
        strategy: &Strategy,
        opts: &SimOptions,
        mut on_lap: F,
    ) -> Result<f64, SimError> {
        strategy.validate(self.race_laps, self.config.min_stop_gap_laps, self.config.max_stops)?;

        let tire = TireModel::new(&self.config.compounds, &self.config.degradation_bands);
        let pit = PitLossModel::new(self.config);

        let mut stops = strategy.stops().iter().peekable();
        let mut compound = baseline.start_compound();
        let mut laps_on_tire: u32 = 0;
        let mut total_s = 0.0;

        for lap in 1..=self.race_laps {
            if let Some(stop) = stops.next_if(|s| s.lap == lap) {
                let loss_s = match stop.pit_loss_s {
                    Some(supplied) => supplied,
                    None => pit.pit_loss(
                        self.circuit,
                        lap,
                        competitor.tier,
                        opts.situation,
                        self.race_laps,
                        stop_seed(opts.seed, competitor.id, lap),
                    )?,
                };
                total_s += loss_s;
                compound = stop.compound;
                laps_on_tire = 0;
            }

            let lap_time_s = baseline.time(lap) + tire.lap_time_delta(compound, laps_on_tire);
            on_lap(lap, lap_time_s);
            total_s += lap_time_s;
            laps_on_tire += 1;
        }
        Ok(total_s)
    }
}

/// Compare an alternative plan against the competitor's recorded one. Both are
/// simulated under identical model settings so the delta isolates the plan.
pub(crate) fn compare(
    config: &SimConfig,
    race: &RaceData,
    competitor: CompetitorId,
    alternative: &Strategy,
    opts: &SimOptions,
) -> Result<SimulationResult, SimError> {
    let comp = race.competitor(competitor)?;

    // Validate everything up front; no simulation happens for invalid input.
    comp.actual_strategy
        .validate(race.total_laps, config.min_stop_gap_laps, config.max_stops)?;
    alternative.validate(race.total_laps, config.min_stop_gap_laps, config.max_stops)?;

    let integrator = LapTimeIntegrator::new(config, race);
    let baseline = BaselineTable::build(comp, race.total_laps);

    let (actual_laps, actual_total_s) =
        integrator.lap_times(comp, &baseline, &comp.actual_strategy, opts)?;
    let (alt_laps, alternative_total_s) =
        integrator.lap_times(comp, &baseline, alternative, opts)?;

    let time_difference_s = alternative_total_s - actual_total_s;
    let stints = stint_comparison(
        &comp.actual_strategy,
        alternative,
        race.total_laps,
        baseline.start_compound(),
        &actual_laps,
        &alt_laps,
    );

    Ok(SimulationResult {
        competitor,
        competitor_name: comp.name.clone(),
        actual_strategy: comp.actual_strategy.clone(),
        alternative_strategy: alternative.clone(),
        actual_total_s,
        alternative_total_s,
        time_difference_s,
        improvement: time_difference_s < 0.0,
        predicted_position: None,
        stints,
    })
}

fn stint_time(start_lap: u32, end_lap: u32, laps: &BTreeMap<u32, f64>) -> f64 {
    laps.range(start_lap..=end_lap).map(|(_, t)| t).sum()
}

fn stint_comparison(
    actual: &Strategy,
    alternative: &Strategy,
    race_laps: u32,
    start_compound: Compound,
    actual_laps: &BTreeMap<u32, f64>,
    alt_laps: &BTreeMap<u32, f64>,
) -> Vec<StintComparison> {
    let actual_stints = actual.stints(race_laps, start_compound);
    let alt_stints = alternative.stints(race_laps, start_compound);
    let rows = actual_stints.len().max(alt_stints.len());

    (0..rows)
        .map(|i| {
            let a = actual_stints.get(i).copied();
            let b = alt_stints.get(i).copied();
            let actual_time_s = a.map_or(0.0, |s| stint_time(s.start_lap, s.end_lap, actual_laps));
            let alternative_time_s =
                b.map_or(0.0, |s| stint_time(s.start_lap, s.end_lap, alt_laps));
            StintComparison {
                stint_number: i + 1,
                actual: a,
                alternative: b,
                actual_time_s,
                alternative_time_s,
                time_difference_s: alternative_time_s - actual_time_s,
            }
        })
        .collect()
}
