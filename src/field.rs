use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::race::{CompetitorId, RaceData};
use crate::simulate;
use crate::strategy::Strategy;
use crate::types::{FieldReport, SimOptions, SimulationResult};

/// Run the single-competitor comparison for every entry and aggregate the
/// outcome. Comparisons are independent and run in parallel; the predicted
/// finishing order is a plain sort of adjusted totals, with no interaction
/// model behind it.
pub(crate) fn analyze_field(
    config: &SimConfig,
    race: &RaceData,
    strategies: &BTreeMap<CompetitorId, Strategy>,
    opts: &SimOptions,
) -> Result<FieldReport, SimError> {
    // Validate the whole request before simulating anything.
    for (&id, strategy) in strategies {
        let comp = race.competitor(id)?;
        comp.actual_strategy
            .validate(race.total_laps, config.min_stop_gap_laps, config.max_stops)?;
        strategy.validate(race.total_laps, config.min_stop_gap_laps, config.max_stops)?;
    }

    let mut results: BTreeMap<CompetitorId, SimulationResult> = strategies
        .par_iter()
        .map(|(&id, strategy)| simulate::compare(config, race, id, strategy, opts).map(|r| (id, r)))
        .collect::<Result<_, _>>()?;

    let mut order: Vec<(CompetitorId, f64)> = results
        .values()
        .map(|r| (r.competitor, r.alternative_total_s))
        .collect();
    order.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    for (position, (id, _)) in order.iter().enumerate() {
        if let Some(result) = results.get_mut(id) {
            result.predicted_position = Some(position + 1);
        }
    }

    let differences: Vec<f64> = results.values().map(|r| r.time_difference_s).collect();
    let total_difference: f64 = differences.iter().sum();
    let mean_improvement_s = if differences.is_empty() {
        0.0
    } else {
        total_difference / differences.len() as f64
    };

    tracing::info!(
        competitors = results.len(),
        improved = differences.iter().filter(|d| **d < 0.0).count(),
        "field analysis complete"
    );

    Ok(FieldReport {
        predicted_order: order.into_iter().map(|(id, _)| id).collect(),
        total_time_saved_s: -total_difference,
        competitors_improved: differences.iter().filter(|d| **d < 0.0).count(),
        mean_improvement_s,
        results,
    })
}
