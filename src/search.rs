use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::iter::{ParallelBridge, ParallelIterator};

use crate::config::SimConfig;
use crate::error::{SimError, StrategyViolation};
use crate::race::{CompetitorId, RaceData};
use crate::simulate::{BaselineTable, LapTimeIntegrator};
use crate::strategy::{PitStop, Strategy};
use crate::tire::Compound;
use crate::types::{RankedStrategy, SearchReport, SimOptions};

/// Tuning of a strategy search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Candidates carry 1..=max_stops stops.
    pub max_stops: usize,
    /// How many ranked strategies to return.
    pub top_n: usize,
    /// Stride of the stop-lap grid; 1 means every lap is a candidate stop.
    pub stride: usize,
    /// Compounds a stop may switch to.
    pub compounds: Vec<Compound>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_stops: 2,
            top_n: 10,
            stride: 1,
            compounds: vec![Compound::Soft, Compound::Medium, Compound::Hard],
        }
    }
}

/// Cooperative cancellation flag shared with a caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Caller-supplied bounds on a search: a cancel flag and/or a deadline. A
/// tripped control stops candidate generation; results found so far are kept.
#[derive(Debug, Clone, Default)]
pub struct SearchControl {
    pub cancel: CancelToken,
    pub deadline: Option<Instant>,
}

impl SearchControl {
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancelToken::new(),
            deadline: Some(deadline),
        }
    }

    fn tripped(&self) -> bool {
        self.cancel.is_cancelled()
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

/// Lazy enumeration of candidate stop plans: every stop count up to the
/// maximum, every gap-respecting lap combination from the grid, every compound
/// assignment. Produces candidates on demand; reconstructing the iterator
/// restarts the sequence.
pub(crate) struct CandidateStrategies {
    grid: Vec<u32>,
    compounds: Vec<Compound>,
    min_gap: u32,
    max_stops: usize,
    stops: usize,
    lap_idx: Vec<usize>,
    comp_idx: Vec<usize>,
    exhausted: bool,
}

impl CandidateStrategies {
    pub fn new(
        race_laps: u32,
        stride: usize,
        min_gap: u32,
        max_stops: usize,
        compounds: Vec<Compound>,
    ) -> Self {
        let grid: Vec<u32> = (1..=race_laps).step_by(stride.max(1)).collect();
        let mut iter = Self {
            grid,
            compounds,
            min_gap,
            max_stops,
            stops: 0,
            lap_idx: Vec::new(),
            comp_idx: Vec::new(),
            exhausted: false,
        };
        if iter.max_stops == 0 || iter.compounds.is_empty() || !iter.seed_stops(1) {
            iter.exhausted = true;
        }
        iter
    }

    /// First gap-respecting lap combination for `stops` stops; false when the
    /// grid has no room for that many stops.
    fn seed_stops(&mut self, stops: usize) -> bool {
        self.stops = stops;
        self.comp_idx = vec![0; stops];
        self.lap_idx.clear();
        for i in 0..stops {
            let from = if i == 0 { 0 } else { self.lap_idx[i - 1] + 1 };
            match self.first_fit(i, from) {
                Some(j) => self.lap_idx.push(j),
                None => return false,
            }
        }
        true
    }

    /// Smallest grid index >= `from` whose lap keeps the minimum gap after
    /// position `i - 1`.
    fn first_fit(&self, i: usize, from: usize) -> Option<usize> {
        let mut j = from;
        while j < self.grid.len() {
            if i == 0 || self.grid[j] >= self.grid[self.lap_idx[i - 1]] + self.min_gap {
                return Some(j);
            }
            j += 1;
        }
        None
    }

    fn fill_tail(&mut self, start: usize) -> bool {
        for p in start..self.stops {
            match self.first_fit(p, self.lap_idx[p - 1] + 1) {
                Some(j) => self.lap_idx[p] = j,
                None => return false,
            }
        }
        true
    }

    /// Lexicographic successor of the current lap combination.
    fn advance_laps(&mut self) -> bool {
        for i in (0..self.stops).rev() {
            if let Some(j) = self.first_fit(i, self.lap_idx[i] + 1) {
                self.lap_idx[i] = j;
                if self.fill_tail(i + 1) {
                    return true;
                }
            }
        }
        false
    }

    fn advance(&mut self) {
        // Compound odometer first, then the lap combination, then more stops.
        for i in (0..self.stops).rev() {
            self.comp_idx[i] += 1;
            if self.comp_idx[i] < self.compounds.len() {
                return;
            }
            self.comp_idx[i] = 0;
        }
        if self.advance_laps() {
            return;
        }
        let next = self.stops + 1;
        if next > self.max_stops || !self.seed_stops(next) {
            self.exhausted = true;
        }
    }
}

impl Iterator for CandidateStrategies {
    type Item = Strategy;

    fn next(&mut self) -> Option<Strategy> {
        if self.exhausted {
            return None;
        }
        let stops = self
            .lap_idx
            .iter()
            .zip(&self.comp_idx)
            .map(|(&li, &ci)| PitStop::new(self.grid[li], self.compounds[ci]))
            .collect();
        let candidate = Strategy::new(stops);
        self.advance();
        Some(candidate)
    }
}

/// A scored candidate with a strict total order: total time, then fewer stops,
/// then the lexicographic (lap, compound) sequence. Distinct candidates never
/// compare equal, which makes the retained top-N independent of evaluation
/// order.
#[derive(Debug, Clone)]
struct Candidate {
    total_s: f64,
    strategy: Strategy,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_s
            .partial_cmp(&other.total_s)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.strategy.stop_count().cmp(&other.strategy.stop_count()))
            .then_with(|| {
                let a = self.strategy.stops().iter().map(|s| (s.lap, s.compound));
                let b = other.strategy.stops().iter().map(|s| (s.lap, s.compound));
                a.cmp(b)
            })
    }
}

/// Bounded best-candidates accumulator: a max-heap that keeps the N smallest
/// candidates seen.
struct TopN {
    cap: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopN {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            heap: BinaryHeap::with_capacity(cap + 1),
        }
    }

    fn push(&mut self, candidate: Candidate) {
        if self.heap.len() < self.cap {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    fn into_sorted(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// Enumerate, score and rank candidate stop plans for one competitor.
///
/// # Arguments
/// * `params` - candidate-space bounds (stop count, grid stride, compounds, N)
/// * `control` - cancellation/deadline; on trip the best results found so far
///   are returned with `timed_out` set
pub(crate) fn find_top_strategies(
    config: &SimConfig,
    race: &RaceData,
    competitor: CompetitorId,
    params: &SearchParams,
    opts: &SimOptions,
    control: &SearchControl,
) -> Result<SearchReport, SimError> {
    let comp = race.competitor(competitor)?;
    if params.max_stops > config.max_stops {
        return Err(SimError::InvalidStrategy(StrategyViolation::TooManyStops {
            count: params.max_stops,
            max: config.max_stops,
        }));
    }
    if control.tripped() {
        return Err(SimError::SearchTimedOut);
    }

    let integrator = LapTimeIntegrator::new(config, race);
    let baseline = BaselineTable::build(comp, race.total_laps);

    // The recorded plan is the yardstick for every candidate's improvement.
    let actual_total_s =
        integrator.total_race_time(comp, &baseline, &comp.actual_strategy, opts)?;

    let candidates = CandidateStrategies::new(
        race.total_laps,
        params.stride,
        config.min_stop_gap_laps,
        params.max_stops,
        params.compounds.clone(),
    );

    let started = Instant::now();
    let evaluated = AtomicUsize::new(0);
    let best = Mutex::new(TopN::new(params.top_n.max(1)));

    candidates.par_bridge().for_each(|strategy| {
        if control.tripped() {
            return;
        }
        match integrator.total_race_time(comp, &baseline, &strategy, opts) {
            Ok(total_s) => {
                evaluated.fetch_add(1, AtomicOrdering::Relaxed);
                best.lock().push(Candidate { total_s, strategy });
            }
            Err(err) => {
                // A candidate that cannot be priced (e.g. a coefficient table
                // pushed out of its plausible domain) is discarded, not fatal.
                tracing::debug!(%err, "discarded search candidate");
            }
        }
    });

    let timed_out = control.tripped();
    let evaluated = evaluated.load(AtomicOrdering::Relaxed);
    let strategies: Vec<RankedStrategy> = best
        .into_inner()
        .into_sorted()
        .into_iter()
        .enumerate()
        .map(|(i, c)| RankedStrategy {
            rank: i + 1,
            improvement_s: c.total_s - actual_total_s,
            total_s: c.total_s,
            strategy: c.strategy,
        })
        .collect();

    tracing::info!(
        competitor,
        evaluated,
        returned = strategies.len(),
        timed_out,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "strategy search complete"
    );

    Ok(SearchReport {
        competitor,
        actual_total_s,
        strategies,
        evaluated,
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_counts_single_and_double_stops() {
        // Grid 1..=10, gap 3: 10 single-stop plans plus 28 ordered pairs.
        let candidates: Vec<Strategy> =
            CandidateStrategies::new(10, 1, 3, 2, vec![Compound::Medium]).collect();
        assert_eq!(candidates.len(), 38);
        assert_eq!(candidates.iter().filter(|s| s.stop_count() == 1).count(), 10);
        assert_eq!(candidates.iter().filter(|s| s.stop_count() == 2).count(), 28);
    }

    #[test]
    fn generator_respects_the_minimum_gap() {
        for strategy in CandidateStrategies::new(
            20,
            1,
            3,
            3,
            vec![Compound::Soft, Compound::Hard],
        ) {
            assert!(strategy.validate(20, 3, 3).is_ok(), "invalid candidate {strategy:?}");
        }
    }

    #[test]
    fn generator_covers_every_compound_assignment() {
        let candidates: Vec<Strategy> = CandidateStrategies::new(
            6,
            1,
            3,
            1,
            vec![Compound::Soft, Compound::Medium],
        )
        .collect();
        // 6 candidate laps, 2 compounds each.
        assert_eq!(candidates.len(), 12);
    }

    #[test]
    fn generator_restarts_from_scratch() {
        let make = || {
            CandidateStrategies::new(10, 2, 3, 2, vec![Compound::Medium]).collect::<Vec<_>>()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn top_n_keeps_the_smallest() {
        let mut top = TopN::new(3);
        for total_s in [9.0, 1.0, 5.0, 3.0, 7.0] {
            top.push(Candidate {
                total_s,
                strategy: Strategy::default(),
            });
        }
        let kept: Vec<f64> = top.into_sorted().iter().map(|c| c.total_s).collect();
        assert_eq!(kept, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn ties_prefer_fewer_and_earlier_stops() {
        let one = Candidate {
            total_s: 100.0,
            strategy: Strategy::new(vec![PitStop::new(20, Compound::Soft)]),
        };
        let two = Candidate {
            total_s: 100.0,
            strategy: Strategy::new(vec![
                PitStop::new(10, Compound::Soft),
                PitStop::new(20, Compound::Soft),
            ]),
        };
        let later = Candidate {
            total_s: 100.0,
            strategy: Strategy::new(vec![PitStop::new(25, Compound::Soft)]),
        };
        assert!(one < two);
        assert!(one < later);
    }
}
