use serde::{Deserialize, Serialize};

use crate::error::StrategyViolation;
use crate::tire::Compound;

/// One planned tire change. A supplied `pit_loss_s` is used verbatim by the
/// integrator; `None` means the pit-loss model computes it from circuit and
/// race context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitStop {
    pub lap: u32,
    pub compound: Compound,
    #[serde(default)]
    pub pit_loss_s: Option<f64>,
}

impl PitStop {
    pub fn new(lap: u32, compound: Compound) -> Self {
        Self {
            lap,
            compound,
            pit_loss_s: None,
        }
    }

    pub fn with_pit_loss(lap: u32, compound: Compound, pit_loss_s: f64) -> Self {
        Self {
            lap,
            compound,
            pit_loss_s: Some(pit_loss_s),
        }
    }
}

/// An ordered stop plan. Two strategies are equal iff their stop sequences are
/// identical. Construction does not validate; the engine validates against the
/// race context before any simulation work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strategy {
    stops: Vec<PitStop>,
}

impl Strategy {
    pub fn new(stops: Vec<PitStop>) -> Self {
        Self { stops }
    }

    pub fn stops(&self) -> &[PitStop] {
        &self.stops
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Check every stop-plan invariant: laps inside the race, strictly
    /// increasing, minimum gap respected, stop count bounded. Zero stops is a
    /// valid plan.
    pub fn validate(
        &self,
        race_laps: u32,
        min_gap_laps: u32,
        max_stops: usize,
    ) -> Result<(), StrategyViolation> {
        if self.stops.len() > max_stops {
            return Err(StrategyViolation::TooManyStops {
                count: self.stops.len(),
                max: max_stops,
            });
        }
        for stop in &self.stops {
            if stop.lap < 1 || stop.lap > race_laps {
                return Err(StrategyViolation::StopLapOutOfRange {
                    lap: stop.lap,
                    race_laps,
                });
            }
        }
        for pair in self.stops.windows(2) {
            let (prev, next) = (pair[0].lap, pair[1].lap);
            if next <= prev {
                return Err(StrategyViolation::StopsNotIncreasing { prev, lap: next });
            }
            if next - prev < min_gap_laps {
                return Err(StrategyViolation::MinGapViolated {
                    prev,
                    lap: next,
                    min_gap: min_gap_laps,
                });
            }
        }
        Ok(())
    }

    /// Partition the race into stints, with `starting_compound` fitted on the
    /// grid. A stop on lap N starts its stint on lap N (the set is fitted
    /// during that lap).
    pub fn stints(&self, race_laps: u32, starting_compound: Compound) -> Vec<Stint> {
        let mut stints = Vec::with_capacity(self.stops.len() + 1);
        let mut number = 1;

        match self.stops.first() {
            None => {
                stints.push(Stint {
                    number,
                    compound: starting_compound,
                    start_lap: 1,
                    end_lap: race_laps,
                });
                return stints;
            }
            Some(first) if first.lap > 1 => {
                stints.push(Stint {
                    number,
                    compound: starting_compound,
                    start_lap: 1,
                    end_lap: first.lap - 1,
                });
                number += 1;
            }
            Some(_) => {}
        }

        for (i, stop) in self.stops.iter().enumerate() {
            let end_lap = match self.stops.get(i + 1) {
                Some(next) => next.lap - 1,
                None => race_laps,
            };
            stints.push(Stint {
                number,
                compound: stop.compound,
                start_lap: stop.lap,
                end_lap,
            });
            number += 1;
        }
        stints
    }
}

/// A contiguous run of laps on one set of tires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stint {
    pub number: usize,
    pub compound: Compound,
    pub start_lap: u32,
    pub end_lap: u32,
}

impl Stint {
    pub fn len_laps(&self) -> u32 {
        self.end_lap - self.start_lap + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(lap: u32) -> PitStop {
        PitStop::new(lap, Compound::Medium)
    }

    #[test]
    fn empty_strategy_is_valid() {
        assert!(Strategy::default().validate(53, 3, 4).is_ok());
    }

    #[test]
    fn each_violation_is_reported() {
        assert_eq!(
            Strategy::new(vec![stop(60)]).validate(53, 3, 4),
            Err(StrategyViolation::StopLapOutOfRange { lap: 60, race_laps: 53 })
        );
        assert_eq!(
            Strategy::new(vec![stop(0)]).validate(53, 3, 4),
            Err(StrategyViolation::StopLapOutOfRange { lap: 0, race_laps: 53 })
        );
        assert_eq!(
            Strategy::new(vec![stop(20), stop(20)]).validate(53, 3, 4),
            Err(StrategyViolation::StopsNotIncreasing { prev: 20, lap: 20 })
        );
        assert_eq!(
            Strategy::new(vec![stop(20), stop(22)]).validate(53, 3, 4),
            Err(StrategyViolation::MinGapViolated { prev: 20, lap: 22, min_gap: 3 })
        );
        assert_eq!(
            Strategy::new(vec![stop(5), stop(10), stop(15)]).validate(53, 3, 2),
            Err(StrategyViolation::TooManyStops { count: 3, max: 2 })
        );
    }

    #[test]
    fn stints_partition_the_race() {
        let strategy = Strategy::new(vec![
            PitStop::new(15, Compound::Soft),
            PitStop::new(35, Compound::Medium),
        ]);
        let stints = strategy.stints(53, Compound::Medium);
        assert_eq!(stints.len(), 3);
        assert_eq!((stints[0].start_lap, stints[0].end_lap), (1, 14));
        assert_eq!(stints[0].compound, Compound::Medium);
        assert_eq!((stints[1].start_lap, stints[1].end_lap), (15, 34));
        assert_eq!(stints[1].compound, Compound::Soft);
        assert_eq!((stints[2].start_lap, stints[2].end_lap), (35, 53));
        assert_eq!(stints[2].compound, Compound::Medium);
        assert_eq!(stints.iter().map(Stint::len_laps).sum::<u32>(), 53);
    }

    #[test]
    fn zero_stop_strategy_is_a_single_stint() {
        let stints = Strategy::default().stints(53, Compound::Hard);
        assert_eq!(stints.len(), 1);
        assert_eq!((stints[0].start_lap, stints[0].end_lap), (1, 53));
        assert_eq!(stints[0].compound, Compound::Hard);
    }

    #[test]
    fn lap_one_stop_has_no_opening_stint() {
        let stints = Strategy::new(vec![PitStop::new(1, Compound::Hard)])
            .stints(53, Compound::Medium);
        assert_eq!(stints.len(), 1);
        assert_eq!(stints[0].compound, Compound::Hard);
        assert_eq!((stints[0].start_lap, stints[0].end_lap), (1, 53));
    }
}
