use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::strategy::Strategy;
use crate::tire::Compound;

pub type CompetitorId = u32;

/// Pit-crew efficiency class of a competitor's team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamTier {
    Top,
    Midfield,
    Back,
}

/// One recorded lap from the source race: lap number, wall-clock lap time and
/// the compound the competitor actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap: u32,
    pub time_s: f64,
    pub compound: Compound,
}

/// Everything the engine needs about one competitor, handed over as plain data
/// by whatever ingested the race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorData {
    pub id: CompetitorId,
    #[serde(default)]
    pub name: Option<String>,
    pub tier: TeamTier,
    pub laps: Vec<LapRecord>,
    #[serde(default)]
    pub actual_strategy: Strategy,
}

impl CompetitorData {
    /// Compound fitted on the grid: the earliest baseline record, falling back
    /// to Medium when no lap data exists.
    pub fn starting_compound(&self) -> Compound {
        self.laps
            .iter()
            .min_by_key(|r| r.lap)
            .map(|r| r.compound)
            .unwrap_or(Compound::Medium)
    }
}

/// Immutable per-race input: circuit, length and the competitor field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceData {
    pub circuit_id: String,
    pub total_laps: u32,
    competitors: BTreeMap<CompetitorId, CompetitorData>,
}

impl RaceData {
    pub fn new(
        circuit_id: impl Into<String>,
        total_laps: u32,
        competitors: Vec<CompetitorData>,
    ) -> Self {
        Self {
            circuit_id: circuit_id.into(),
            total_laps,
            competitors: competitors.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn competitor(&self, id: CompetitorId) -> Result<&CompetitorData, SimError> {
        self.competitors
            .get(&id)
            .ok_or(SimError::UnknownCompetitor(id))
    }

    pub fn competitors(&self) -> impl Iterator<Item = &CompetitorData> {
        self.competitors.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_compound_comes_from_earliest_record() {
        let comp = CompetitorData {
            id: 1,
            name: None,
            tier: TeamTier::Top,
            laps: vec![
                LapRecord { lap: 2, time_s: 91.0, compound: Compound::Soft },
                LapRecord { lap: 1, time_s: 90.0, compound: Compound::Hard },
            ],
            actual_strategy: Strategy::default(),
        };
        assert_eq!(comp.starting_compound(), Compound::Hard);
    }

    #[test]
    fn starting_compound_defaults_to_medium() {
        let comp = CompetitorData {
            id: 1,
            name: None,
            tier: TeamTier::Midfield,
            laps: Vec::new(),
            actual_strategy: Strategy::default(),
        };
        assert_eq!(comp.starting_compound(), Compound::Medium);
    }

    #[test]
    fn unknown_competitor_is_an_error() {
        let race = RaceData::new("suzuka", 53, Vec::new());
        let err = race.competitor(99).unwrap_err();
        assert!(matches!(err, SimError::UnknownCompetitor(99)));
    }
}
