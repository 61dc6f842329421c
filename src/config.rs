use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::pit_loss::{Factor, PhaseFactors, RandomVariation, SituationFactors, TeamFactors};
use crate::tire::{CompoundTable, DegradationBands};

/// Stationary work time of a modern stop (tire change).
const PIT_WORK_TIME_S: f64 = 2.3;
/// Seconds added per unit of entry/exit complexity above the simple baseline.
const COMPLEXITY_PENALTY_S: f64 = 2.0;

fn default_min_stop_gap() -> u32 {
    3
}

fn default_max_stops() -> usize {
    4
}

/// Theoretical pit-loss breakdown derived from circuit geometry: lane traverse
/// at the speed limit, entry/exit penalties, stationary work, and the total
/// including static track-position loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PitLaneTheory {
    pub traverse_s: f64,
    pub entry_penalty_s: f64,
    pub exit_penalty_s: f64,
    pub work_s: f64,
    pub lane_total_s: f64,
    pub total_loss_s: f64,
}

impl PitLaneTheory {
    fn compute(
        lane_length_m: f64,
        speed_limit_kph: f64,
        entry_complexity: f64,
        exit_complexity: f64,
        track_position_loss_s: f64,
    ) -> Self {
        let speed_mps = speed_limit_kph * 1000.0 / 3600.0;
        let traverse_s = lane_length_m / speed_mps;
        let entry_penalty_s = (entry_complexity - 1.0) * COMPLEXITY_PENALTY_S;
        let exit_penalty_s = (exit_complexity - 1.0) * COMPLEXITY_PENALTY_S;
        let lane_total_s = traverse_s + entry_penalty_s + exit_penalty_s + PIT_WORK_TIME_S;
        Self {
            traverse_s,
            entry_penalty_s,
            exit_penalty_s,
            work_s: PIT_WORK_TIME_S,
            lane_total_s,
            total_loss_s: lane_total_s + track_position_loss_s,
        }
    }
}

/// Immutable circuit reference data. `theory` is filled once when the config
/// is finalized and never touched afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub name: String,
    pub pit_lane_length_m: f64,
    pub pit_speed_limit_kph: f64,
    pub pit_entry_complexity: f64,
    pub pit_exit_complexity: f64,
    pub track_position_loss_s: f64,
    #[serde(skip)]
    pub theory: PitLaneTheory,
}

impl Circuit {
    fn new(
        name: &str,
        pit_lane_length_m: f64,
        pit_speed_limit_kph: f64,
        pit_entry_complexity: f64,
        pit_exit_complexity: f64,
        track_position_loss_s: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            pit_lane_length_m,
            pit_speed_limit_kph,
            pit_entry_complexity,
            pit_exit_complexity,
            track_position_loss_s,
            theory: PitLaneTheory::default(),
        }
    }
}

/// The whole coefficient set the engine runs on. Built once (from a model file
/// or the built-in tables), validated, then only ever shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Flat fallback when the race's circuit is not in the table.
    pub base_pit_loss_s: f64,
    pub circuits: BTreeMap<String, Circuit>,
    #[serde(default)]
    pub compounds: CompoundTable,
    #[serde(default)]
    pub degradation_bands: DegradationBands,
    pub lap_factors: PhaseFactors,
    pub team_factors: TeamFactors,
    pub situation_factors: SituationFactors,
    pub random_variation: RandomVariation,
    #[serde(default = "default_min_stop_gap")]
    pub min_stop_gap_laps: u32,
    #[serde(default = "default_max_stops")]
    pub max_stops: usize,
}

impl SimConfig {
    /// Load a model file (JSON), finalize the derived circuit data and
    /// validate the tables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        let mut config: SimConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse model file {}", path.display()))?;
        config.finalize();
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            circuits = config.circuits.len(),
            "loaded pit loss model"
        );
        Ok(config)
    }

    /// The built-in realistic model: circuit table and factor coefficients
    /// matching the shipped `models/race_model.json`.
    pub fn builtin() -> Self {
        let mut circuits = BTreeMap::new();
        circuits.insert(
            "suzuka".to_string(),
            Circuit::new("Suzuka International Racing Course", 310.0, 80.0, 1.3, 1.1, 18.0),
        );
        circuits.insert(
            "monaco".to_string(),
            Circuit::new("Circuit de Monaco", 350.0, 60.0, 1.8, 2.0, 22.5),
        );
        circuits.insert(
            "silverstone".to_string(),
            Circuit::new("Silverstone Circuit", 415.0, 80.0, 1.0, 1.2, 19.5),
        );
        circuits.insert(
            "monza".to_string(),
            Circuit::new("Autodromo Nazionale Monza", 385.0, 80.0, 1.1, 1.0, 16.5),
        );
        circuits.insert(
            "spa".to_string(),
            Circuit::new("Circuit de Spa-Francorchamps", 425.0, 80.0, 1.2, 1.4, 21.0),
        );

        let mut config = Self {
            base_pit_loss_s: 35.0,
            circuits,
            compounds: CompoundTable::default(),
            degradation_bands: DegradationBands::default(),
            lap_factors: PhaseFactors {
                early_race: Factor {
                    factor: 1.1,
                    description: "Early race with formation and initial traffic".to_string(),
                },
                mid_race: Factor {
                    factor: 1.0,
                    description: "Normal racing conditions".to_string(),
                },
                late_race: Factor {
                    factor: 0.95,
                    description: "Late race with reduced traffic".to_string(),
                },
            },
            team_factors: TeamFactors {
                top_teams: Factor {
                    factor: 0.88,
                    description: "Elite pit crews with the fastest equipment".to_string(),
                },
                midfield_teams: Factor {
                    factor: 1.0,
                    description: "Standard pit crews".to_string(),
                },
                back_teams: Factor {
                    factor: 1.12,
                    description: "Developing teams with limited resources".to_string(),
                },
            },
            situation_factors: SituationFactors {
                safety_car: Factor {
                    factor: 1.2,
                    description: "Pit lane congestion during a safety car".to_string(),
                },
                rain: Factor {
                    factor: 1.15,
                    description: "Slower operations in wet conditions".to_string(),
                },
                damaged_car: Factor {
                    factor: 1.25,
                    description: "Additional time for damage assessment".to_string(),
                },
            },
            random_variation: RandomVariation {
                std_dev: 1.0,
                min_factor: 0.9,
                max_factor: 1.15,
            },
            min_stop_gap_laps: default_min_stop_gap(),
            max_stops: default_max_stops(),
        };
        config.finalize();
        config
    }

    /// Precompute the theoretical pit-loss breakdown for every circuit.
    fn finalize(&mut self) {
        for circuit in self.circuits.values_mut() {
            circuit.theory = PitLaneTheory::compute(
                circuit.pit_lane_length_m,
                circuit.pit_speed_limit_kph,
                circuit.pit_entry_complexity,
                circuit.pit_exit_complexity,
                circuit.track_position_loss_s,
            );
        }
    }

    /// Reject coefficient tables that cannot produce meaningful simulations.
    pub fn validate(&self) -> Result<()> {
        if !self.base_pit_loss_s.is_finite() || self.base_pit_loss_s <= 0.0 {
            bail!("base_pit_loss_s must be positive, got {}", self.base_pit_loss_s);
        }
        for factor in [
            &self.lap_factors.early_race,
            &self.lap_factors.mid_race,
            &self.lap_factors.late_race,
            &self.team_factors.top_teams,
            &self.team_factors.midfield_teams,
            &self.team_factors.back_teams,
            &self.situation_factors.safety_car,
            &self.situation_factors.rain,
            &self.situation_factors.damaged_car,
        ] {
            if !factor.factor.is_finite() || factor.factor <= 0.0 {
                bail!("factor '{}' must be positive, got {}", factor.description, factor.factor);
            }
        }
        let rv = &self.random_variation;
        if !rv.std_dev.is_finite() || rv.std_dev < 0.0 {
            bail!("random_variation.std_dev must be non-negative, got {}", rv.std_dev);
        }
        if rv.min_factor <= 0.0 || rv.min_factor > rv.max_factor {
            bail!(
                "random_variation bounds must satisfy 0 < min_factor <= max_factor, got {}..{}",
                rv.min_factor,
                rv.max_factor
            );
        }
        let bands = &self.degradation_bands;
        if bands.early_until_laps >= bands.mid_until_laps {
            bail!(
                "degradation bands must be ordered, got early_until {} >= mid_until {}",
                bands.early_until_laps,
                bands.mid_until_laps
            );
        }
        for (id, circuit) in &self.circuits {
            if circuit.pit_lane_length_m <= 0.0 || circuit.pit_speed_limit_kph <= 0.0 {
                bail!("circuit '{id}' has non-positive pit lane geometry");
            }
        }
        if self.min_stop_gap_laps < 1 {
            bail!("min_stop_gap_laps must be at least 1");
        }
        if self.max_stops < 1 {
            bail!("max_stops must be at least 1");
        }
        Ok(())
    }

    pub fn circuit(&self, id: &str) -> Option<&Circuit> {
        self.circuits.get(id)
    }
}
