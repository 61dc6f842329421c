use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::{Circuit, SimConfig};
use crate::error::SimError;
use crate::race::TeamTier;

/// Plausible domain for a single pit loss. Computed values are clamped into
/// this range; values far outside it indicate a broken coefficient table and
/// are rejected instead of clamped.
pub const PIT_LOSS_MIN_S: f64 = 15.0;
pub const PIT_LOSS_MAX_S: f64 = 40.0;
const PLAUSIBLE_LOW_SCALE: f64 = 0.5;
const PLAUSIBLE_HIGH_SCALE: f64 = 2.0;

/// A transient event affecting a stop. At most one applies per stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    SafetyCar,
    Rain,
    DamagedCar,
}

/// A named multiplicative coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub factor: f64,
    pub description: String,
}

/// Pit-loss multipliers by race phase. Phases are thirds of the race distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseFactors {
    pub early_race: Factor,
    pub mid_race: Factor,
    pub late_race: Factor,
}

impl PhaseFactors {
    pub fn factor_for(&self, lap: u32, race_laps: u32) -> f64 {
        let frac = f64::from(lap) / f64::from(race_laps.max(1));
        if frac <= 1.0 / 3.0 {
            self.early_race.factor
        } else if frac <= 2.0 / 3.0 {
            self.mid_race.factor
        } else {
            self.late_race.factor
        }
    }
}

/// Pit-crew efficiency multipliers by team tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFactors {
    pub top_teams: Factor,
    pub midfield_teams: Factor,
    pub back_teams: Factor,
}

impl TeamFactors {
    pub fn factor(&self, tier: TeamTier) -> f64 {
        match tier {
            TeamTier::Top => self.top_teams.factor,
            TeamTier::Midfield => self.midfield_teams.factor,
            TeamTier::Back => self.back_teams.factor,
        }
    }
}

/// Multipliers for transient events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationFactors {
    pub safety_car: Factor,
    pub rain: Factor,
    pub damaged_car: Factor,
}

impl SituationFactors {
    pub fn factor(&self, situation: Situation) -> f64 {
        match situation {
            Situation::SafetyCar => self.safety_car.factor,
            Situation::Rain => self.rain.factor,
            Situation::DamagedCar => self.damaged_car.factor,
        }
    }
}

/// Bounded stochastic spread of pit-stop execution. The multiplier is drawn
/// from `Normal(1.0, std_dev / 6)` and clipped to `[min_factor, max_factor]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomVariation {
    pub std_dev: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

/// Factor-by-factor decomposition of one computed pit loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitLossBreakdown {
    pub base_s: f64,
    pub phase_factor: f64,
    pub team_factor: f64,
    pub situation_factor: f64,
    pub random_factor: f64,
    pub raw_s: f64,
    pub clamped_s: f64,
}

/// Contextual pit-loss model: circuit base cost scaled by phase, team tier,
/// situation and bounded random variation.
#[derive(Debug, Clone, Copy)]
pub struct PitLossModel<'a> {
    config: &'a SimConfig,
}

impl<'a> PitLossModel<'a> {
    pub fn new(config: &'a SimConfig) -> Self {
        Self { config }
    }

    /// Pit loss in seconds for a stop on `lap`.
    ///
    /// # Arguments
    /// * `circuit` - circuit reference data; `None` falls back to the flat base loss
    /// * `seed` - per-stop seed for a reproducible random draw; `None` uses the
    ///   process generator
    pub fn pit_loss(
        &self,
        circuit: Option<&Circuit>,
        lap: u32,
        tier: TeamTier,
        situation: Option<Situation>,
        race_laps: u32,
        seed: Option<u64>,
    ) -> Result<f64, SimError> {
        Ok(self
            .breakdown(circuit, lap, tier, situation, race_laps, seed)?
            .clamped_s)
    }

    /// Same as [`pit_loss`](Self::pit_loss) but returns the full factor
    /// breakdown.
    pub fn breakdown(
        &self,
        circuit: Option<&Circuit>,
        lap: u32,
        tier: TeamTier,
        situation: Option<Situation>,
        race_laps: u32,
        seed: Option<u64>,
    ) -> Result<PitLossBreakdown, SimError> {
        let base_s = circuit
            .map(|c| c.theory.total_loss_s)
            .unwrap_or(self.config.base_pit_loss_s);

        let phase_factor = self.config.lap_factors.factor_for(lap, race_laps);
        let team_factor = self.config.team_factors.factor(tier);
        let situation_factor = situation
            .map(|s| self.config.situation_factors.factor(s))
            .unwrap_or(1.0);
        let random_factor = self.random_factor(seed);

        let raw_s = base_s * phase_factor * team_factor * situation_factor * random_factor;
        if raw_s < PIT_LOSS_MIN_S * PLAUSIBLE_LOW_SCALE
            || raw_s > PIT_LOSS_MAX_S * PLAUSIBLE_HIGH_SCALE
        {
            return Err(SimError::PitLossOutOfRange {
                computed_s: raw_s,
                min_s: PIT_LOSS_MIN_S,
                max_s: PIT_LOSS_MAX_S,
            });
        }
        let clamped_s = raw_s.clamp(PIT_LOSS_MIN_S, PIT_LOSS_MAX_S);

        tracing::trace!(
            base_s,
            phase_factor,
            team_factor,
            situation_factor,
            random_factor,
            clamped_s,
            "pit loss breakdown"
        );

        Ok(PitLossBreakdown {
            base_s,
            phase_factor,
            team_factor,
            situation_factor,
            random_factor,
            raw_s,
            clamped_s,
        })
    }

    fn random_factor(&self, seed: Option<u64>) -> f64 {
        let rv = &self.config.random_variation;
        if rv.std_dev <= 0.0 {
            return 1.0_f64.clamp(rv.min_factor, rv.max_factor);
        }
        let Ok(normal) = Normal::new(1.0, rv.std_dev / 6.0) else {
            return 1.0_f64.clamp(rv.min_factor, rv.max_factor);
        };
        let draw = match seed {
            Some(s) => normal.sample(&mut ChaCha8Rng::seed_from_u64(s)),
            None => normal.sample(&mut rand::thread_rng()),
        };
        draw.clamp(rv.min_factor, rv.max_factor)
    }
}
