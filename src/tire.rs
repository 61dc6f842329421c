use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// The closed set of tire compounds the engine understands. Anything else is
/// rejected at the boundary via [`Compound::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

impl Compound {
    /// Parse a compound from its race-data name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, SimError> {
        match name.to_ascii_uppercase().as_str() {
            "SOFT" => Ok(Compound::Soft),
            "MEDIUM" => Ok(Compound::Medium),
            "HARD" => Ok(Compound::Hard),
            "INTERMEDIATE" => Ok(Compound::Intermediate),
            "WET" => Ok(Compound::Wet),
            _ => Err(SimError::InvalidCompound(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-compound coefficients: lap-time delta vs the reference compound and the
/// linear wear term in seconds per lap on tire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundSpec {
    pub base_delta_s: f64,
    pub degradation_s_per_lap: f64,
}

/// One spec per compound variant. A struct rather than a keyed map so a missing
/// entry cannot exist and an unknown key cannot be introduced by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundTable {
    pub soft: CompoundSpec,
    pub medium: CompoundSpec,
    pub hard: CompoundSpec,
    pub intermediate: CompoundSpec,
    pub wet: CompoundSpec,
}

impl CompoundTable {
    pub fn spec(&self, compound: Compound) -> &CompoundSpec {
        match compound {
            Compound::Soft => &self.soft,
            Compound::Medium => &self.medium,
            Compound::Hard => &self.hard,
            Compound::Intermediate => &self.intermediate,
            Compound::Wet => &self.wet,
        }
    }
}

impl Default for CompoundTable {
    fn default() -> Self {
        Self {
            soft: CompoundSpec {
                base_delta_s: -0.6,
                degradation_s_per_lap: 0.08,
            },
            medium: CompoundSpec {
                base_delta_s: 0.0,
                degradation_s_per_lap: 0.05,
            },
            hard: CompoundSpec {
                base_delta_s: 0.5,
                degradation_s_per_lap: 0.03,
            },
            intermediate: CompoundSpec {
                base_delta_s: 5.0,
                degradation_s_per_lap: 0.06,
            },
            wet: CompoundSpec {
                base_delta_s: 9.0,
                degradation_s_per_lap: 0.04,
            },
        }
    }
}

/// Laps-on-tire bands that scale the linear wear term: damped early life,
/// nominal mid life, accelerated late life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradationBands {
    pub early_until_laps: u32,
    pub mid_until_laps: u32,
    pub early_scale: f64,
    pub mid_scale: f64,
    pub late_scale: f64,
}

impl DegradationBands {
    pub fn scale(&self, laps_on_tire: u32) -> f64 {
        if laps_on_tire <= self.early_until_laps {
            self.early_scale
        } else if laps_on_tire <= self.mid_until_laps {
            self.mid_scale
        } else {
            self.late_scale
        }
    }
}

impl Default for DegradationBands {
    fn default() -> Self {
        Self {
            early_until_laps: 5,
            mid_until_laps: 15,
            early_scale: 0.3,
            mid_scale: 1.0,
            late_scale: 2.0,
        }
    }
}

/// Pure per-compound lap-time delta model.
#[derive(Debug, Clone, Copy)]
pub struct TireModel<'a> {
    table: &'a CompoundTable,
    bands: &'a DegradationBands,
}

impl<'a> TireModel<'a> {
    pub fn new(table: &'a CompoundTable, bands: &'a DegradationBands) -> Self {
        Self { table, bands }
    }

    /// Lap-time delta in seconds for `compound` after `laps_on_tire` completed
    /// laps on the set. Zero laps on tire means the lap the set was fitted.
    pub fn lap_time_delta(&self, compound: Compound, laps_on_tire: u32) -> f64 {
        let spec = self.table.spec(compound);
        spec.base_delta_s
            + spec.degradation_s_per_lap * f64::from(laps_on_tire) * self.bands.scale(laps_on_tire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_scale_boundaries() {
        let bands = DegradationBands::default();
        assert_eq!(bands.scale(0), 0.3);
        assert_eq!(bands.scale(5), 0.3);
        assert_eq!(bands.scale(6), 1.0);
        assert_eq!(bands.scale(15), 1.0);
        assert_eq!(bands.scale(16), 2.0);
        assert_eq!(bands.scale(40), 2.0);
    }

    #[test]
    fn delta_follows_band_scaled_wear() {
        let table = CompoundTable::default();
        let bands = DegradationBands::default();
        let model = TireModel::new(&table, &bands);

        // Fresh set: base delta only.
        assert!((model.lap_time_delta(Compound::Medium, 0) - 0.0).abs() < 1e-12);
        // Early life is damped.
        assert!((model.lap_time_delta(Compound::Soft, 3) - (-0.6 + 0.08 * 3.0 * 0.3)).abs() < 1e-12);
        // Mid life is nominal.
        assert!((model.lap_time_delta(Compound::Medium, 10) - 0.5).abs() < 1e-12);
        // Late life accelerates.
        assert!((model.lap_time_delta(Compound::Hard, 20) - (0.5 + 0.03 * 20.0 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn compound_names_round_trip() {
        for compound in [
            Compound::Soft,
            Compound::Medium,
            Compound::Hard,
            Compound::Intermediate,
            Compound::Wet,
        ] {
            assert_eq!(Compound::from_name(compound.name()).unwrap(), compound);
        }
        assert_eq!(Compound::from_name("soft").unwrap(), Compound::Soft);
    }

    #[test]
    fn unknown_compound_is_rejected() {
        let err = Compound::from_name("ULTRASOFT").unwrap_err();
        assert!(matches!(err, SimError::InvalidCompound(name) if name == "ULTRASOFT"));
    }
}
