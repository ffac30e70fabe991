//! Seasonal parameter bundles.
//!
//! A run picks one [`SeasonalBundle`] at startup from the total number of
//! simulated weeks. The bundle seeds every newly populated cell and supplies
//! the environmental drivers (temperature, dissolved oxygen, redox potential)
//! read by the biogeochemical models.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Seasonal regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Select the season for an elapsed week count.
    ///
    /// Ranges are `[0, 13)` spring, `[13, 26)` summer, `[26, 39)` autumn and
    /// `[39, ∞)` winter.
    pub fn from_weeks(elapsed_weeks: usize) -> Self {
        match elapsed_weeks {
            0..13 => Season::Spring,
            13..26 => Season::Summer,
            26..39 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// Constants of one seasonal regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBundle {
    /// Seagrass biomass.
    pub r: f64,
    /// Seagrass internal nitrogen reserve.
    pub nrint: f64,
    /// Organic nitrogen.
    pub n_org: f64,
    /// Ammonium.
    pub nh4: f64,
    /// Nitrite.
    pub no2: f64,
    /// Nitrate.
    pub no3: f64,
    /// Particulate organic phosphorus.
    pub pop: f64,
    /// Soluble reactive phosphorus.
    pub srp: f64,
    /// Macroalgal internal phosphorus.
    pub p_ma_int: f64,
    /// Seagrass internal phosphorus.
    pub p_r_int: f64,

    pub growth_rate: f64,
    pub germination_rate: f64,
    pub reproduction_rate: f64,

    /// Water temperature (°C).
    pub temperature: f64,
    pub oxygen: f64,
    /// Sediment redox potential (mV).
    pub orp_s: f64,
    /// Dissolved oxygen (mg/L).
    pub dissolved_oxygen: f64,
}

impl SeasonalBundle {
    /// Look up the bundle for an elapsed week count.
    pub fn lookup(elapsed_weeks: usize) -> Self {
        Self::for_season(Season::from_weeks(elapsed_weeks))
    }

    pub fn for_season(season: Season) -> Self {
        // Nutrient pools share the same starting values in every season.
        let base = Self {
            r: 0.0,
            nrint: 2.4,
            n_org: 25.0,
            nh4: 0.05,
            no2: 0.01,
            no3: 0.22,
            pop: 0.23,
            srp: 0.12,
            p_ma_int: 0.02,
            p_r_int: 0.02,
            growth_rate: 0.0,
            germination_rate: 3.0,
            reproduction_rate: 5.5,
            temperature: 0.0,
            oxygen: 3.62,
            orp_s: 0.0,
            dissolved_oxygen: 4.97,
        };

        match season {
            Season::Spring => Self {
                r: 110.0,
                growth_rate: 0.84,
                temperature: 16.5,
                orp_s: 100.0,
                ..base
            },
            Season::Summer => Self {
                r: 120.0,
                growth_rate: 0.91,
                temperature: 18.0,
                oxygen: 3.26,
                orp_s: 400.0,
                ..base
            },
            Season::Autumn => Self {
                r: 90.0,
                growth_rate: 0.56,
                germination_rate: 2.4,
                reproduction_rate: 4.4,
                temperature: 13.5,
                orp_s: 200.0,
                ..base
            },
            Season::Winter => Self {
                r: 70.0,
                growth_rate: 0.35,
                germination_rate: 1.5,
                reproduction_rate: 2.75,
                temperature: 9.0,
                orp_s: -100.0,
                ..base
            },
        }
    }

    /// Apply user overrides, keeping the seasonal value of every unset field.
    pub fn with_overrides(self, ovr: &Overrides) -> Self {
        let pick = |val: Option<f64>, def: f64| val.unwrap_or(def);
        Self {
            r: pick(ovr.r, self.r),
            nrint: pick(ovr.nrint, self.nrint),
            n_org: pick(ovr.n_org, self.n_org),
            nh4: pick(ovr.nh4, self.nh4),
            no2: pick(ovr.no2, self.no2),
            no3: pick(ovr.no3, self.no3),
            pop: pick(ovr.pop, self.pop),
            srp: pick(ovr.srp, self.srp),
            p_ma_int: pick(ovr.p_ma_int, self.p_ma_int),
            p_r_int: pick(ovr.p_r_int, self.p_r_int),
            growth_rate: pick(ovr.growth_rate, self.growth_rate),
            germination_rate: pick(ovr.germination_rate, self.germination_rate),
            reproduction_rate: pick(ovr.reproduction_rate, self.reproduction_rate),
            temperature: pick(ovr.temperature, self.temperature),
            oxygen: pick(ovr.oxygen, self.oxygen),
            orp_s: pick(ovr.orp_s, self.orp_s),
            dissolved_oxygen: pick(ovr.dissolved_oxygen, self.dissolved_oxygen),
        }
    }
}

/// Optional replacement values for [`SeasonalBundle`] fields.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub r: Option<f64>,
    pub nrint: Option<f64>,
    pub n_org: Option<f64>,
    pub nh4: Option<f64>,
    pub no2: Option<f64>,
    pub no3: Option<f64>,
    pub pop: Option<f64>,
    pub srp: Option<f64>,
    pub p_ma_int: Option<f64>,
    pub p_r_int: Option<f64>,
    pub growth_rate: Option<f64>,
    pub germination_rate: Option<f64>,
    pub reproduction_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub oxygen: Option<f64>,
    pub orp_s: Option<f64>,
    pub dissolved_oxygen: Option<f64>,
}

impl Overrides {
    /// Check that set values are finite and that pool sizes and oxygen levels
    /// are non-negative.
    pub fn validate(&self) -> Result<()> {
        let pools = [
            ("r", self.r),
            ("nrint", self.nrint),
            ("n_org", self.n_org),
            ("nh4", self.nh4),
            ("no2", self.no2),
            ("no3", self.no3),
            ("pop", self.pop),
            ("srp", self.srp),
            ("p_ma_int", self.p_ma_int),
            ("p_r_int", self.p_r_int),
        ];
        let drivers = [
            ("growth_rate", self.growth_rate),
            ("germination_rate", self.germination_rate),
            ("reproduction_rate", self.reproduction_rate),
            ("temperature", self.temperature),
            ("oxygen", self.oxygen),
            ("orp_s", self.orp_s),
            ("dissolved_oxygen", self.dissolved_oxygen),
        ];
        for (name, val) in pools.iter().chain(&drivers) {
            if let Some(val) = val {
                if !val.is_finite() {
                    bail!("{name} must be finite, but is {val}");
                }
            }
        }
        let oxygen = [
            ("oxygen", self.oxygen),
            ("dissolved_oxygen", self.dissolved_oxygen),
        ];
        for (name, val) in pools.into_iter().chain(oxygen) {
            if let Some(val) = val {
                if val < 0.0 {
                    bail!("{name} must be non-negative, but is {val}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_boundaries() {
        assert_eq!(Season::from_weeks(0), Season::Spring);
        assert_eq!(Season::from_weeks(12), Season::Spring);
        assert_eq!(Season::from_weeks(13), Season::Summer);
        assert_eq!(Season::from_weeks(25), Season::Summer);
        assert_eq!(Season::from_weeks(26), Season::Autumn);
        assert_eq!(Season::from_weeks(38), Season::Autumn);
        assert_eq!(Season::from_weeks(39), Season::Winter);
        assert_eq!(Season::from_weeks(260), Season::Winter);
    }

    #[test]
    fn lookup_selects_seasonal_values() {
        let spring = SeasonalBundle::lookup(4);
        assert_eq!(spring.r, 110.0);
        assert_eq!(spring.orp_s, 100.0);

        let winter = SeasonalBundle::lookup(52);
        assert_eq!(winter.r, 70.0);
        assert_eq!(winter.temperature, 9.0);
        assert_eq!(winter.orp_s, -100.0);
    }

    #[test]
    fn overrides_keep_unset_fields() {
        let ovr = Overrides {
            nh4: Some(0.78),
            temperature: Some(19.96),
            ..Default::default()
        };
        let base = SeasonalBundle::lookup(0);
        let bundle = base.clone().with_overrides(&ovr);
        assert_eq!(bundle.nh4, 0.78);
        assert_eq!(bundle.temperature, 19.96);
        assert_eq!(bundle.r, base.r);
        assert_eq!(bundle.srp, base.srp);
    }

    #[test]
    fn overrides_validation() {
        let ovr = Overrides {
            orp_s: Some(-250.0),
            ..Default::default()
        };
        assert!(ovr.validate().is_ok());

        let ovr = Overrides {
            srp: Some(-0.1),
            ..Default::default()
        };
        assert!(ovr.validate().is_err());

        let ovr = Overrides {
            temperature: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(ovr.validate().is_err());

        let ovr = Overrides {
            dissolved_oxygen: Some(-1.0),
            ..Default::default()
        };
        assert!(ovr.validate().is_err());

        let ovr = Overrides {
            oxygen: Some(-0.5),
            ..Default::default()
        };
        assert!(ovr.validate().is_err());
    }
}
