//! Drift simulator configuration with tunable rates.

use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the offline drift simulator.
#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Time between drift ticks; each tick ages slots by one minute (default: 60s)
    pub tick_period: Duration,
    /// Per-tick flip probability before any scaling (default: 0.02)
    pub base_probability: f64,
    /// Per-floor multiplier (default: floor 1 → 1.5, floor 3 → 0.5)
    pub floor_multipliers: BTreeMap<i64, f64>,
    /// Multiplier for floors missing from the table (default: 1.0)
    pub default_floor_multiplier: f64,
    /// Occupied longer than this many minutes counts as a long stay (default: 120)
    pub long_stay_minutes: u32,
    /// Scale applied to long stays (default: 2.0)
    pub long_stay_multiplier: f64,
    /// Vacant longer than this many minutes counts as long vacant (default: 60)
    pub long_vacant_minutes: u32,
    /// Scale applied to long-vacant slots (default: 1.5)
    pub long_vacant_multiplier: f64,
    /// Fixed RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(60),
            base_probability: 0.02,
            floor_multipliers: BTreeMap::from([(1, 1.5), (3, 0.5)]),
            default_floor_multiplier: 1.0,
            long_stay_minutes: 120,
            long_stay_multiplier: 2.0,
            long_vacant_minutes: 60,
            long_vacant_multiplier: 1.5,
            seed: None,
        }
    }
}

impl DriftConfig {
    /// Create a new config builder.
    pub fn builder() -> DriftConfigBuilder {
        DriftConfigBuilder::default()
    }

    /// Lively car park: flips are more frequent everywhere.
    pub fn busy() -> Self {
        Self {
            base_probability: 0.05,
            ..Default::default()
        }
    }

    /// Quiet car park: occupancy barely moves while offline.
    pub fn calm() -> Self {
        Self {
            base_probability: 0.005,
            long_stay_multiplier: 1.5,
            long_vacant_multiplier: 1.2,
            ..Default::default()
        }
    }

    /// Multiplier for `floor`, falling back to the default.
    pub fn floor_multiplier(&self, floor: i64) -> f64 {
        self.floor_multipliers
            .get(&floor)
            .copied()
            .unwrap_or(self.default_floor_multiplier)
    }
}

/// Builder pattern for DriftConfig.
#[derive(Default)]
pub struct DriftConfigBuilder {
    config: DriftConfig,
}

impl DriftConfigBuilder {
    pub fn tick_period(mut self, period: Duration) -> Self {
        self.config.tick_period = period;
        self
    }

    pub fn base_probability(mut self, p: f64) -> Self {
        self.config.base_probability = p;
        self
    }

    /// Set (or replace) the multiplier for one floor.
    pub fn floor_multiplier(mut self, floor: i64, multiplier: f64) -> Self {
        self.config.floor_multipliers.insert(floor, multiplier);
        self
    }

    /// Drop the built-in floor table.
    pub fn clear_floor_multipliers(mut self) -> Self {
        self.config.floor_multipliers.clear();
        self
    }

    pub fn default_floor_multiplier(mut self, multiplier: f64) -> Self {
        self.config.default_floor_multiplier = multiplier;
        self
    }

    /// Threshold (minutes) and multiplier for long stays.
    pub fn long_stay(mut self, minutes: u32, multiplier: f64) -> Self {
        self.config.long_stay_minutes = minutes;
        self.config.long_stay_multiplier = multiplier;
        self
    }

    /// Threshold (minutes) and multiplier for long-vacant slots.
    pub fn long_vacant(mut self, minutes: u32, multiplier: f64) -> Self {
        self.config.long_vacant_minutes = minutes;
        self.config.long_vacant_multiplier = multiplier;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> DriftConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriftConfig::default();
        assert_eq!(config.tick_period, Duration::from_secs(60));
        assert_eq!(config.base_probability, 0.02);
        assert_eq!(config.long_stay_multiplier, 2.0);
        assert_eq!(config.long_vacant_multiplier, 1.5);
    }

    #[test]
    fn test_floor_table_fallback() {
        let config = DriftConfig::default();
        assert_eq!(config.floor_multiplier(1), 1.5);
        assert_eq!(config.floor_multiplier(3), 0.5);
        assert_eq!(config.floor_multiplier(7), 1.0);
    }

    #[test]
    fn test_builder() {
        let config = DriftConfig::builder()
            .clear_floor_multipliers()
            .floor_multiplier(-1, 0.2)
            .long_stay(30, 3.0)
            .seed(7)
            .build();

        assert_eq!(config.floor_multiplier(1), 1.0);
        assert_eq!(config.floor_multiplier(-1), 0.2);
        assert_eq!(config.long_stay_minutes, 30);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_presets() {
        assert!(DriftConfig::calm().base_probability < DriftConfig::busy().base_probability);
    }
}
