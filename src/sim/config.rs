//! Run timing and ambient conditions.

use serde::Deserialize;

use crate::constants::{SECONDS_PER_HOUR, c_to_k};
use crate::error::ConfigError;

/// Run timing, given in hours and converted once to seconds.
///
/// # Examples
///
/// ```
/// use energy_system_sim::sim::config::SimulationConfig;
///
/// let cfg = SimulationConfig::new(0.0, 24.0, 0.5);
/// assert_eq!(cfg.time_step_s(), 1800.0);
/// assert_eq!(cfg.total_ticks(), 48);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Simulation start (h).
    pub time_start_h: f64,
    /// Simulation end (h), exclusive.
    pub time_end_h: f64,
    /// Tick length (h).
    pub time_step_h: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_start_h: 0.0,
            time_end_h: 8760.0,
            time_step_h: 0.5,
        }
    }
}

impl SimulationConfig {
    pub fn new(time_start_h: f64, time_end_h: f64, time_step_h: f64) -> Self {
        Self {
            time_start_h,
            time_end_h,
            time_step_h,
        }
    }

    pub fn time_step_s(&self) -> f64 {
        self.time_step_h * SECONDS_PER_HOUR
    }

    pub fn time_start_s(&self) -> f64 {
        self.time_start_h * SECONDS_PER_HOUR
    }

    pub fn time_end_s(&self) -> f64 {
        self.time_end_h * SECONDS_PER_HOUR
    }

    /// Number of ticks between start and end.
    pub fn total_ticks(&self) -> usize {
        if self.time_step_h <= 0.0 || self.time_end_h <= self.time_start_h {
            return 0;
        }
        ((self.time_end_h - self.time_start_h) / self.time_step_h - 1e-9).ceil() as usize
    }

    /// Validates all fields and returns a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !(self.time_step_h > 0.0) {
            errors.push(ConfigError::new("simulation.time_step_h", "must be > 0"));
        }
        if self.time_start_h < 0.0 {
            errors.push(ConfigError::new("simulation.time_start_h", "must be >= 0"));
        }
        if self.time_end_h <= self.time_start_h {
            errors.push(ConfigError::new(
                "simulation.time_end_h",
                "must be > simulation.time_start_h",
            ));
        }
        errors
    }
}

/// Reference temperatures the environment provides to every component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Ambient air temperature (°C).
    pub ambient_temperature_c: f64,
    /// Cold water mains temperature (°C).
    pub cold_water_temperature_c: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            ambient_temperature_c: 20.0,
            cold_water_temperature_c: 15.0,
        }
    }
}

impl EnvironmentConfig {
    pub fn ambient_temperature_k(&self) -> f64 {
        c_to_k(self.ambient_temperature_c)
    }

    pub fn cold_water_temperature_k(&self) -> f64 {
        c_to_k(self.cold_water_temperature_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_is_one_year_of_half_hours() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.total_ticks(), 17520);
        assert_eq!(cfg.time_step_s(), 1800.0);
    }

    #[rstest]
    #[case(0.0, 1.0, 0.1, 10)]
    #[case(0.0, 24.0, 1.0, 24)]
    #[case(2.0, 3.0, 0.25, 4)]
    #[case(0.0, 1.0, 0.4, 3)]
    fn tick_count(#[case] start: f64, #[case] end: f64, #[case] step: f64, #[case] ticks: usize) {
        assert_eq!(SimulationConfig::new(start, end, step).total_ticks(), ticks);
    }

    #[test]
    fn validation_catches_bad_timing() {
        let errors = SimulationConfig::new(5.0, 1.0, 0.0).validate();
        assert!(errors.iter().any(|e| e.field == "simulation.time_step_h"));
        assert!(errors.iter().any(|e| e.field == "simulation.time_end_h"));
    }

    #[test]
    fn environment_defaults_in_kelvin() {
        let env = EnvironmentConfig::default();
        assert!((env.ambient_temperature_k() - 293.15).abs() < 1e-12);
        assert!((env.cold_water_temperature_k() - 288.15).abs() < 1e-12);
    }
}
