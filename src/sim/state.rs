//! Per-tick simulation state and the environmental data feeding it.

use std::fmt;

use indexmap::IndexMap;

use super::config::{EnvironmentConfig, SimulationConfig};
use crate::constants::c_to_k;
use crate::error::SimError;
use crate::timeseries::TimeSeries;

/// Reference temperatures for the current tick (K).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalData {
    pub ambient_temperature: f64,
    pub cold_water_temperature: f64,
}

/// Source of environmental data, refreshed once per tick.
pub trait EnvironmentalDataSource {
    fn at(&self, time_s: f64) -> EnvironmentalData;
}

/// Time-invariant conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantConditions(pub EnvironmentalData);

impl From<&EnvironmentConfig> for ConstantConditions {
    fn from(cfg: &EnvironmentConfig) -> Self {
        Self(EnvironmentalData {
            ambient_temperature: cfg.ambient_temperature_k(),
            cold_water_temperature: cfg.cold_water_temperature_k(),
        })
    }
}

impl EnvironmentalDataSource for ConstantConditions {
    fn at(&self, _time_s: f64) -> EnvironmentalData {
        self.0
    }
}

/// Conditions from pre-parsed Celsius profiles; the last sample is held
/// beyond the end of a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileConditions {
    ambient_c: TimeSeries,
    cold_water_c: TimeSeries,
    /// Last samples (°C), held past the end of each profile.
    held: (f64, f64),
}

impl ProfileConditions {
    /// # Errors
    ///
    /// [`SimError::InvalidTimeSeries`] if either profile is empty.
    pub fn new(ambient_c: TimeSeries, cold_water_c: TimeSeries) -> Result<Self, SimError> {
        let last = |ts: &TimeSeries, what: &str| {
            ts.values().last().copied().ok_or_else(|| {
                SimError::InvalidTimeSeries(format!("{what} temperature profile is empty"))
            })
        };
        let held = (last(&ambient_c, "ambient")?, last(&cold_water_c, "cold water")?);
        Ok(Self {
            ambient_c,
            cold_water_c,
            held,
        })
    }
}

impl EnvironmentalDataSource for ProfileConditions {
    fn at(&self, time_s: f64) -> EnvironmentalData {
        let ambient = self.ambient_c.at_time(time_s).unwrap_or(self.held.0);
        let cold_water = self.cold_water_c.at_time(time_s).unwrap_or(self.held.1);
        EnvironmentalData {
            ambient_temperature: c_to_k(ambient),
            cold_water_temperature: c_to_k(cold_water),
        }
    }
}

/// Everything the step engine knows about the current tick.
///
/// Mutated only by the engine; components receive it read-only.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Simulated time at the start of the tick (s).
    pub time: f64,
    /// Tick index.
    pub time_id: usize,
    /// Tick length (s).
    pub time_step: f64,
    /// End of the run (s).
    pub time_end: f64,
    pub environmental_data: EnvironmentalData,
    /// Actions issued by controllers during this tick, by component name.
    pub control_actions: IndexMap<String, Option<f64>>,
}

impl SimulationState {
    pub fn new(config: &SimulationConfig, environmental_data: EnvironmentalData) -> Self {
        Self {
            time: config.time_start_s(),
            time_id: 0,
            time_step: config.time_step_s(),
            time_end: config.time_end_s(),
            environmental_data,
            control_actions: IndexMap::new(),
        }
    }

    /// Simulated time in hours.
    pub fn time_h(&self) -> f64 {
        self.time / 3600.0
    }
}

/// A recoverable condition observed during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub tick: usize,
    /// Simulated time (h).
    pub time_h: f64,
    /// Component, port or controller that raised it.
    pub source: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>5} ({:>8.2}h) [{}] {}",
            self.tick, self.time_h, self.source, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_conditions_ignore_time() {
        let src = ConstantConditions::from(&EnvironmentConfig::default());
        assert_eq!(src.at(0.0), src.at(1e6));
    }

    #[test]
    fn profile_conditions_hold_last_value() {
        let src = ProfileConditions::new(
            TimeSeries::new(1.0, vec![10.0, 12.0]).unwrap(),
            TimeSeries::new(24.0, vec![8.0]).unwrap(),
        )
        .unwrap();
        let early = src.at(0.0);
        let late = src.at(10.0 * 3600.0);
        assert!((early.ambient_temperature - c_to_k(10.0)).abs() < 1e-12);
        assert!((late.ambient_temperature - c_to_k(12.0)).abs() < 1e-12);
        assert!((late.cold_water_temperature - c_to_k(8.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_profile_is_rejected() {
        let result = ProfileConditions::new(
            TimeSeries::new(1.0, vec![10.0]).unwrap(),
            TimeSeries::new(1.0, vec![]).unwrap(),
        );
        assert!(matches!(result, Err(SimError::InvalidTimeSeries(_))));
    }

    #[test]
    fn state_starts_at_configured_time() {
        let cfg = SimulationConfig::new(2.0, 4.0, 0.5);
        let state = SimulationState::new(
            &cfg,
            ConstantConditions::from(&EnvironmentConfig::default()).0,
        );
        assert_eq!(state.time, 7200.0);
        assert_eq!(state.time_step, 1800.0);
        assert_eq!(state.time_h(), 2.0);
    }

    #[test]
    fn diagnostic_display_does_not_panic() {
        let d = Diagnostic {
            tick: 3,
            time_h: 1.5,
            source: "battery".into(),
            message: "SOC 1.02 above 1.0".into(),
        };
        assert!(format!("{d}").contains("battery"));
    }
}
