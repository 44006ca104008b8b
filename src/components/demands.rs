use crate::components::types::{Category, Component, StepContext};
use crate::constants::{SECONDS_PER_HOUR, WATER, c_to_k};
use crate::error::SimError;
use crate::ports::{Layer, PortKind, PortSpec};
use crate::timeseries::{Aggregation, TimeSeries};

/// Domestic hot water draw driven by an energy profile.
///
/// The profile gives the useful hot-water energy (kWh) needed per profile
/// interval, referred to water delivered at `reference_temperature` from the
/// cold-water mains. When the supplied water is hotter than the reference,
/// less mass is drawn so the delivered energy stays the same.
///
/// # Ports
/// - `{name}_fluid_port` (fluid): hot water entering the demand.
#[derive(Debug, Clone)]
pub struct HotWaterDemand {
    name: String,
    port_name: String,
    /// Delivery reference temperature (K).
    reference_temperature: f64,
    raw_profile: TimeSeries,
    profile: TimeSeries,
}

impl HotWaterDemand {
    /// # Arguments
    ///
    /// * `name` - Component name
    /// * `reference_temperature_c` - Delivery reference temperature (°C)
    /// * `profile_kwh` - Hot water energy per profile interval (kWh)
    pub fn new(name: &str, reference_temperature_c: f64, profile_kwh: TimeSeries) -> Self {
        Self {
            name: name.to_string(),
            port_name: format!("{name}_fluid_port"),
            reference_temperature: c_to_k(reference_temperature_c),
            profile: profile_kwh.clone(),
            raw_profile: profile_kwh,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Hot water mass flow (kg/s) needed for `power_kw` at supply temperature
    /// `t_hot` given mains temperature `t_cold`.
    fn mass_flow(&self, power_kw: f64, t_hot: f64, t_cold: f64) -> Result<f64, SimError> {
        let design_lift = self.reference_temperature - t_cold;
        if design_lift <= 0.0 {
            return Err(SimError::invalid_parameter(
                &self.name,
                "reference temperature must exceed the cold water temperature",
            ));
        }
        let theoretical = power_kw / WATER.cp / design_lift;
        if t_hot > self.reference_temperature {
            Ok(theoretical * design_lift / (t_hot - t_cold))
        } else {
            Ok(theoretical)
        }
    }
}

impl Component for HotWaterDemand {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Demand
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, PortKind::Fluid)]
    }

    fn resample_data(&mut self, time_step: f64, sim_end: f64) -> Result<(), SimError> {
        self.profile = self
            .raw_profile
            .resample(time_step, sim_end, Aggregation::Extensive)
            .ok_or_else(|| {
                SimError::invalid_parameter(&self.name, "hot water profile does not cover the run")
            })?;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let dt = ctx.time_step();
        let energy_kwh = self
            .profile
            .at_time(ctx.state.time)
            .ok_or_else(|| SimError::ProfileTooShort {
                component: self.name.clone(),
                tick: ctx.state.time_id,
            })?;
        let power_kw = energy_kwh * SECONDS_PER_HOUR / dt;
        let t_cold = ctx.environmental_data().cold_water_temperature;
        let t_hot = ctx
            .temperature(&self.port_name)?
            .unwrap_or(self.reference_temperature);

        let mdot = self.mass_flow(power_kw, t_hot, t_cold)?;
        ctx.set_flow(&self.port_name, Layer::Mass, mdot * dt)?;
        ctx.set_flow(&self.port_name, Layer::Heat, mdot * WATER.cp * t_hot * dt)?;
        Ok(())
    }
}

/// Electricity consumption following a power profile (kW).
///
/// # Ports
/// - `{name}_electricity_port` (electricity): power entering the demand.
#[derive(Debug, Clone)]
pub struct ElectricityDemand {
    name: String,
    port_name: String,
    raw_profile: TimeSeries,
    profile: TimeSeries,
}

impl ElectricityDemand {
    pub fn new(name: &str, profile_kw: TimeSeries) -> Self {
        Self {
            name: name.to_string(),
            port_name: format!("{name}_electricity_port"),
            profile: profile_kw.clone(),
            raw_profile: profile_kw,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Component for ElectricityDemand {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Demand
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, PortKind::Electricity)]
    }

    fn resample_data(&mut self, time_step: f64, sim_end: f64) -> Result<(), SimError> {
        self.profile = self
            .raw_profile
            .resample(time_step, sim_end, Aggregation::Intensive)
            .ok_or_else(|| {
                SimError::invalid_parameter(&self.name, "power profile does not cover the run")
            })?;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let power_kw = self
            .profile
            .at_time(ctx.state.time)
            .ok_or_else(|| SimError::ProfileTooShort {
                component: self.name.clone(),
                tick: ctx.state.time_id,
            })?;
        let dt = ctx.time_step();
        ctx.set_flow(&self.port_name, Layer::Electricity, power_kw * dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::types::testing::Harness;
    use approx::assert_relative_eq;

    #[test]
    fn draw_at_reference_temperature_matches_energy() {
        // 1 kWh over one hour at exactly 40 °C supply
        let mut demand = HotWaterDemand::new("dhw", 40.0, TimeSeries::new(1.0, vec![1.0]).unwrap());
        let mut h = Harness::new(&demand, 1.0);
        h.set_temperature("dhw_fluid_port", c_to_k(40.0));
        h.step(&mut demand, None).unwrap();

        let mass = h.flow("dhw_fluid_port", Layer::Mass);
        // 3600 kJ / (4.187 kJ/kgK * 25 K)
        assert_relative_eq!(mass, 3600.0 / (4.187 * 25.0), epsilon = 1e-9);
        assert!(h.flow("dhw_fluid_port", Layer::Heat) > 0.0);
    }

    #[test]
    fn hotter_supply_draws_less_mass() {
        let mut demand = HotWaterDemand::new("dhw", 40.0, TimeSeries::new(1.0, vec![1.0]).unwrap());
        let mut h = Harness::new(&demand, 1.0);
        h.set_temperature("dhw_fluid_port", c_to_k(65.0));
        h.step(&mut demand, None).unwrap();

        let mass = h.flow("dhw_fluid_port", Layer::Mass);
        let delivered_kj = mass * WATER.cp * (65.0 - 15.0);
        assert_relative_eq!(delivered_kj, 3600.0, epsilon = 1e-9);
    }

    #[test]
    fn resampled_profile_spreads_energy_over_ticks() {
        let mut demand = HotWaterDemand::new("dhw", 40.0, TimeSeries::new(1.0, vec![2.0]).unwrap());
        demand.resample_data(900.0, 3600.0).unwrap();
        let mut h = Harness::new(&demand, 0.25);
        h.set_temperature("dhw_fluid_port", c_to_k(40.0));
        h.step(&mut demand, None).unwrap();
        let mass = h.flow("dhw_fluid_port", Layer::Mass);
        assert_relative_eq!(mass, 0.5 * 3600.0 / (4.187 * 25.0), epsilon = 1e-9);
    }

    #[test]
    fn exhausted_profile_is_an_error() {
        let mut demand = ElectricityDemand::new("load", TimeSeries::new(1.0, vec![1.0]).unwrap());
        let mut h = Harness::new(&demand, 1.0);
        h.step(&mut demand, None).unwrap();
        h.advance();
        let err = h.step(&mut demand, None).unwrap_err();
        assert!(matches!(err, SimError::ProfileTooShort { tick: 1, .. }));
    }

    #[test]
    fn electricity_demand_enters_port() {
        let mut demand = ElectricityDemand::new("load", TimeSeries::new(1.0, vec![0.5]).unwrap());
        let mut h = Harness::new(&demand, 0.5);
        h.step(&mut demand, None).unwrap();
        assert_relative_eq!(h.flow("load_electricity_port", Layer::Electricity), 900.0);
    }
}
