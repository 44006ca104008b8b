use crate::components::types::{Category, Component, StepContext};
use crate::error::SimError;
use crate::ports::{Layer, PortKind, PortSpec};
use crate::timeseries::{Aggregation, TimeSeries};

/// Photovoltaic array driven by a capacity-factor profile.
///
/// The profile is dimensionless (generated power over installed power) and
/// must lie in `[0, 1]`.
///
/// # Ports
/// - `{name}_electricity_port` (electricity): generated power leaving the panel.
#[derive(Debug, Clone)]
pub struct PvPanel {
    name: String,
    port_name: String,
    /// Installed peak power (kW).
    installed_power: f64,
    raw_profile: TimeSeries,
    profile: TimeSeries,
}

impl PvPanel {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] if any capacity factor is
    /// outside `[0, 1]` or the installed power is negative.
    pub fn new(
        name: &str,
        installed_power: f64,
        capacity_factor: TimeSeries,
    ) -> Result<Self, SimError> {
        if installed_power < 0.0 {
            return Err(SimError::invalid_parameter(
                name,
                "installed power must be >= 0",
            ));
        }
        if let Some(bad) = capacity_factor
            .values()
            .iter()
            .find(|cf| !(0.0..=1.0).contains(*cf))
        {
            return Err(SimError::invalid_parameter(
                name,
                format!("capacity factor must be within [0, 1], found {bad}"),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            port_name: format!("{name}_electricity_port"),
            installed_power,
            profile: capacity_factor.clone(),
            raw_profile: capacity_factor,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Component for PvPanel {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Producer
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, PortKind::Electricity)]
    }

    fn resample_data(&mut self, time_step: f64, sim_end: f64) -> Result<(), SimError> {
        self.profile = self
            .raw_profile
            .resample(time_step, sim_end, Aggregation::Intensive)
            .ok_or_else(|| {
                SimError::invalid_parameter(&self.name, "capacity factor does not cover the run")
            })?;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let cf = self
            .profile
            .at_time(ctx.state.time)
            .ok_or_else(|| SimError::ProfileTooShort {
                component: self.name.clone(),
                tick: ctx.state.time_id,
            })?;
        let dt = ctx.time_step();
        ctx.set_flow(
            &self.port_name,
            Layer::Electricity,
            -cf * self.installed_power * dt,
        )
    }
}

/// Producer delivering a fixed power on a heat or electricity port.
#[derive(Debug, Clone)]
pub struct ConstantPowerProducer {
    name: String,
    port_name: String,
    kind: PortKind,
    /// Delivered power (kW).
    power: f64,
}

impl ConstantPowerProducer {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for a fluid port kind, which
    /// has no single energy layer to deliver on.
    pub fn new(name: &str, kind: PortKind, power: f64) -> Result<Self, SimError> {
        let suffix = match kind {
            PortKind::Heat => "heat",
            PortKind::Electricity => "electricity",
            PortKind::Fluid => {
                return Err(SimError::invalid_parameter(
                    name,
                    "constant producers deliver heat or electricity only",
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            port_name: format!("{name}_{suffix}_port"),
            kind,
            power,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Component for ConstantPowerProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Producer
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, self.kind)]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let dt = ctx.time_step();
        let layer = self.kind.layers()[0];
        ctx.set_flow(&self.port_name, layer, -self.power * dt)
    }
}
