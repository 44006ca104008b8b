//! Conversion units and balancing connections.

use serde::Deserialize;

use crate::components::types::{Category, Component, InheritedValue, Quantity, StepContext};
use crate::error::SimError;
use crate::ports::{Layer, PortKind, PortSpec};
use crate::sim::state::SimulationState;

fn port_suffix(kind: PortKind) -> &'static str {
    match kind {
        PortKind::Heat => "heat",
        PortKind::Fluid => "fluid",
        PortKind::Electricity => "electricity",
    }
}

/// Direction(s) in which a [`GenericUtility`] may deliver power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityDirection {
    /// Delivers power only.
    Source,
    /// Absorbs power only.
    Sink,
    Bidirectional,
}

/// Dispatchable supply or sink of heat or electricity.
///
/// The action is the energy (kJ) the utility should deliver this tick;
/// negative values absorb energy. The delivered power is clamped to the
/// range allowed by the direction and `max_power`.
#[derive(Debug, Clone)]
pub struct GenericUtility {
    name: String,
    port_name: String,
    kind: PortKind,
    /// Lower power bound (kW), `<= 0`.
    power_min: f64,
    /// Upper power bound (kW), `>= 0`.
    power_max: f64,
}

impl GenericUtility {
    pub fn new(
        name: &str,
        kind: PortKind,
        max_power: f64,
        direction: UtilityDirection,
    ) -> Result<Self, SimError> {
        if kind == PortKind::Fluid {
            return Err(SimError::invalid_parameter(
                name,
                "generic utilities exchange heat or electricity only",
            ));
        }
        if max_power < 0.0 {
            return Err(SimError::invalid_parameter(name, "max power must be >= 0"));
        }
        let (power_min, power_max) = match direction {
            UtilityDirection::Source => (0.0, max_power),
            UtilityDirection::Sink => (-max_power, 0.0),
            UtilityDirection::Bidirectional => (-max_power, max_power),
        };
        Ok(Self {
            name: name.to_string(),
            port_name: format!("{name}_{}_port", port_suffix(kind)),
            kind,
            power_min,
            power_max,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Component for GenericUtility {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Utility
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, self.kind)]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, action: Option<f64>) -> Result<(), SimError> {
        let requested = action.unwrap_or(0.0);
        if !requested.is_finite() {
            return Err(SimError::InvalidAction {
                component: self.name.clone(),
                action,
                reason: "energy request must be finite".to_string(),
            });
        }
        let dt = ctx.time_step();
        let power = (requested / dt).clamp(self.power_min, self.power_max);
        // delivered energy leaves the utility
        ctx.set_flow(&self.port_name, self.kind.layers()[0], -power * dt)
    }
}

/// Interprets an on/off action; a missing action means off.
pub(crate) fn on_off_action(component: &str, action: Option<f64>) -> Result<f64, SimError> {
    match action {
        None => Ok(0.0),
        Some(a) if a == 0.0 || a == 1.0 => Ok(a),
        Some(_) => Err(SimError::InvalidAction {
            component: component.to_string(),
            action,
            reason: "on/off units accept 0 or 1 only".to_string(),
        }),
    }
}

/// Heat output and electricity input ports of an on/off heat generator.
#[derive(Debug, Clone)]
pub(crate) struct HeatSourcePorts {
    pub heat_output: String,
    pub power_input: String,
}

impl HeatSourcePorts {
    pub fn new(name: &str) -> Self {
        Self {
            heat_output: format!("{name}_heat_output_port"),
            power_input: format!("{name}_electricity_input_port"),
        }
    }

    pub fn specs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new(&self.heat_output, PortKind::Heat),
            PortSpec::new(&self.power_input, PortKind::Electricity),
        ]
    }

    /// Writes heat leaving and electricity entering for a unit running at
    /// `heat_output` kW with `efficiency`, scaled by the on/off `action`.
    pub fn write(
        &self,
        ctx: &mut StepContext<'_>,
        heat_output: f64,
        efficiency: f64,
        action: f64,
    ) -> Result<(), SimError> {
        let dt = ctx.time_step();
        ctx.set_flow(&self.heat_output, Layer::Heat, -heat_output * action * dt)?;
        ctx.set_flow(
            &self.power_input,
            Layer::Electricity,
            heat_output / efficiency * action * dt,
        )
    }
}

/// Electric heat generator with fixed heat output and fixed efficiency,
/// switched on or off by its action.
#[derive(Debug, Clone)]
pub struct SimplifiedHeatSource {
    name: String,
    ports: HeatSourcePorts,
    /// Heat output when on (kW).
    heat_output: f64,
    efficiency: f64,
}

impl SimplifiedHeatSource {
    pub fn new(name: &str, heat_output: f64, efficiency: f64) -> Result<Self, SimError> {
        if !(efficiency > 0.0) {
            return Err(SimError::invalid_parameter(name, "efficiency must be > 0"));
        }
        Ok(Self {
            name: name.to_string(),
            ports: HeatSourcePorts::new(name),
            heat_output,
            efficiency,
        })
    }

    pub fn heat_port_name(&self) -> &str {
        &self.ports.heat_output
    }

    pub fn power_port_name(&self) -> &str {
        &self.ports.power_input
    }
}

impl Component for SimplifiedHeatSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Utility
    }

    fn ports(&self) -> Vec<PortSpec> {
        self.ports.specs()
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, action: Option<f64>) -> Result<(), SimError> {
        let action = on_off_action(&self.name, action)?;
        self.ports
            .write(ctx, self.heat_output, self.efficiency, action)
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Efficiency => Some(self.efficiency),
            _ => None,
        }
    }
}

/// Hybrid inverter linking PV, an AC load, a storage unit and the grid.
///
/// The action is the energy (kJ) entering the inverter from storage this
/// tick (negative to charge it). The grid port closes the balance
/// `(pv + storage) · efficiency + grid + ac_output = 0`.
///
/// # Ports
/// - `{name}_pv_input_port`
/// - `{name}_output_port` (AC load)
/// - `{name}_ess_port` (storage)
/// - `{name}_grid_input_port`
#[derive(Debug, Clone)]
pub struct Inverter {
    name: String,
    efficiency: f64,
}

impl Inverter {
    pub fn new(name: &str, efficiency: f64) -> Result<Self, SimError> {
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(SimError::invalid_parameter(
                name,
                "efficiency must be within (0, 1]",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            efficiency,
        })
    }

    pub fn pv_port_name(name: &str) -> String {
        format!("{name}_pv_input_port")
    }

    pub fn ac_output_port_name(name: &str) -> String {
        format!("{name}_output_port")
    }

    pub fn storage_port_name(name: &str) -> String {
        format!("{name}_ess_port")
    }

    pub fn grid_port_name(name: &str) -> String {
        format!("{name}_grid_input_port")
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

impl Component for Inverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::Utility
    }

    fn ports(&self) -> Vec<PortSpec> {
        [
            Self::pv_port_name(&self.name),
            Self::ac_output_port_name(&self.name),
            Self::storage_port_name(&self.name),
            Self::grid_port_name(&self.name),
        ]
        .into_iter()
        .map(|name| PortSpec::new(name, PortKind::Electricity))
        .collect()
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, action: Option<f64>) -> Result<(), SimError> {
        let storage = action.unwrap_or(0.0);
        if !storage.is_finite() {
            return Err(SimError::InvalidAction {
                component: self.name.clone(),
                action,
                reason: "storage exchange must be finite".to_string(),
            });
        }
        let pv = ctx.flow(&Self::pv_port_name(&self.name), Layer::Electricity)?;
        let ac_output = ctx.flow(&Self::ac_output_port_name(&self.name), Layer::Electricity)?;
        let ac_input = (pv + storage) * self.efficiency + ac_output;
        ctx.set_flow(
            &Self::grid_port_name(&self.name),
            Layer::Electricity,
            -ac_input,
        )?;
        ctx.set_flow(
            &Self::storage_port_name(&self.name),
            Layer::Electricity,
            storage,
        )
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Efficiency => Some(self.efficiency),
            _ => None,
        }
    }
}

/// Connection that absorbs whatever its partner leaves unbalanced, such as
/// an electricity grid.
///
/// Its port flow is fully determined by propagation from the connected
/// component, so stepping it writes nothing.
#[derive(Debug, Clone)]
pub struct BalancingUtility {
    name: String,
    port_name: String,
    kind: PortKind,
}

impl BalancingUtility {
    pub fn new(name: &str, kind: PortKind) -> Self {
        Self {
            name: name.to_string(),
            port_name: format!("{name}_{}_port", port_suffix(kind)),
            kind,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Component for BalancingUtility {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::BalancingUtility
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, self.kind)]
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        Ok(())
    }
}

/// Water mains: a balancing fluid connection supplying water at the
/// cold-water temperature of the environment.
#[derive(Debug, Clone)]
pub struct ColdWaterGrid {
    inner: BalancingUtility,
}

impl ColdWaterGrid {
    pub fn new(name: &str) -> Self {
        Self {
            inner: BalancingUtility::new(name, PortKind::Fluid),
        }
    }

    pub fn port_name(&self) -> &str {
        self.inner.port_name()
    }
}

impl Component for ColdWaterGrid {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn category(&self) -> Category {
        Category::BalancingUtility
    }

    fn ports(&self) -> Vec<PortSpec> {
        self.inner.ports()
    }

    fn inherited_port_values(&self, state: &SimulationState) -> Vec<InheritedValue> {
        vec![InheritedValue {
            port: self.inner.port_name.clone(),
            temperature: state.environmental_data.cold_water_temperature,
        }]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, action: Option<f64>) -> Result<(), SimError> {
        self.inner.step(ctx, action)
    }
}
