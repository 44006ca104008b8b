//! The component contract shared by every demand, producer, utility and
//! storage unit.

use std::fmt;

use crate::error::SimError;
use crate::ports::{Layer, Port, PortGraph, PortSpec};
use crate::sim::state::{Diagnostic, EnvironmentalData, SimulationState};

/// Simulation category deciding when in a tick a component is stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Consumes regardless of control decisions; stepped first.
    Demand,
    /// Produces regardless of control decisions; stepped after demands.
    Producer,
    /// Conversion unit, usually controller-driven.
    Utility,
    /// Stateful storage, stepped once everything feeding it is known.
    StorageUnit,
    /// Absorbs the residual imbalance on its ports; stepped last.
    BalancingUtility,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Demand => "Demand",
            Category::Producer => "Producer",
            Category::Utility => "Utility",
            Category::StorageUnit => "StorageUnit",
            Category::BalancingUtility => "BalancingUtility",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar state a component may expose to sensors and controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Representative temperature (K).
    Temperature,
    /// State of charge (-).
    StateOfCharge,
    /// Storage capacity (kJ).
    Capacity,
    /// Maximum charge power at the current state (kW).
    MaxChargePower,
    /// Maximum discharge power at the current state (kW).
    MaxDischargePower,
    /// Conversion efficiency at the current state (-).
    Efficiency,
}

/// Temperature a component asserts on one of its ports before anything
/// consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedValue {
    pub port: String,
    /// Temperature (K).
    pub temperature: f64,
}

/// Trait implemented by everything the step engine executes.
///
/// Components read inbound state from their own ports and write outbound
/// flow (and, for fluid ports, temperature) back to them. Flows follow the
/// port sign convention: positive when entering the component.
pub trait Component {
    fn name(&self) -> &str;

    /// Category fixing the component's slot in the tick order.
    fn category(&self) -> Category;

    /// Ports to create for this component at assembly time.
    fn ports(&self) -> Vec<PortSpec>;

    /// One-time setup with the first simulation state.
    fn initialize(&mut self, _state: &SimulationState) -> Result<(), SimError> {
        Ok(())
    }

    /// Re-samples internally held series to the tick length.
    ///
    /// # Arguments
    ///
    /// * `time_step` - Tick length (s)
    /// * `sim_end` - End of the run (s)
    fn resample_data(&mut self, _time_step: f64, _sim_end: f64) -> Result<(), SimError> {
        Ok(())
    }

    /// Temperatures this component asserts on its ports at tick start.
    fn inherited_port_values(&self, _state: &SimulationState) -> Vec<InheritedValue> {
        Vec::new()
    }

    /// Executes one tick; `action` is `None` for non-controlled components.
    fn step(&mut self, ctx: &mut StepContext<'_>, action: Option<f64>) -> Result<(), SimError>;

    /// Exposes internal state to sensors and controllers.
    fn quantity(&self, _quantity: Quantity) -> Option<f64> {
        None
    }
}

/// Restricted view handed to [`Component::step`].
///
/// Only ports owned by the stepping component are reachable.
pub struct StepContext<'a> {
    component: &'a str,
    ports: &'a mut PortGraph,
    pub state: &'a SimulationState,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        component: &'a str,
        ports: &'a mut PortGraph,
        state: &'a SimulationState,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            component,
            ports,
            state,
            diagnostics,
        }
    }

    fn check_owner(&self, port: &Port) -> Result<(), SimError> {
        if port.owner() == self.component {
            Ok(())
        } else {
            Err(SimError::ForeignPort {
                component: self.component.to_string(),
                port: port.name().to_string(),
                owner: port.owner().to_string(),
            })
        }
    }

    pub fn port(&self, name: &str) -> Result<&Port, SimError> {
        let port = self.ports.port(name)?;
        self.check_owner(port)?;
        Ok(port)
    }

    pub fn port_mut(&mut self, name: &str) -> Result<&mut Port, SimError> {
        self.check_owner(self.ports.port(name)?)?;
        self.ports.port_mut(name)
    }

    pub fn flow(&self, port: &str, layer: Layer) -> Result<f64, SimError> {
        Ok(self.port(port)?.flow(layer))
    }

    pub fn set_flow(&mut self, port: &str, layer: Layer, value: f64) -> Result<(), SimError> {
        self.port_mut(port)?.set_flow(layer, value)
    }

    pub fn temperature(&self, port: &str) -> Result<Option<f64>, SimError> {
        Ok(self.port(port)?.temperature())
    }

    /// Tick length (s).
    pub fn time_step(&self) -> f64 {
        self.state.time_step
    }

    pub fn environmental_data(&self) -> &EnvironmentalData {
        &self.state.environmental_data
    }

    /// Records a recoverable condition for this tick and logs it.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            component = self.component,
            tick = self.state.time_id,
            "{message}"
        );
        self.diagnostics.push(Diagnostic {
            tick: self.state.time_id,
            time_h: self.state.time_h(),
            source: self.component.to_string(),
            message,
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for stepping a single component without an environment.

    use super::*;
    use crate::sim::config::{EnvironmentConfig, SimulationConfig};
    use crate::sim::state::ConstantConditions;

    /// Owns a component's ports and a state so it can be stepped alone.
    pub struct Harness {
        pub ports: PortGraph,
        pub state: SimulationState,
        pub diagnostics: Vec<Diagnostic>,
    }

    impl Harness {
        pub fn new(component: &dyn Component, time_step_h: f64) -> Self {
            let mut ports = PortGraph::new();
            for spec in component.ports() {
                ports.add(spec, component.name()).unwrap();
            }
            let cfg = SimulationConfig::new(0.0, 8760.0, time_step_h);
            let data = ConstantConditions::from(&EnvironmentConfig::default()).0;
            Self {
                ports,
                state: SimulationState::new(&cfg, data),
                diagnostics: Vec::new(),
            }
        }

        pub fn set_flow(&mut self, port: &str, layer: Layer, value: f64) {
            self.ports.port_mut(port).unwrap().set_flow(layer, value).unwrap();
        }

        pub fn set_temperature(&mut self, port: &str, temperature: f64) {
            self.ports
                .port_mut(port)
                .unwrap()
                .set_temperature(Some(temperature));
        }

        pub fn flow(&self, port: &str, layer: Layer) -> f64 {
            self.ports.port(port).unwrap().flow(layer)
        }

        pub fn step(
            &mut self,
            component: &mut dyn Component,
            action: Option<f64>,
        ) -> Result<(), SimError> {
            let name = component.name().to_string();
            let mut ctx = StepContext::new(
                &name,
                &mut self.ports,
                &self.state,
                &mut self.diagnostics,
            );
            component.step(&mut ctx, action)
        }

        /// Clears flows and advances the state by one tick.
        pub fn advance(&mut self) {
            self.ports.reset();
            self.state.time += self.state.time_step;
            self.state.time_id += 1;
        }
    }
}
