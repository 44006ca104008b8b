//! The graph container owning components, ports, sensors and controllers.

use indexmap::IndexMap;

use crate::components::types::{Category, Component, Quantity, StepContext};
use crate::controllers::{Actions, Controller};
use crate::error::SimError;
use crate::ports::{Port, PortGraph, PortId};
use crate::sensors::{CachedSensor, Sensor, SensorTarget};
use crate::sim::state::{Diagnostic, SimulationState};

/// Components grouped by category in registration order.
///
/// Built once at assembly and never changed afterwards.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    by_category: IndexMap<Category, Vec<usize>>,
}

impl Classification {
    fn new(components: &IndexMap<String, Box<dyn Component>>) -> Self {
        let mut by_category: IndexMap<Category, Vec<usize>> = IndexMap::new();
        for (idx, component) in components.values().enumerate() {
            by_category
                .entry(component.category())
                .or_default()
                .push(idx);
        }
        Self { by_category }
    }

    /// Indices of the components in `category`.
    pub fn indices(&self, category: Category) -> &[usize] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Read-only view handed to sensors and controllers while observing.
pub struct EnvironmentView<'a> {
    components: &'a IndexMap<String, Box<dyn Component>>,
    ports: &'a PortGraph,
    sensors: &'a IndexMap<String, CachedSensor>,
    state: &'a SimulationState,
}

impl<'a> EnvironmentView<'a> {
    pub fn port(&self, name: &str) -> Result<&'a Port, SimError> {
        self.ports.port(name)
    }

    /// A component's exposed quantity, `None` if it does not expose it.
    pub fn quantity(&self, component: &str, quantity: Quantity) -> Result<Option<f64>, SimError> {
        self.components
            .get(component)
            .map(|c| c.quantity(quantity))
            .ok_or_else(|| SimError::UnknownComponent(component.to_string()))
    }

    /// The cached reading of a sensor.
    pub fn sensor(&self, name: &str) -> Result<Option<f64>, SimError> {
        self.sensors
            .get(name)
            .ok_or_else(|| SimError::UnknownSensor(name.to_string()))?
            .get_measurement(self)
    }

    pub fn state(&self) -> &'a SimulationState {
        self.state
    }
}

/// Owns everything taking part in a simulation.
///
/// Assembly creates every component's ports, wires the declared
/// connections, checks that controllers and sensors only reference
/// registered names, and classifies components by category.
pub struct Environment {
    components: IndexMap<String, Box<dyn Component>>,
    ports: PortGraph,
    /// Ports of each component, indexed like `components`.
    component_ports: Vec<Vec<PortId>>,
    classification: Classification,
    controllers: Vec<Box<dyn Controller>>,
    sensors: IndexMap<String, CachedSensor>,
}

impl Environment {
    /// Assembles an environment.
    ///
    /// # Errors
    ///
    /// - [`SimError::DuplicateName`] for a repeated component, port,
    ///   controller or sensor name.
    /// - [`SimError::UnknownPort`], [`SimError::ConnectionConflict`] or
    ///   [`SimError::PortKindMismatch`] for a bad connection.
    /// - [`SimError::UnknownComponent`], [`SimError::UnknownPort`] or
    ///   [`SimError::UnknownSensor`] for a dangling reference.
    pub fn new(
        components: Vec<Box<dyn Component>>,
        controllers: Vec<Box<dyn Controller>>,
        sensors: Vec<Box<dyn Sensor>>,
        connections: &[(String, String)],
    ) -> Result<Self, SimError> {
        let mut registry: IndexMap<String, Box<dyn Component>> = IndexMap::new();
        let mut ports = PortGraph::new();
        let mut component_ports = Vec::with_capacity(components.len());
        for component in components {
            let name = component.name().to_string();
            if registry.contains_key(&name) {
                return Err(SimError::DuplicateName(name));
            }
            let ids = component
                .ports()
                .into_iter()
                .map(|spec| ports.add(spec, &name))
                .collect::<Result<Vec<_>, _>>()?;
            component_ports.push(ids);
            registry.insert(name, component);
        }

        for (a, b) in connections {
            ports.connect(a, b)?;
        }

        let mut sensor_map = IndexMap::new();
        for sensor in sensors {
            match sensor.target() {
                SensorTarget::Port(port) => {
                    ports.id(port)?;
                }
                SensorTarget::Component(component) => {
                    if !registry.contains_key(component) {
                        return Err(SimError::UnknownComponent(component.to_string()));
                    }
                }
            }
            let name = sensor.name().to_string();
            if sensor_map.contains_key(&name) {
                return Err(SimError::DuplicateName(name));
            }
            sensor_map.insert(name, CachedSensor::new(sensor));
        }

        let mut controller_names = Vec::with_capacity(controllers.len());
        for controller in &controllers {
            if controller_names.contains(&controller.name()) {
                return Err(SimError::DuplicateName(controller.name().to_string()));
            }
            controller_names.push(controller.name());
            for component in controller.controlled_components() {
                if !registry.contains_key(component) {
                    return Err(SimError::UnknownComponent(component.clone()));
                }
            }
            for sensor in controller.sensors() {
                if !sensor_map.contains_key(sensor) {
                    return Err(SimError::UnknownSensor(sensor.to_string()));
                }
            }
        }

        let classification = Classification::new(&registry);
        Ok(Self {
            components: registry,
            ports,
            component_ports,
            classification,
            controllers,
            sensors: sensor_map,
        })
    }

    pub fn ports(&self) -> &PortGraph {
        &self.ports
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn component(&self, name: &str) -> Result<&dyn Component, SimError> {
        self.components
            .get(name)
            .map(Box::as_ref)
            .ok_or_else(|| SimError::UnknownComponent(name.to_string()))
    }

    /// Component names in registration order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn component_name(&self, idx: usize) -> &str {
        self.components
            .get_index(idx)
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    pub(crate) fn component_index(&self, name: &str) -> Option<usize> {
        self.components.get_index_of(name)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &dyn Controller> {
        self.controllers.iter().map(Box::as_ref)
    }

    pub fn sensor_names(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    pub fn view<'a>(&'a self, state: &'a SimulationState) -> EnvironmentView<'a> {
        EnvironmentView {
            components: &self.components,
            ports: &self.ports,
            sensors: &self.sensors,
            state,
        }
    }

    /// Re-samples component series and runs one-time setup.
    pub(crate) fn initialize(
        &mut self,
        state: &SimulationState,
        sim_end: f64,
    ) -> Result<(), SimError> {
        for component in self.components.values_mut() {
            component.resample_data(state.time_step, sim_end)?;
            component.initialize(state)?;
        }
        for controller in &mut self.controllers {
            controller.initialize();
        }
        Ok(())
    }

    /// Clears port flows, temperatures and sensor readings.
    pub(crate) fn reset_tick(&mut self) {
        self.ports.reset();
        self.clear_sensor_cache();
    }

    pub(crate) fn clear_sensor_cache(&mut self) {
        for sensor in self.sensors.values_mut() {
            sensor.clear();
        }
    }

    /// Applies the temperatures components assert on their own ports, and
    /// hands them to the connected ports.
    pub(crate) fn apply_inherited_values(&mut self, state: &SimulationState) -> Result<(), SimError> {
        for component in self.components.values() {
            for value in component.inherited_port_values(state) {
                let id = self.ports.id(&value.port)?;
                self.ports
                    .get_mut(id)
                    .set_temperature(Some(value.temperature));
                if let Some(partner) = self.ports.partner(id) {
                    self.ports
                        .get_mut(partner)
                        .set_temperature(Some(value.temperature));
                }
            }
        }
        Ok(())
    }

    /// Steps one component and mirrors its port flows onto connected ports.
    pub(crate) fn step_component(
        &mut self,
        idx: usize,
        state: &SimulationState,
        action: Option<f64>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), SimError> {
        let Some((name, component)) = self.components.get_index_mut(idx) else {
            return Err(SimError::UnknownComponent(format!("#{idx}")));
        };
        let mut ctx = StepContext::new(name, &mut self.ports, state, diagnostics);
        component.step(&mut ctx, action)?;

        for &id in &self.component_ports[idx] {
            if !self.ports.propagate_from(id) {
                let port = self.ports.get(id);
                let message = format!("unconnected port `{}` carries flow", port.name());
                tracing::warn!(component = %name, tick = state.time_id, "{message}");
                diagnostics.push(Diagnostic {
                    tick: state.time_id,
                    time_h: state.time_h(),
                    source: name.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Lets a controller observe and decide.
    pub(crate) fn controller_actions(
        &mut self,
        idx: usize,
        state: &SimulationState,
    ) -> Result<(String, Actions), SimError> {
        let view = EnvironmentView {
            components: &self.components,
            ports: &self.ports,
            sensors: &self.sensors,
            state,
        };
        let controller = &mut self.controllers[idx];
        controller.get_obs(&view)?;
        let actions = controller.get_action();
        for component in controller.controlled_components() {
            if !actions.contains_key(component) {
                return Err(SimError::MissingAction {
                    controller: controller.name().to_string(),
                    component: component.clone(),
                });
            }
        }
        Ok((controller.name().to_string(), actions))
    }

    /// Reads every sensor for the current tick.
    pub(crate) fn sensor_readings(&self, state: &SimulationState) -> Result<Vec<Option<f64>>, SimError> {
        let view = self.view(state);
        self.sensors
            .values()
            .map(|sensor| sensor.get_measurement(&view))
            .collect()
    }
}
