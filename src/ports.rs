//! Typed exchange points between components and the graph connecting them.
//!
//! # Sign convention
//! Flow on a port is **positive when entering** the component that owns the
//! port. Flows are amounts per tick: kJ for heat and electricity, kg for mass.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::SimError;

/// Physical quantity a port can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Mass,
    Heat,
    Electricity,
}

impl Layer {
    /// Every layer, in storage order.
    pub const ALL: [Layer; 3] = [Layer::Mass, Layer::Heat, Layer::Electricity];

    fn index(self) -> usize {
        match self {
            Layer::Mass => 0,
            Layer::Heat => 1,
            Layer::Electricity => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Mass => "mass",
            Layer::Heat => "heat",
            Layer::Electricity => "electricity",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a port fixes the set of layers it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Carries heat only.
    Heat,
    /// Carries mass and the enthalpy travelling with it; has a temperature.
    Fluid,
    /// Carries electricity only.
    Electricity,
}

impl PortKind {
    /// Layers carried by ports of this kind.
    pub fn layers(self) -> &'static [Layer] {
        match self {
            PortKind::Heat => &[Layer::Heat],
            PortKind::Fluid => &[Layer::Mass, Layer::Heat],
            PortKind::Electricity => &[Layer::Electricity],
        }
    }
}

/// Declaration of a port a component wants created at assembly time.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub kind: PortKind,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Index of a port inside its [`PortGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(usize);

/// A single exchange point owned by one component.
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    kind: PortKind,
    owner: String,
    flow: [f64; 3],
    temperature: Option<f64>,
    connected: Option<PortId>,
}

impl Port {
    fn new(spec: PortSpec, owner: &str) -> Self {
        Self {
            name: spec.name,
            kind: spec.kind,
            owner: owner.to_string(),
            flow: [0.0; 3],
            temperature: None,
            connected: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Name of the component owning this port.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn layers(&self) -> &'static [Layer] {
        self.kind.layers()
    }

    pub fn carries(&self, layer: Layer) -> bool {
        self.layers().contains(&layer)
    }

    /// Signed flow on `layer`; zero for layers the port does not carry.
    pub fn flow(&self, layer: Layer) -> f64 {
        self.flow[layer.index()]
    }

    /// Sets the signed flow on `layer`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LayerNotCarried`] if the port lacks the layer.
    pub fn set_flow(&mut self, layer: Layer, value: f64) -> Result<(), SimError> {
        if !self.carries(layer) {
            return Err(SimError::LayerNotCarried {
                port: self.name.clone(),
                layer,
            });
        }
        self.flow[layer.index()] = value;
        Ok(())
    }

    /// Temperature (K) asserted on this port for the current tick, if any.
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: Option<f64>) {
        self.temperature = temperature;
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Zeroes every layer flow and forgets the temperature.
    pub fn reset_flow(&mut self) {
        self.flow = [0.0; 3];
        self.temperature = None;
    }
}

/// Arena of all ports plus the undirected connections between them.
#[derive(Debug, Clone, Default)]
pub struct PortGraph {
    ports: Vec<Port>,
    index: IndexMap<String, PortId>,
    connections: Vec<(PortId, PortId)>,
}

impl PortGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a port owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateName`] if the port name is taken.
    pub(crate) fn add(&mut self, spec: PortSpec, owner: &str) -> Result<PortId, SimError> {
        if self.index.contains_key(&spec.name) {
            return Err(SimError::DuplicateName(spec.name));
        }
        let id = PortId(self.ports.len());
        self.index.insert(spec.name.clone(), id);
        self.ports.push(Port::new(spec, owner));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn id(&self, name: &str) -> Result<PortId, SimError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownPort(name.to_string()))
    }

    pub fn get(&self, id: PortId) -> &Port {
        &self.ports[id.0]
    }

    pub fn get_mut(&mut self, id: PortId) -> &mut Port {
        &mut self.ports[id.0]
    }

    pub fn port(&self, name: &str) -> Result<&Port, SimError> {
        let id = self.id(name)?;
        Ok(self.get(id))
    }

    pub fn port_mut(&mut self, name: &str) -> Result<&mut Port, SimError> {
        let id = self.id(name)?;
        Ok(self.get_mut(id))
    }

    /// Ports in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (PortId, &Port)> {
        self.ports.iter().enumerate().map(|(i, p)| (PortId(i), p))
    }

    /// Declared connections in declaration order.
    pub fn connections(&self) -> &[(PortId, PortId)] {
        &self.connections
    }

    /// The port connected to `id`, if any.
    pub fn partner(&self, id: PortId) -> Option<PortId> {
        self.get(id).connected
    }

    /// Mutually registers two ports as connected.
    ///
    /// # Errors
    ///
    /// - [`SimError::UnknownPort`] if either name is not registered.
    /// - [`SimError::ConnectionConflict`] if either port already has a partner
    ///   (including connecting a port to itself).
    /// - [`SimError::PortKindMismatch`] if the ports carry different layers.
    pub fn connect(&mut self, a: &str, b: &str) -> Result<(), SimError> {
        let a_id = self.id(a)?;
        let b_id = self.id(b)?;
        for (id, other) in [(a_id, b), (b_id, a)] {
            if let Some(existing) = self.get(id).connected {
                return Err(SimError::ConnectionConflict {
                    port: self.get(id).name.clone(),
                    existing: self.get(existing).name.clone(),
                    requested: other.to_string(),
                });
            }
        }
        if a_id == b_id {
            return Err(SimError::ConnectionConflict {
                port: a.to_string(),
                existing: a.to_string(),
                requested: b.to_string(),
            });
        }
        let (a_kind, b_kind) = (self.get(a_id).kind, self.get(b_id).kind);
        if a_kind != b_kind {
            return Err(SimError::PortKindMismatch {
                a: a.to_string(),
                a_kind,
                b: b.to_string(),
                b_kind,
            });
        }
        self.get_mut(a_id).connected = Some(b_id);
        self.get_mut(b_id).connected = Some(a_id);
        self.connections.push((a_id, b_id));
        Ok(())
    }

    /// Resets the flows and temperatures of every port.
    pub fn reset(&mut self) {
        for port in &mut self.ports {
            port.reset_flow();
        }
    }

    /// Mirrors the flows of `id` onto its partner and, for fluid ports,
    /// hands the partner the source temperature.
    ///
    /// Returns `false` when the port is unconnected and carries flow, so the
    /// caller can report it.
    pub fn propagate_from(&mut self, id: PortId) -> bool {
        let source = self.get(id);
        let Some(partner) = source.connected else {
            return source.flow.iter().all(|f| *f == 0.0);
        };
        let flow = source.flow;
        let temperature = source.temperature;
        let fluid = source.kind == PortKind::Fluid;

        let target = self.get_mut(partner);
        for layer in target.kind.layers() {
            target.flow[layer.index()] = -flow[layer.index()];
        }
        if fluid && temperature.is_some() {
            target.temperature = temperature;
        }
        true
    }

    /// Checks `flow_a == -flow_b` on every connection and shared layer.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::FlowMismatch`] on the first violating connection.
    pub fn check_conservation(&self, tick: usize) -> Result<(), SimError> {
        for &(a_id, b_id) in &self.connections {
            let (a, b) = (self.get(a_id), self.get(b_id));
            for &layer in a.layers() {
                let (fa, fb) = (a.flow(layer), b.flow(layer));
                let scale = fa.abs().max(fb.abs()).max(1.0);
                if (fa + fb).abs() > 1e-9 * scale {
                    return Err(SimError::FlowMismatch {
                        a: a.name.clone(),
                        a_flow: fa,
                        b: b.name.clone(),
                        b_flow: fb,
                        layer,
                        tick,
                    });
                }
            }
        }
        Ok(())
    }
}
