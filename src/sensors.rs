//! Scalar measurements taken from ports and components.
//!
//! Every reading is computed at most once per tick: the environment wraps
//! each sensor in a [`CachedSensor`] whose cache is cleared at tick start.

use std::cell::OnceCell;

use crate::components::types::Quantity;
use crate::environment::EnvironmentView;
use crate::error::SimError;
use crate::ports::Layer;

/// What a sensor reads, so references can be checked at assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorTarget<'a> {
    Port(&'a str),
    Component(&'a str),
}

/// A read-only probe into the environment.
pub trait Sensor {
    fn name(&self) -> &str;

    fn target(&self) -> SensorTarget<'_>;

    /// Reads the current value; `None` when the quantity is unknown this
    /// tick (for example a port nobody asserted a temperature on).
    fn measure(&self, view: &EnvironmentView<'_>) -> Result<Option<f64>, SimError>;
}

/// Sensor plus its per-tick reading.
pub struct CachedSensor {
    sensor: Box<dyn Sensor>,
    reading: OnceCell<Option<f64>>,
}

impl CachedSensor {
    pub fn new(sensor: Box<dyn Sensor>) -> Self {
        Self {
            sensor,
            reading: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.sensor.name()
    }

    pub fn target(&self) -> SensorTarget<'_> {
        self.sensor.target()
    }

    /// Returns the cached reading, measuring on first use in a tick.
    pub fn get_measurement(&self, view: &EnvironmentView<'_>) -> Result<Option<f64>, SimError> {
        if let Some(reading) = self.reading.get() {
            return Ok(*reading);
        }
        let reading = self.sensor.measure(view)?;
        let _ = self.reading.set(reading);
        Ok(reading)
    }

    pub fn clear(&mut self) {
        self.reading.take();
    }
}

/// Temperature asserted on a port (K).
#[derive(Debug, Clone)]
pub struct PortTemperatureSensor {
    name: String,
    port: String,
}

impl PortTemperatureSensor {
    pub fn new(name: &str, port: &str) -> Self {
        Self {
            name: name.to_string(),
            port: port.to_string(),
        }
    }
}

impl Sensor for PortTemperatureSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> SensorTarget<'_> {
        SensorTarget::Port(&self.port)
    }

    fn measure(&self, view: &EnvironmentView<'_>) -> Result<Option<f64>, SimError> {
        Ok(view.port(&self.port)?.temperature())
    }
}

/// Flow rate on one layer of a port: kW for energy, kg/s for mass.
#[derive(Debug, Clone)]
pub struct PortFlowSensor {
    name: String,
    port: String,
    layer: Layer,
}

impl PortFlowSensor {
    pub fn new(name: &str, port: &str, layer: Layer) -> Self {
        Self {
            name: name.to_string(),
            port: port.to_string(),
            layer,
        }
    }
}

impl Sensor for PortFlowSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> SensorTarget<'_> {
        SensorTarget::Port(&self.port)
    }

    fn measure(&self, view: &EnvironmentView<'_>) -> Result<Option<f64>, SimError> {
        let port = view.port(&self.port)?;
        if !port.carries(self.layer) {
            return Err(SimError::LayerNotCarried {
                port: self.port.clone(),
                layer: self.layer,
            });
        }
        Ok(Some(port.flow(self.layer) / view.state().time_step))
    }
}

/// Scalar state exposed by a component, such as a tank temperature or a
/// battery state of charge.
#[derive(Debug, Clone)]
pub struct ComponentSensor {
    name: String,
    component: String,
    quantity: Quantity,
}

impl ComponentSensor {
    pub fn new(name: &str, component: &str, quantity: Quantity) -> Self {
        Self {
            name: name.to_string(),
            component: component.to_string(),
            quantity,
        }
    }

    pub fn temperature(name: &str, component: &str) -> Self {
        Self::new(name, component, Quantity::Temperature)
    }

    pub fn state_of_charge(name: &str, component: &str) -> Self {
        Self::new(name, component, Quantity::StateOfCharge)
    }
}

impl Sensor for ComponentSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> SensorTarget<'_> {
        SensorTarget::Component(&self.component)
    }

    fn measure(&self, view: &EnvironmentView<'_>) -> Result<Option<f64>, SimError> {
        view.quantity(&self.component, self.quantity)
    }
}
