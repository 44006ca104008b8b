//! Rule-based controllers.
//!
//! A controller observes the environment, then returns one action per
//! component it controls. The engine steps every controlled component right
//! after its controller, in the order of the returned map.

use indexmap::IndexMap;

use crate::components::types::Quantity;
use crate::components::utilities::Inverter;
use crate::constants::c_to_k;
use crate::environment::EnvironmentView;
use crate::error::SimError;
use crate::ports::Layer;

/// Actions by controlled component name.
pub type Actions = IndexMap<String, Option<f64>>;

pub trait Controller {
    fn name(&self) -> &str;

    /// Components this controller issues actions for, in stepping order.
    fn controlled_components(&self) -> &[String];

    /// Sensors this controller reads.
    fn sensors(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Resets any memory before a run.
    fn initialize(&mut self) {}

    /// Reads sensors and ports and caches the observation.
    fn get_obs(&mut self, view: &EnvironmentView<'_>) -> Result<(), SimError>;

    /// Decides the actions from the cached observation.
    fn get_action(&mut self) -> Actions;
}

/// Hysteresis controller for an on/off heater.
///
/// Switches on at or below the comfort temperature, off above comfort plus
/// bandwidth, and keeps its previous decision in between.
#[derive(Debug, Clone)]
pub struct HeaterControllerWithBandwidth {
    name: String,
    controlled: Vec<String>,
    sensor: String,
    /// K
    comfort_temperature: f64,
    /// K
    bandwidth: f64,
    previous_action: f64,
    observed: Option<f64>,
}

impl HeaterControllerWithBandwidth {
    /// # Arguments
    ///
    /// * `name` - Controller name
    /// * `heater` - Controlled component
    /// * `temperature_sensor` - Sensor giving the controlled temperature (K)
    /// * `comfort_temperature_c` - Lower bound of the band (°C)
    /// * `bandwidth` - Width of the band (K)
    pub fn new(
        name: &str,
        heater: &str,
        temperature_sensor: &str,
        comfort_temperature_c: f64,
        bandwidth: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            controlled: vec![heater.to_string()],
            sensor: temperature_sensor.to_string(),
            comfort_temperature: c_to_k(comfort_temperature_c),
            bandwidth,
            previous_action: 0.0,
            observed: None,
        }
    }

    fn decide(&self, temperature: Option<f64>) -> f64 {
        match temperature {
            Some(t) if t <= self.comfort_temperature => 1.0,
            Some(t) if t <= self.comfort_temperature + self.bandwidth => self.previous_action,
            Some(_) => 0.0,
            None => self.previous_action,
        }
    }
}

impl Controller for HeaterControllerWithBandwidth {
    fn name(&self) -> &str {
        &self.name
    }

    fn controlled_components(&self) -> &[String] {
        &self.controlled
    }

    fn sensors(&self) -> Vec<&str> {
        vec![&self.sensor]
    }

    fn initialize(&mut self) {
        self.previous_action = 0.0;
        self.observed = None;
    }

    fn get_obs(&mut self, view: &EnvironmentView<'_>) -> Result<(), SimError> {
        self.observed = view.sensor(&self.sensor)?;
        Ok(())
    }

    fn get_action(&mut self) -> Actions {
        let action = self.decide(self.observed);
        self.previous_action = action;
        IndexMap::from([(self.controlled[0].clone(), Some(action))])
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BatteryObs {
    soc: f64,
    /// kJ
    capacity: f64,
    /// kW
    max_charge: f64,
    /// kW
    max_discharge: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct InverterObs {
    /// kJ entering from PV
    pv: f64,
    /// kJ entering from the AC side (negative when the load draws)
    ac_output: f64,
    efficiency: f64,
    time_step: f64,
    battery: Option<BatteryObs>,
}

/// Dispatches a battery behind an [`Inverter`] to cover the AC load with PV.
///
/// Surplus PV charges the battery and deficits discharge it, each limited by
/// the battery power and by the energy left inside the `[soc_min, soc_max]`
/// window. Without a battery the inverter is commanded zero exchange.
#[derive(Debug, Clone)]
pub struct InverterController {
    name: String,
    inverter: String,
    battery: Option<String>,
    controlled: Vec<String>,
    soc_min: f64,
    soc_max: f64,
    observed: InverterObs,
}

impl InverterController {
    pub fn new(
        name: &str,
        inverter: &str,
        battery: Option<&str>,
        soc_min: f64,
        soc_max: f64,
    ) -> Self {
        let mut controlled = vec![inverter.to_string()];
        controlled.extend(battery.map(str::to_string));
        Self {
            name: name.to_string(),
            inverter: inverter.to_string(),
            battery: battery.map(str::to_string),
            controlled,
            soc_min,
            soc_max,
            observed: InverterObs::default(),
        }
    }

    /// Energy (kJ) the inverter should take from storage this tick.
    fn storage_exchange(&self) -> f64 {
        let obs = &self.observed;
        let Some(battery) = obs.battery else {
            return 0.0;
        };
        let dc_balance = obs.pv + obs.ac_output / obs.efficiency;
        if dc_balance >= 0.0 {
            let by_power = (battery.max_charge * obs.time_step).min(dc_balance);
            let by_energy = (battery.capacity * (self.soc_max - battery.soc)).max(0.0);
            -by_power.min(by_energy)
        } else {
            let by_power = (battery.max_discharge * obs.time_step).min(-dc_balance);
            let by_energy = (battery.capacity * (battery.soc - self.soc_min)).max(0.0);
            by_power.min(by_energy)
        }
    }
}

fn required(view: &EnvironmentView<'_>, component: &str, quantity: Quantity) -> Result<f64, SimError> {
    view.quantity(component, quantity)?.ok_or_else(|| {
        SimError::invalid_parameter(component, format!("does not expose {quantity:?}"))
    })
}

impl Controller for InverterController {
    fn name(&self) -> &str {
        &self.name
    }

    fn controlled_components(&self) -> &[String] {
        &self.controlled
    }

    fn get_obs(&mut self, view: &EnvironmentView<'_>) -> Result<(), SimError> {
        let pv = view
            .port(&Inverter::pv_port_name(&self.inverter))?
            .flow(Layer::Electricity);
        let ac_output = view
            .port(&Inverter::ac_output_port_name(&self.inverter))?
            .flow(Layer::Electricity);
        let battery = match &self.battery {
            Some(b) => Some(BatteryObs {
                soc: required(view, b, Quantity::StateOfCharge)?,
                capacity: required(view, b, Quantity::Capacity)?,
                max_charge: required(view, b, Quantity::MaxChargePower)?,
                max_discharge: required(view, b, Quantity::MaxDischargePower)?,
            }),
            None => None,
        };
        self.observed = InverterObs {
            pv,
            ac_output,
            efficiency: required(view, &self.inverter, Quantity::Efficiency)?,
            time_step: view.state().time_step,
            battery,
        };
        Ok(())
    }

    fn get_action(&mut self) -> Actions {
        let mut actions = IndexMap::from([(self.inverter.clone(), Some(self.storage_exchange()))]);
        if let Some(battery) = &self.battery {
            actions.insert(battery.clone(), None);
        }
        actions
    }
}
