//! Storage units: a perfectly mixed hot water tank and an electric battery.

use std::f64::consts::PI;

use crate::components::types::{Category, Component, InheritedValue, Quantity, StepContext};
use crate::constants::{SECONDS_PER_HOUR, WATER, c_to_k};
use crate::error::SimError;
use crate::ports::{Layer, PortKind, PortSpec};
use crate::sim::state::SimulationState;

/// Construction parameters shared by the hot water tank models.
#[derive(Debug, Clone, PartialEq)]
pub struct TankParams {
    /// Volume (l).
    pub volume_l: f64,
    /// Height (m); when absent a height-to-diameter ratio of 2 is assumed.
    pub height_m: Option<f64>,
    pub max_temperature_c: f64,
    pub initial_temperature_c: f64,
    /// Loss coefficient towards the surroundings (W/m²K).
    pub loss_coefficient: f64,
    /// Losses go to `indoor_temperature_c` when true, otherwise to the
    /// ambient temperature of the environment.
    pub located_inside: bool,
    pub indoor_temperature_c: f64,
}

impl Default for TankParams {
    fn default() -> Self {
        Self {
            volume_l: 200.0,
            height_m: None,
            max_temperature_c: 80.0,
            initial_temperature_c: 40.0,
            loss_coefficient: 0.8,
            located_inside: true,
            indoor_temperature_c: 22.0,
        }
    }
}

impl TankParams {
    pub(crate) fn validate(&self, name: &str) -> Result<(), SimError> {
        if !(self.volume_l > 0.0) {
            return Err(SimError::invalid_parameter(name, "volume must be > 0"));
        }
        if let Some(h) = self.height_m {
            if !(h > 0.0) {
                return Err(SimError::invalid_parameter(name, "height must be > 0"));
            }
        }
        if self.loss_coefficient < 0.0 {
            return Err(SimError::invalid_parameter(
                name,
                "loss coefficient must be >= 0",
            ));
        }
        Ok(())
    }
}

/// Cylinder dimensions derived from volume and optional height (SI units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankGeometry {
    /// m³
    pub volume: f64,
    /// m
    pub height: f64,
    /// m
    pub diameter: f64,
    /// Lateral plus top and bottom surface (m²).
    pub surface: f64,
    /// m²
    pub cross_section: f64,
    /// m²
    pub lateral_surface: f64,
}

impl TankGeometry {
    pub fn new(volume_l: f64, height_m: Option<f64>) -> Self {
        let volume = volume_l * 1e-3;
        let height = height_m.unwrap_or_else(|| (volume * 16.0 / PI).powf(1.0 / 3.0));
        let diameter = (4.0 * volume / height / PI).sqrt();
        Self {
            volume,
            height,
            diameter,
            surface: PI * diameter * (height + 0.5 * diameter),
            cross_section: PI * diameter * diameter / 4.0,
            lateral_surface: PI * diameter * height,
        }
    }

    /// Water mass (kg).
    pub fn mass(&self) -> f64 {
        self.volume * WATER.rho
    }
}

/// Port names of a hot water tank.
#[derive(Debug, Clone)]
pub(crate) struct TankPorts {
    pub cold_water_input: String,
    pub hot_water_output: String,
    pub main_heat_input: String,
    pub aux_heat_input: String,
}

impl TankPorts {
    pub fn new(name: &str) -> Self {
        Self {
            cold_water_input: format!("{name}_cold_water_input_port"),
            hot_water_output: format!("{name}_hot_water_output_port"),
            main_heat_input: format!("{name}_main_heat_input_port"),
            aux_heat_input: format!("{name}_aux_heat_input_port"),
        }
    }

    pub fn specs(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new(&self.cold_water_input, PortKind::Fluid),
            PortSpec::new(&self.hot_water_output, PortKind::Fluid),
            PortSpec::new(&self.main_heat_input, PortKind::Heat),
            PortSpec::new(&self.aux_heat_input, PortKind::Heat),
        ]
    }
}

/// Reports a state of charge outside `[min, max]` without aborting the run.
pub(crate) fn check_soc(ctx: &mut StepContext<'_>, soc: f64, min: f64, max: f64) {
    if soc > max {
        ctx.warn(format!(
            "state of charge {soc:.4} above the maximum allowed {max}"
        ));
    } else if soc < min {
        ctx.warn(format!(
            "state of charge {soc:.4} below the minimum allowed {min}"
        ));
    }
}

/// Hot water tank modelled as a single perfectly mixed volume.
///
/// Cold water enters at the rate hot water is drawn. The temperature
/// follows an explicit energy balance over the tick.
#[derive(Debug, Clone)]
pub struct HotWaterStorage {
    name: String,
    ports: TankPorts,
    geometry: TankGeometry,
    max_temperature: f64,
    initial_temperature: f64,
    loss_coefficient: f64,
    located_inside: bool,
    indoor_temperature: f64,
    temperature: f64,
    soc: f64,
}

impl HotWaterStorage {
    pub fn new(name: &str, params: &TankParams) -> Result<Self, SimError> {
        params.validate(name)?;
        let initial_temperature = c_to_k(params.initial_temperature_c);
        Ok(Self {
            name: name.to_string(),
            ports: TankPorts::new(name),
            geometry: TankGeometry::new(params.volume_l, params.height_m),
            max_temperature: c_to_k(params.max_temperature_c),
            initial_temperature,
            loss_coefficient: params.loss_coefficient,
            located_inside: params.located_inside,
            indoor_temperature: c_to_k(params.indoor_temperature_c),
            temperature: initial_temperature,
            soc: 0.0,
        })
    }

    pub fn geometry(&self) -> &TankGeometry {
        &self.geometry
    }

    /// Mean water temperature (K).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn cold_water_port_name(&self) -> &str {
        &self.ports.cold_water_input
    }

    pub fn hot_water_port_name(&self) -> &str {
        &self.ports.hot_water_output
    }

    pub fn main_heat_port_name(&self) -> &str {
        &self.ports.main_heat_input
    }

    pub fn aux_heat_port_name(&self) -> &str {
        &self.ports.aux_heat_input
    }

    fn surroundings(&self, state: &SimulationState) -> f64 {
        if self.located_inside {
            self.indoor_temperature
        } else {
            state.environmental_data.ambient_temperature
        }
    }

    fn soc_at(&self, cold_water_temperature: f64) -> f64 {
        (self.temperature - cold_water_temperature) / (self.max_temperature - cold_water_temperature)
    }
}

impl Component for HotWaterStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::StorageUnit
    }

    fn ports(&self) -> Vec<PortSpec> {
        self.ports.specs()
    }

    fn initialize(&mut self, state: &SimulationState) -> Result<(), SimError> {
        self.temperature = self.initial_temperature;
        self.soc = self.soc_at(state.environmental_data.cold_water_temperature);
        Ok(())
    }

    fn inherited_port_values(&self, _state: &SimulationState) -> Vec<InheritedValue> {
        vec![
            InheritedValue {
                port: self.ports.hot_water_output.clone(),
                temperature: self.temperature,
            },
            InheritedValue {
                port: self.ports.main_heat_input.clone(),
                temperature: self.temperature,
            },
        ]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let dt = ctx.time_step();
        let env = *ctx.environmental_data();
        let p = &self.ports;

        let drawn_mass = ctx.flow(&p.hot_water_output, Layer::Mass)?;
        let t_cold = ctx
            .temperature(&p.cold_water_input)?
            .unwrap_or(env.cold_water_temperature);
        let inlet_mass = -drawn_mass;
        let inlet_heat = inlet_mass.abs() * WATER.cp * t_cold;
        ctx.set_flow(&p.cold_water_input, Layer::Mass, inlet_mass)?;
        ctx.set_flow(&p.cold_water_input, Layer::Heat, inlet_heat)?;

        // kW
        let losses = -self.loss_coefficient
            * self.geometry.surface
            * (self.temperature - self.surroundings(ctx.state))
            * 1e-3;
        let heat_input =
            ctx.flow(&p.main_heat_input, Layer::Heat)? + ctx.flow(&p.aux_heat_input, Layer::Heat)?;
        let heat_fluid = ctx.flow(&p.hot_water_output, Layer::Heat)? + inlet_heat;

        self.temperature += (heat_input + heat_fluid + losses * dt) / (WATER.cp * self.geometry.mass());
        self.soc = self.soc_at(env.cold_water_temperature);
        check_soc(ctx, self.soc, 0.0, 1.0);
        Ok(())
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Temperature => Some(self.temperature),
            Quantity::StateOfCharge => Some(self.soc),
            _ => None,
        }
    }
}

/// Battery chemistry, fixing how power limits depend on the state of charge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Chemistry {
    /// Constant power limits over the whole SOC range.
    Generic,
    /// Full power between `soc_min` and `soc_max`; charge power falls
    /// linearly to zero above `soc_max`, discharge power below `soc_min`.
    LithiumIon { soc_min: f64, soc_max: f64 },
}

/// Parameters of a [`Battery`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryParams {
    /// Energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charge power per unit capacity (1/h).
    pub c_rate: f64,
    /// Maximum discharge power per unit capacity (1/h).
    pub e_rate: f64,
    pub efficiency_charge: f64,
    pub efficiency_discharge: f64,
    pub initial_soc: f64,
    /// Fraction of the stored charge lost per hour.
    pub self_discharge_rate: f64,
    pub chemistry: Chemistry,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            capacity_kwh: 5.0,
            c_rate: 1.0,
            e_rate: 1.0,
            efficiency_charge: 0.92,
            efficiency_discharge: 0.94,
            initial_soc: 0.5,
            self_discharge_rate: 0.0,
            chemistry: Chemistry::Generic,
        }
    }
}

impl BatteryParams {
    /// Defaults for a lithium-ion pack: 30–90 % window and 2.5 % charge
    /// lost per month.
    pub fn lithium_ion(capacity_kwh: f64) -> Self {
        Self {
            capacity_kwh,
            self_discharge_rate: 0.025 / 30.0 / 24.0,
            chemistry: Chemistry::LithiumIon {
                soc_min: 0.3,
                soc_max: 0.9,
            },
            ..Self::default()
        }
    }
}

/// Electric battery with charge and discharge efficiencies.
///
/// The battery does not choose its own flow: whatever enters its port
/// (positive to charge) is booked against the state of charge.
#[derive(Debug, Clone)]
pub struct Battery {
    name: String,
    port_name: String,
    params: BatteryParams,
    /// kJ
    capacity: f64,
    soc: f64,
}

impl Battery {
    pub fn new(name: &str, params: BatteryParams) -> Result<Self, SimError> {
        if !(params.capacity_kwh > 0.0) {
            return Err(SimError::invalid_parameter(name, "capacity must be > 0"));
        }
        for (label, eff) in [
            ("charge", params.efficiency_charge),
            ("discharge", params.efficiency_discharge),
        ] {
            if !(eff > 0.0 && eff <= 1.0) {
                return Err(SimError::invalid_parameter(
                    name,
                    format!("{label} efficiency must be within (0, 1]"),
                ));
            }
        }
        if let Chemistry::LithiumIon { soc_min, soc_max } = params.chemistry {
            if !(0.0 < soc_min && soc_min < soc_max && soc_max < 1.0) {
                return Err(SimError::invalid_parameter(
                    name,
                    "lithium-ion window needs 0 < soc_min < soc_max < 1",
                ));
            }
        }
        Ok(Self {
            name: name.to_string(),
            port_name: format!("{name}_electricity_port"),
            capacity: params.capacity_kwh * SECONDS_PER_HOUR,
            soc: params.initial_soc,
            params,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn soc(&self) -> f64 {
        self.soc
    }

    /// Stored energy at full charge (kJ).
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Maximum charge power at the current state of charge (kW).
    pub fn max_charge_power(&self) -> f64 {
        let nominal = self.params.capacity_kwh * self.params.c_rate;
        match self.params.chemistry {
            Chemistry::LithiumIon { soc_max, .. } if self.soc >= soc_max => {
                (nominal * (1.0 - self.soc) / (1.0 - soc_max)).max(0.0)
            }
            _ => nominal,
        }
    }

    /// Maximum discharge power at the current state of charge (kW).
    pub fn max_discharge_power(&self) -> f64 {
        let nominal = self.params.capacity_kwh * self.params.e_rate;
        match self.params.chemistry {
            Chemistry::LithiumIon { soc_min, .. } if self.soc <= soc_min => {
                (nominal * self.soc / soc_min).max(0.0)
            }
            _ => nominal,
        }
    }
}

impl Component for Battery {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        Category::StorageUnit
    }

    fn ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new(&self.port_name, PortKind::Electricity)]
    }

    fn initialize(&mut self, _state: &SimulationState) -> Result<(), SimError> {
        self.soc = self.params.initial_soc;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let flow = ctx.flow(&self.port_name, Layer::Electricity)?;
        if flow > 0.0 {
            self.soc += flow * self.params.efficiency_charge / self.capacity;
        } else {
            self.soc += flow / self.params.efficiency_discharge / self.capacity;
        }
        self.soc -= self.soc * self.params.self_discharge_rate * ctx.time_step() / SECONDS_PER_HOUR;
        check_soc(ctx, self.soc, 0.0, 1.0);
        Ok(())
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::StateOfCharge => Some(self.soc),
            Quantity::Capacity => Some(self.capacity),
            Quantity::MaxChargePower => Some(self.max_charge_power()),
            Quantity::MaxDischargePower => Some(self.max_discharge_power()),
            _ => None,
        }
    }
}
