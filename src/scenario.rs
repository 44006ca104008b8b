//! Declarative TOML scenarios and the factory turning them into a runnable
//! [`Simulator`].
//!
//! A scenario lists components, sensors and controllers by `type`, plus the
//! port connections between them:
//!
//! ```toml
//! [simulation]
//! time_end_h = 24.0
//! time_step_h = 0.25
//!
//! [[components]]
//! type = "electricity_demand"
//! name = "house"
//! profile = { step_h = 1.0, values = [0.4, 0.3, 0.5] }
//!
//! [[components]]
//! type = "balancing_utility"
//! name = "grid"
//! port = "electricity"
//!
//! [[connections]]
//! from = "house_electricity_port"
//! to = "grid_electricity_port"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::components::types::Component;
use crate::components::{
    BalancingUtility, Battery, BatteryParams, Chemistry, ColdWaterGrid, ConstantPowerProducer,
    ElectricityDemand, GenericUtility, HeatInputHeight, HeatPumpConstantEfficiency,
    HeatPumpLorentz, HotWaterDemand, HotWaterStorage, Inverter, LorentzDesign, LorentzParams,
    MultiNodeHotWaterTank, MultiNodeParams, PvPanel, SimplifiedHeatSource, TankParams,
    UtilityDirection,
};
use crate::controllers::{Controller, HeaterControllerWithBandwidth, InverterController};
use crate::environment::Environment;
use crate::error::{ConfigError, SimError};
use crate::ports::{Layer, PortKind};
use crate::sensors::{ComponentSensor, PortFlowSensor, PortTemperatureSensor, Sensor};
use crate::sim::config::{EnvironmentConfig, SimulationConfig};
use crate::sim::simulator::Simulator;
use crate::sim::state::ConstantConditions;
use crate::timeseries::TimeSeries;

/// Top-level scenario parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run timing.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Ambient and cold water temperatures.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    /// Controllers, in execution order.
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// A profile sampled at a fixed step, starting at simulated time 0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Sample spacing (h).
    #[serde(default = "default_profile_step")]
    pub step_h: f64,
    pub values: Vec<f64>,
}

fn default_profile_step() -> f64 {
    1.0
}

impl ProfileConfig {
    fn to_series(&self) -> Result<TimeSeries, SimError> {
        TimeSeries::new(self.step_h, self.values.clone())
    }

    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.step_h > 0.0) {
            errors.push(ConfigError::new(format!("{field}.step_h"), "must be > 0"));
        }
        if self.values.is_empty() {
            errors.push(ConfigError::new(format!("{field}.values"), "must not be empty"));
        }
    }
}

/// Geometry and thermal parameters shared by both tank models.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TankConfig {
    pub volume_l: f64,
    pub height_m: Option<f64>,
    pub max_temperature_c: f64,
    pub initial_temperature_c: f64,
    /// W/m²K
    pub loss_coefficient: f64,
    pub located_inside: bool,
    pub indoor_temperature_c: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        let p = TankParams::default();
        Self {
            volume_l: p.volume_l,
            height_m: p.height_m,
            max_temperature_c: p.max_temperature_c,
            initial_temperature_c: p.initial_temperature_c,
            loss_coefficient: p.loss_coefficient,
            located_inside: p.located_inside,
            indoor_temperature_c: p.indoor_temperature_c,
        }
    }
}

impl TankConfig {
    fn params(&self) -> TankParams {
        TankParams {
            volume_l: self.volume_l,
            height_m: self.height_m,
            max_temperature_c: self.max_temperature_c,
            initial_temperature_c: self.initial_temperature_c,
            loss_coefficient: self.loss_coefficient,
            located_inside: self.located_inside,
            indoor_temperature_c: self.indoor_temperature_c,
        }
    }

    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.volume_l > 0.0) {
            errors.push(ConfigError::new(format!("{field}.volume_l"), "must be > 0"));
        }
        if self.height_m.is_some_and(|h| !(h > 0.0)) {
            errors.push(ConfigError::new(format!("{field}.height_m"), "must be > 0"));
        }
        if self.loss_coefficient < 0.0 {
            errors.push(ConfigError::new(
                format!("{field}.loss_coefficient"),
                "must be >= 0",
            ));
        }
        if self.initial_temperature_c > self.max_temperature_c {
            errors.push(ConfigError::new(
                format!("{field}.initial_temperature_c"),
                "must be <= max_temperature_c",
            ));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemistryKind {
    #[default]
    Generic,
    LithiumIon,
}

/// Battery parameters; lithium-ion packs default to a 30–90 % window and
/// monthly self-discharge of 2.5 %.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    pub name: String,
    pub capacity_kwh: f64,
    pub c_rate: f64,
    pub e_rate: f64,
    pub efficiency_charge: f64,
    pub efficiency_discharge: f64,
    pub initial_soc: f64,
    /// 1/h
    pub self_discharge_rate: Option<f64>,
    pub chemistry: ChemistryKind,
    pub soc_min: Option<f64>,
    pub soc_max: Option<f64>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        let p = BatteryParams::default();
        Self {
            name: String::new(),
            capacity_kwh: p.capacity_kwh,
            c_rate: p.c_rate,
            e_rate: p.e_rate,
            efficiency_charge: p.efficiency_charge,
            efficiency_discharge: p.efficiency_discharge,
            initial_soc: p.initial_soc,
            self_discharge_rate: None,
            chemistry: ChemistryKind::Generic,
            soc_min: None,
            soc_max: None,
        }
    }
}

impl BatteryConfig {
    fn params(&self) -> BatteryParams {
        let base = match self.chemistry {
            ChemistryKind::Generic => BatteryParams::default(),
            ChemistryKind::LithiumIon => BatteryParams::lithium_ion(self.capacity_kwh),
        };
        let chemistry = match base.chemistry {
            Chemistry::LithiumIon { soc_min, soc_max } => Chemistry::LithiumIon {
                soc_min: self.soc_min.unwrap_or(soc_min),
                soc_max: self.soc_max.unwrap_or(soc_max),
            },
            Chemistry::Generic => Chemistry::Generic,
        };
        BatteryParams {
            capacity_kwh: self.capacity_kwh,
            c_rate: self.c_rate,
            e_rate: self.e_rate,
            efficiency_charge: self.efficiency_charge,
            efficiency_discharge: self.efficiency_discharge,
            initial_soc: self.initial_soc,
            self_discharge_rate: self.self_discharge_rate.unwrap_or(base.self_discharge_rate),
            chemistry,
        }
    }

    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if !(self.capacity_kwh > 0.0) {
            errors.push(ConfigError::new(format!("{field}.capacity_kwh"), "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.initial_soc) {
            errors.push(ConfigError::new(
                format!("{field}.initial_soc"),
                "must be in [0.0, 1.0]",
            ));
        }
        for (key, eff) in [
            ("efficiency_charge", self.efficiency_charge),
            ("efficiency_discharge", self.efficiency_discharge),
        ] {
            if !(eff > 0.0 && eff <= 1.0) {
                errors.push(ConfigError::new(format!("{field}.{key}"), "must be in (0.0, 1.0]"));
            }
        }
        if self.chemistry == ChemistryKind::Generic
            && (self.soc_min.is_some() || self.soc_max.is_some())
        {
            errors.push(ConfigError::new(
                format!("{field}.chemistry"),
                "soc_min and soc_max only apply to lithium_ion",
            ));
        }
    }
}

/// Lorentz heat pump parameters; exactly one of `cop`, `power_input` and
/// `lorentz_efficiency` fixes the design point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LorentzConfig {
    pub name: String,
    pub heat_output: f64,
    pub cop: Option<f64>,
    pub power_input: Option<f64>,
    pub lorentz_efficiency: Option<f64>,
    pub air_design_temperature_c: f64,
    pub water_design_temperature_c: f64,
    pub delta_t_air: f64,
    pub delta_t_water: f64,
    pub heat_capacity_loss: f64,
}

impl Default for LorentzConfig {
    fn default() -> Self {
        let p = LorentzParams::default();
        Self {
            name: String::new(),
            heat_output: p.heat_output,
            cop: None,
            power_input: None,
            lorentz_efficiency: None,
            air_design_temperature_c: p.air_design_temperature_c,
            water_design_temperature_c: p.water_design_temperature_c,
            delta_t_air: p.delta_t_air,
            delta_t_water: p.delta_t_water,
            heat_capacity_loss: p.heat_capacity_loss,
        }
    }
}

impl LorentzConfig {
    fn design(&self) -> LorentzDesign {
        match (self.cop, self.power_input, self.lorentz_efficiency) {
            (_, Some(p), _) => LorentzDesign::PowerInput(p),
            (_, _, Some(e)) => LorentzDesign::Efficiency(e),
            (Some(c), _, _) => LorentzDesign::Cop(c),
            (None, None, None) => LorentzParams::default().design,
        }
    }

    fn params(&self) -> LorentzParams {
        LorentzParams {
            heat_output: self.heat_output,
            design: self.design(),
            air_design_temperature_c: self.air_design_temperature_c,
            water_design_temperature_c: self.water_design_temperature_c,
            delta_t_air: self.delta_t_air,
            delta_t_water: self.delta_t_water,
            heat_capacity_loss: self.heat_capacity_loss,
        }
    }

    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        let given = [self.cop, self.power_input, self.lorentz_efficiency]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if given > 1 {
            errors.push(ConfigError::new(
                field,
                "set at most one of cop, power_input and lorentz_efficiency",
            ));
        }
        if !(self.heat_output > 0.0) {
            errors.push(ConfigError::new(format!("{field}.heat_output"), "must be > 0"));
        }
    }
}

/// One component, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ComponentConfig {
    HotWaterDemand {
        name: String,
        #[serde(default = "default_hot_water_temperature")]
        reference_temperature_c: f64,
        /// kWh per profile step.
        profile: ProfileConfig,
    },
    ElectricityDemand {
        name: String,
        /// kW
        profile: ProfileConfig,
    },
    PvPanel {
        name: String,
        /// kW
        installed_power: f64,
        capacity_factor: ProfileConfig,
    },
    ConstantPowerProducer {
        name: String,
        port: PortKind,
        /// kW
        power: f64,
    },
    GenericUtility {
        name: String,
        port: PortKind,
        /// kW
        max_power: f64,
        direction: UtilityDirection,
    },
    SimplifiedHeatSource {
        name: String,
        heat_output: f64,
        efficiency: f64,
    },
    HeatPumpConstant {
        name: String,
        heat_output: f64,
        cop: f64,
    },
    HeatPumpLorentz(LorentzConfig),
    Inverter {
        name: String,
        efficiency: f64,
    },
    BalancingUtility {
        name: String,
        port: PortKind,
    },
    ColdWaterGrid {
        name: String,
    },
    HotWaterStorage {
        name: String,
        #[serde(default)]
        tank: TankConfig,
    },
    MultiNodeTank {
        name: String,
        #[serde(default)]
        tank: TankConfig,
        #[serde(default = "default_layers")]
        layers: usize,
        #[serde(default = "default_convection_coefficient")]
        convection_effect_coefficient: f64,
        main_heat_input: Option<HeatInputHeight>,
        aux_heat_input: Option<HeatInputHeight>,
    },
    Battery(BatteryConfig),
}

fn default_hot_water_temperature() -> f64 {
    45.0
}

fn default_layers() -> usize {
    MultiNodeParams::default().layers
}

fn default_convection_coefficient() -> f64 {
    MultiNodeParams::default().convection_effect_coefficient
}

impl ComponentConfig {
    pub fn name(&self) -> &str {
        match self {
            ComponentConfig::HotWaterDemand { name, .. }
            | ComponentConfig::ElectricityDemand { name, .. }
            | ComponentConfig::PvPanel { name, .. }
            | ComponentConfig::ConstantPowerProducer { name, .. }
            | ComponentConfig::GenericUtility { name, .. }
            | ComponentConfig::SimplifiedHeatSource { name, .. }
            | ComponentConfig::HeatPumpConstant { name, .. }
            | ComponentConfig::Inverter { name, .. }
            | ComponentConfig::BalancingUtility { name, .. }
            | ComponentConfig::ColdWaterGrid { name }
            | ComponentConfig::HotWaterStorage { name, .. }
            | ComponentConfig::MultiNodeTank { name, .. } => name,
            ComponentConfig::HeatPumpLorentz(params) => &params.name,
            ComponentConfig::Battery(params) => &params.name,
        }
    }

    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        if self.name().is_empty() {
            errors.push(ConfigError::new(format!("{field}.name"), "must not be empty"));
        }
        match self {
            ComponentConfig::HotWaterDemand { profile, .. }
            | ComponentConfig::ElectricityDemand { profile, .. } => {
                profile.validate(&format!("{field}.profile"), errors);
            }
            ComponentConfig::PvPanel {
                installed_power,
                capacity_factor,
                ..
            } => {
                capacity_factor.validate(&format!("{field}.capacity_factor"), errors);
                if capacity_factor.values.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    errors.push(ConfigError::new(
                        format!("{field}.capacity_factor.values"),
                        "must be in [0.0, 1.0]",
                    ));
                }
                if *installed_power < 0.0 {
                    errors.push(ConfigError::new(
                        format!("{field}.installed_power"),
                        "must be >= 0",
                    ));
                }
            }
            ComponentConfig::ConstantPowerProducer { port, .. }
            | ComponentConfig::GenericUtility { port, .. } => {
                if *port == PortKind::Fluid {
                    errors.push(ConfigError::new(
                        format!("{field}.port"),
                        "must be \"heat\" or \"electricity\"",
                    ));
                }
            }
            ComponentConfig::SimplifiedHeatSource { efficiency, .. }
            | ComponentConfig::Inverter { efficiency, .. } => {
                if !(*efficiency > 0.0) {
                    errors.push(ConfigError::new(format!("{field}.efficiency"), "must be > 0"));
                }
            }
            ComponentConfig::HeatPumpConstant { cop, .. } => {
                if !(*cop > 0.0) {
                    errors.push(ConfigError::new(format!("{field}.cop"), "must be > 0"));
                }
            }
            ComponentConfig::HeatPumpLorentz(params) => params.validate(field, errors),
            ComponentConfig::HotWaterStorage { tank, .. } => {
                tank.validate(&format!("{field}.tank"), errors);
            }
            ComponentConfig::MultiNodeTank {
                tank,
                layers,
                convection_effect_coefficient,
                ..
            } => {
                tank.validate(&format!("{field}.tank"), errors);
                if *layers < 3 {
                    errors.push(ConfigError::new(format!("{field}.layers"), "must be >= 3"));
                }
                if *convection_effect_coefficient < 1.0 {
                    errors.push(ConfigError::new(
                        format!("{field}.convection_effect_coefficient"),
                        "must be >= 1",
                    ));
                }
            }
            ComponentConfig::Battery(params) => params.validate(field, errors),
            ComponentConfig::BalancingUtility { .. } | ComponentConfig::ColdWaterGrid { .. } => {}
        }
    }

    /// Instantiates the component.
    pub fn build(&self) -> Result<Box<dyn Component>, SimError> {
        Ok(match self {
            ComponentConfig::HotWaterDemand {
                name,
                reference_temperature_c,
                profile,
            } => Box::new(HotWaterDemand::new(
                name,
                *reference_temperature_c,
                profile.to_series()?,
            )),
            ComponentConfig::ElectricityDemand { name, profile } => {
                Box::new(ElectricityDemand::new(name, profile.to_series()?))
            }
            ComponentConfig::PvPanel {
                name,
                installed_power,
                capacity_factor,
            } => Box::new(PvPanel::new(
                name,
                *installed_power,
                capacity_factor.to_series()?,
            )?),
            ComponentConfig::ConstantPowerProducer { name, port, power } => {
                Box::new(ConstantPowerProducer::new(name, *port, *power)?)
            }
            ComponentConfig::GenericUtility {
                name,
                port,
                max_power,
                direction,
            } => Box::new(GenericUtility::new(name, *port, *max_power, *direction)?),
            ComponentConfig::SimplifiedHeatSource {
                name,
                heat_output,
                efficiency,
            } => Box::new(SimplifiedHeatSource::new(name, *heat_output, *efficiency)?),
            ComponentConfig::HeatPumpConstant {
                name,
                heat_output,
                cop,
            } => Box::new(HeatPumpConstantEfficiency::new(name, *heat_output, *cop)?),
            ComponentConfig::HeatPumpLorentz(params) => {
                Box::new(HeatPumpLorentz::new(&params.name, &params.params())?)
            }
            ComponentConfig::Inverter { name, efficiency } => {
                Box::new(Inverter::new(name, *efficiency)?)
            }
            ComponentConfig::BalancingUtility { name, port } => {
                Box::new(BalancingUtility::new(name, *port))
            }
            ComponentConfig::ColdWaterGrid { name } => Box::new(ColdWaterGrid::new(name)),
            ComponentConfig::HotWaterStorage { name, tank } => {
                Box::new(HotWaterStorage::new(name, &tank.params())?)
            }
            ComponentConfig::MultiNodeTank {
                name,
                tank,
                layers,
                convection_effect_coefficient,
                main_heat_input,
                aux_heat_input,
            } => Box::new(MultiNodeHotWaterTank::new(
                name,
                &MultiNodeParams {
                    tank: tank.params(),
                    layers: *layers,
                    convection_effect_coefficient: *convection_effect_coefficient,
                    main_heat_input: *main_heat_input,
                    aux_heat_input: *aux_heat_input,
                },
            )?),
            ComponentConfig::Battery(params) => {
                Box::new(Battery::new(&params.name, params.params())?)
            }
        })
    }
}

/// One sensor, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SensorConfig {
    PortTemperature {
        name: String,
        port: String,
    },
    PortFlow {
        name: String,
        port: String,
        layer: Layer,
    },
    ComponentTemperature {
        name: String,
        component: String,
    },
    StateOfCharge {
        name: String,
        component: String,
    },
}

impl SensorConfig {
    pub fn build(&self) -> Box<dyn Sensor> {
        match self {
            SensorConfig::PortTemperature { name, port } => {
                Box::new(PortTemperatureSensor::new(name, port))
            }
            SensorConfig::PortFlow { name, port, layer } => {
                Box::new(PortFlowSensor::new(name, port, *layer))
            }
            SensorConfig::ComponentTemperature { name, component } => {
                Box::new(ComponentSensor::temperature(name, component))
            }
            SensorConfig::StateOfCharge { name, component } => {
                Box::new(ComponentSensor::state_of_charge(name, component))
            }
        }
    }
}

/// One controller, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ControllerConfig {
    HeaterBandwidth {
        name: String,
        heater: String,
        sensor: String,
        comfort_temperature_c: f64,
        /// K
        bandwidth: f64,
    },
    Inverter {
        name: String,
        inverter: String,
        battery: Option<String>,
        #[serde(default)]
        soc_min: f64,
        #[serde(default = "default_soc_max")]
        soc_max: f64,
    },
}

fn default_soc_max() -> f64 {
    1.0
}

impl ControllerConfig {
    fn validate(&self, field: &str, errors: &mut Vec<ConfigError>) {
        match self {
            ControllerConfig::HeaterBandwidth { bandwidth, .. } => {
                if *bandwidth < 0.0 {
                    errors.push(ConfigError::new(format!("{field}.bandwidth"), "must be >= 0"));
                }
            }
            ControllerConfig::Inverter {
                soc_min, soc_max, ..
            } => {
                if !(0.0 <= *soc_min && soc_min <= soc_max && *soc_max <= 1.0) {
                    errors.push(ConfigError::new(
                        format!("{field}.soc_min"),
                        "must satisfy 0 <= soc_min <= soc_max <= 1",
                    ));
                }
            }
        }
    }

    pub fn build(&self) -> Box<dyn Controller> {
        match self {
            ControllerConfig::HeaterBandwidth {
                name,
                heater,
                sensor,
                comfort_temperature_c,
                bandwidth,
            } => Box::new(HeaterControllerWithBandwidth::new(
                name,
                heater,
                sensor,
                *comfort_temperature_c,
                *bandwidth,
            )),
            ControllerConfig::Inverter {
                name,
                inverter,
                battery,
                soc_min,
                soc_max,
            } => Box::new(InverterController::new(
                name,
                inverter,
                battery.as_deref(),
                *soc_min,
                *soc_max,
            )),
        }
    }
}

/// A connection between two port names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
}

impl ScenarioConfig {
    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid, names an unknown
    /// component type or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Name resolution
    /// (ports, sensors, controlled components) happens when the environment
    /// is built.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.simulation.validate();

        for (i, component) in self.components.iter().enumerate() {
            component.validate(&format!("components[{i}]"), &mut errors);
        }
        for (i, controller) in self.controllers.iter().enumerate() {
            controller.validate(&format!("controllers[{i}]"), &mut errors);
        }
        for (i, conn) in self.connections.iter().enumerate() {
            if conn.from == conn.to {
                errors.push(ConfigError::new(
                    format!("connections[{i}]"),
                    "cannot connect a port to itself",
                ));
            }
        }

        errors
    }

    /// Builds the environment described by this scenario.
    ///
    /// # Errors
    ///
    /// The first component parameter, naming or connection problem found.
    pub fn build_environment(&self) -> Result<Environment, SimError> {
        let components = self
            .components
            .iter()
            .map(ComponentConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        let sensors = self.sensors.iter().map(SensorConfig::build).collect();
        let controllers = self.controllers.iter().map(ControllerConfig::build).collect();
        let connections: Vec<(String, String)> = self
            .connections
            .iter()
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect();
        Environment::new(components, controllers, sensors, &connections)
    }

    /// Validates the scenario and builds a ready-to-run simulator with
    /// constant environmental conditions.
    ///
    /// # Errors
    ///
    /// Every validation error, or the assembly error converted to a
    /// `ConfigError`.
    pub fn build_simulator(&self) -> Result<Simulator, Vec<ConfigError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let env = self
            .build_environment()
            .map_err(|e| vec![ConfigError::from(e)])?;
        Simulator::new(
            env,
            self.simulation.clone(),
            Box::new(ConstantConditions::from(&self.environment)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEATING: &str = r#"
[simulation]
time_start_h = 0.0
time_end_h = 2.0
time_step_h = 0.5

[environment]
ambient_temperature_c = 5.0
cold_water_temperature_c = 10.0

[[components]]
type = "hot_water_demand"
name = "dhw"
profile = { values = [0.5, 0.5] }

[[components]]
type = "multi_node_tank"
name = "tank"
layers = 4
main_heat_input = [0.0, 0.4]
tank = { volume_l = 150.0, initial_temperature_c = 45.0 }

[[components]]
type = "heat_pump_lorentz"
name = "hp"
heat_output = 3.0
cop = 3.5

[[components]]
type = "cold_water_grid"
name = "mains"

[[components]]
type = "balancing_utility"
name = "grid"
port = "electricity"

[[sensors]]
type = "component_temperature"
name = "t_tank"
component = "tank"

[[controllers]]
type = "heater_bandwidth"
name = "ctrl"
heater = "hp"
sensor = "t_tank"
comfort_temperature_c = 50.0
bandwidth = 5.0

[[connections]]
from = "dhw_fluid_port"
to = "tank_hot_water_output_port"

[[connections]]
from = "tank_cold_water_input_port"
to = "mains_fluid_port"

[[connections]]
from = "hp_heat_output_port"
to = "tank_main_heat_input_port"

[[connections]]
from = "hp_electricity_input_port"
to = "grid_electricity_port"
"#;

    #[test]
    fn valid_toml_parses() {
        let cfg = ScenarioConfig::from_toml_str(HEATING);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.components.len()), Some(5));
        assert_eq!(cfg.as_ref().map(|c| c.simulation.time_step_h), Some(0.5));
        assert_eq!(
            cfg.as_ref().map(|c| c.components[1].clone()),
            Some(ComponentConfig::MultiNodeTank {
                name: "tank".to_string(),
                tank: TankConfig {
                    volume_l: 150.0,
                    initial_temperature_c: 45.0,
                    ..TankConfig::default()
                },
                layers: 4,
                convection_effect_coefficient: 1_000.0,
                main_heat_input: Some(HeatInputHeight::Range([0.0, 0.4])),
                aux_heat_input: None,
            })
        );
    }

    #[test]
    fn scenario_builds_and_runs() {
        let cfg = ScenarioConfig::from_toml_str(HEATING).unwrap();
        assert!(cfg.validate().is_empty());
        let mut sim = cfg.build_simulator().unwrap();
        let res = sim.run().unwrap();
        assert_eq!(res.ticks(), 4);
        assert_eq!(res.sensor_readings("t_tank").unwrap().len(), 4);
    }

    #[test]
    fn unknown_component_type_is_rejected() {
        let toml = r#"
[[components]]
type = "fusion_reactor"
name = "sun"
"#;
        let err = ScenarioConfig::from_toml_str(toml).unwrap_err();
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[[components]]
type = "cold_water_grid"
name = "mains"
temperature_c = 12.0
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());

        let toml = r#"
[simulation]
time_step_h = 1.0
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = ScenarioConfig::from_toml_str("[simulation]\ntime_end_h = 48.0\n").unwrap();
        assert_eq!(cfg.simulation.time_end_h, 48.0);
        assert_eq!(cfg.simulation.time_step_h, 0.5);
        assert_eq!(cfg.environment, EnvironmentConfig::default());
        assert!(cfg.components.is_empty());
    }

    #[test]
    fn validation_collects_every_error() {
        let toml = r#"
[simulation]
time_step_h = 0.0

[[components]]
type = "battery"
name = "bat"
initial_soc = 1.5
capacity_kwh = 0.0

[[components]]
type = "multi_node_tank"
name = "tank"
layers = 2

[[controllers]]
type = "inverter"
name = "ctrl"
inverter = "inv"
soc_min = 0.9
soc_max = 0.2
"#;
        let errors = ScenarioConfig::from_toml_str(toml).unwrap().validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"simulation.time_step_h"));
        assert!(fields.contains(&"components[0].initial_soc"));
        assert!(fields.contains(&"components[0].capacity_kwh"));
        assert!(fields.contains(&"components[1].layers"));
        assert!(fields.contains(&"controllers[0].soc_min"));
    }

    #[test]
    fn lithium_ion_battery_takes_chemistry_defaults() {
        let cfg = BatteryConfig {
            chemistry: ChemistryKind::LithiumIon,
            soc_max: Some(0.95),
            ..BatteryConfig::default()
        };
        let params = cfg.params();
        assert_eq!(
            params.chemistry,
            Chemistry::LithiumIon {
                soc_min: 0.3,
                soc_max: 0.95
            }
        );
        assert!(params.self_discharge_rate > 0.0);
    }

    #[test]
    fn lorentz_design_is_exclusive() {
        let cfg = LorentzConfig {
            cop: Some(3.0),
            power_input: Some(1.0),
            ..LorentzConfig::default()
        };
        let mut errors = Vec::new();
        cfg.validate("components[0]", &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn dangling_connection_fails_at_build() {
        let toml = r#"
[[components]]
type = "cold_water_grid"
name = "mains"

[[connections]]
from = "mains_fluid_port"
to = "nowhere_port"
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert!(cfg.validate().is_empty());
        assert_eq!(
            cfg.build_environment().err(),
            Some(SimError::UnknownPort("nowhere_port".to_string()))
        );
    }

    #[test]
    fn zero_profile_step_fails_at_build() {
        let toml = r#"
[[components]]
type = "electricity_demand"
name = "load"
profile = { step_h = 0.0, values = [1.0, 1.0] }
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.validate()[0].field, "components[0].profile.step_h");
        assert!(matches!(
            cfg.build_environment(),
            Err(SimError::InvalidTimeSeries(_))
        ));
    }
}
