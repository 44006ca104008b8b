//! On/off air-to-water heat pumps.
//!
//! Both models deliver heat on `{name}_heat_output_port` and draw
//! electricity on `{name}_electricity_input_port`. They only accept the
//! actions `0` and `1`.

use crate::components::types::{Category, Component, Quantity, StepContext};
use crate::components::utilities::{HeatSourcePorts, on_off_action};
use crate::constants::c_to_k;
use crate::error::SimError;
use crate::ports::PortSpec;

/// Heat pump with a fixed heat output and a fixed COP.
#[derive(Debug, Clone)]
pub struct HeatPumpConstantEfficiency {
    name: String,
    ports: HeatSourcePorts,
    /// Heat output when on (kW).
    heat_output: f64,
    cop: f64,
}

impl HeatPumpConstantEfficiency {
    pub fn new(name: &str, heat_output: f64, cop: f64) -> Result<Self, SimError> {
        if !(cop > 0.0) {
            return Err(SimError::invalid_parameter(name, "COP must be > 0"));
        }
        Ok(Self {
            name: name.to_string(),
            ports: HeatSourcePorts::new(name),
            heat_output,
            cop,
        })
    }

    pub fn heat_port_name(&self) -> &str {
        &self.ports.heat_output
    }

    pub fn power_port_name(&self) -> &str {
        &self.ports.power_input
    }
}

impl Component for HeatPumpConstantEfficiency {
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
        self.ports.write(ctx, self.heat_output, self.cop, action)
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Efficiency => Some(self.cop),
            _ => None,
        }
    }
}

/// How the design point of a [`HeatPumpLorentz`] is specified. Exactly one
/// of the three is needed; the other two follow from the heat output and
/// the Carnot COP at design conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LorentzDesign {
    /// Electric input at design conditions (kW).
    PowerInput(f64),
    /// COP at design conditions (-).
    Cop(f64),
    /// Second-law (Lorentz) efficiency (-).
    Efficiency(f64),
}

/// Parameters of a [`HeatPumpLorentz`]. Temperatures in °C.
#[derive(Debug, Clone, PartialEq)]
pub struct LorentzParams {
    /// Heat output at design conditions (kW).
    pub heat_output: f64,
    pub design: LorentzDesign,
    pub air_design_temperature_c: f64,
    pub water_design_temperature_c: f64,
    /// Approach between ambient air and evaporation (K).
    pub delta_t_air: f64,
    /// Approach between stored water and condensation (K).
    pub delta_t_water: f64,
    /// Fraction of heat output lost per K of extra lift over design (1/K).
    pub heat_capacity_loss: f64,
}

impl Default for LorentzParams {
    fn default() -> Self {
        Self {
            heat_output: 2.0,
            design: LorentzDesign::Cop(3.0),
            air_design_temperature_c: 7.0,
            water_design_temperature_c: 40.0,
            delta_t_air: 5.0,
            delta_t_water: 5.0,
            heat_capacity_loss: 0.0,
        }
    }
}

/// Heat pump with a constant second-law efficiency.
///
/// The COP follows the Carnot COP between the ambient air and the
/// temperature seen on the heat output port:
///
/// ```text
/// COP = η · (T_w + ΔT_w) / (T_w − T_a + ΔT_a + ΔT_w)
/// ```
///
/// With a nonzero capacity loss, heat output drops linearly with the
/// temperature lift above the design lift.
#[derive(Debug, Clone)]
pub struct HeatPumpLorentz {
    name: String,
    ports: HeatSourcePorts,
    heat_output: f64,
    eta_lorentz: f64,
    air_design: f64,
    water_design: f64,
    delta_t_air: f64,
    delta_t_water: f64,
    heat_capacity_loss: f64,
    last_cop: Option<f64>,
}

impl HeatPumpLorentz {
    pub fn new(name: &str, params: &LorentzParams) -> Result<Self, SimError> {
        let air_design = c_to_k(params.air_design_temperature_c);
        let water_design = c_to_k(params.water_design_temperature_c);
        let carnot = carnot_cop(
            air_design,
            water_design,
            params.delta_t_air,
            params.delta_t_water,
        );
        if !(carnot > 0.0 && carnot.is_finite()) {
            return Err(SimError::invalid_parameter(
                name,
                "design temperatures give a non-positive Carnot COP",
            ));
        }
        let eta_lorentz = match params.design {
            LorentzDesign::PowerInput(w) if w > 0.0 => params.heat_output / w / carnot,
            LorentzDesign::Cop(cop) if cop > 0.0 => cop / carnot,
            LorentzDesign::Efficiency(eta) if eta > 0.0 => eta,
            _ => {
                return Err(SimError::invalid_parameter(
                    name,
                    "design power, COP or efficiency must be > 0",
                ));
            }
        };
        Ok(Self {
            name: name.to_string(),
            ports: HeatSourcePorts::new(name),
            heat_output: params.heat_output,
            eta_lorentz,
            air_design,
            water_design,
            delta_t_air: params.delta_t_air,
            delta_t_water: params.delta_t_water,
            heat_capacity_loss: params.heat_capacity_loss,
            last_cop: None,
        })
    }

    pub fn heat_port_name(&self) -> &str {
        &self.ports.heat_output
    }

    pub fn power_port_name(&self) -> &str {
        &self.ports.power_input
    }

    pub fn eta_lorentz(&self) -> f64 {
        self.eta_lorentz
    }

    /// COP at the given air and water temperatures (K).
    pub fn cop(&self, t_air: f64, t_water: f64) -> f64 {
        self.eta_lorentz * carnot_cop(t_air, t_water, self.delta_t_air, self.delta_t_water)
    }

    /// Heat output (kW) at the given air and water temperatures (K).
    pub fn heat_output(&self, t_air: f64, t_water: f64) -> f64 {
        if self.heat_capacity_loss == 0.0 {
            return self.heat_output;
        }
        let extra_lift = (t_water - t_air) - (self.water_design - self.air_design);
        self.heat_output * (1.0 - self.heat_capacity_loss * extra_lift)
    }
}

fn carnot_cop(t_air: f64, t_water: f64, delta_t_air: f64, delta_t_water: f64) -> f64 {
    (t_water + delta_t_water) / (t_water - t_air + delta_t_air + delta_t_water)
}

impl Component for HeatPumpLorentz {
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
        let t_air = ctx.environmental_data().ambient_temperature;
        let t_water = ctx
            .temperature(&self.ports.heat_output)?
            .unwrap_or(self.water_design);
        let cop = self.cop(t_air, t_water);
        if !(cop > 0.0 && cop.is_finite()) {
            return Err(SimError::invalid_parameter(
                &self.name,
                format!("COP {cop} at air {t_air} K and water {t_water} K"),
            ));
        }
        self.last_cop = Some(cop);
        let heat = self.heat_output(t_air, t_water).max(0.0);
        self.ports.write(ctx, heat, cop, action)
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Efficiency => self.last_cop,
            _ => None,
        }
    }
}
