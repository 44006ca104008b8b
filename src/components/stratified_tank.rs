//! Stratified hot water tank discretized into perfectly mixed layers.
//!
//! Layer 0 is the top of the tank and layer `N - 1` the bottom. Cold water
//! enters the bottom layer and hot water leaves the top one. Each tick the
//! layer temperatures are advanced with an implicit scheme:
//!
//! ```text
//! A · T_new = (m·cp/Δt) · T_old + c
//! ```
//!
//! where `A` is tridiagonal and couples each layer to its neighbours through
//! conduction and upward advection, and `c` collects ambient losses, heat
//! injection and the cold water inflow. Conduction across an interface is
//! multiplied by a convection factor when the lower layer is hotter than the
//! upper one. `A` only changes when that pattern or the mass flow changes,
//! so its factorization is kept between ticks.

use serde::Deserialize;

use crate::components::storage::{TankGeometry, TankParams, TankPorts, check_soc};
use crate::components::types::{Category, Component, InheritedValue, Quantity, StepContext};
use crate::constants::{WATER, c_to_k};
use crate::error::SimError;
use crate::ports::{Layer, PortSpec};
use crate::sim::state::SimulationState;
use crate::solvers::{Tridiagonal, TridiagonalFactorization};

/// Outlet mass flow difference (kg/s) still solved with the cached matrix.
///
/// Kept at round-off scale: a reused factorization must give the same
/// temperatures as a freshly assembled one.
const MASS_FLOW_TOLERANCE: f64 = 1e-12;

/// Where a heat source injects into the tank, measured from the bottom (m).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HeatInputHeight {
    /// All heat goes to the layer containing this height.
    At(f64),
    /// Heat is spread over `[low, high]` in proportion to layer overlap.
    Range([f64; 2]),
}

/// Parameters of a [`MultiNodeHotWaterTank`].
#[derive(Debug, Clone, PartialEq)]
pub struct MultiNodeParams {
    pub tank: TankParams,
    pub layers: usize,
    /// Conductivity multiplier on unstable interfaces (-).
    pub convection_effect_coefficient: f64,
    /// Defaults to the bottom layer.
    pub main_heat_input: Option<HeatInputHeight>,
    /// Defaults to the bottom layer.
    pub aux_heat_input: Option<HeatInputHeight>,
}

impl Default for MultiNodeParams {
    fn default() -> Self {
        Self {
            tank: TankParams::default(),
            layers: 5,
            convection_effect_coefficient: 1_000.0,
            main_heat_input: None,
            aux_heat_input: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiNodeHotWaterTank {
    name: String,
    ports: TankPorts,
    geometry: TankGeometry,
    n: usize,
    layer_height: f64,
    layer_mass: f64,
    /// Surface exchanging heat with the surroundings, per layer (m²).
    loss_surface: Vec<f64>,
    loss_coefficient: f64,
    convection_effect_coefficient: f64,
    located_inside: bool,
    indoor_temperature: f64,
    max_temperature: f64,
    initial_temperature: f64,
    /// Share of the main heat input per layer; sums to one.
    main_heat_split: Vec<f64>,
    aux_heat_split: Vec<f64>,

    temperatures: Vec<f64>,
    /// `unstable[j]` flags interface `j` (between layers `j - 1` and `j`)
    /// as hotter below than above. Entries 0 and N are always false.
    unstable: Vec<bool>,
    /// Outlet mass flow (kg/s) the cached factorization was assembled with.
    matrix_mass_flow: f64,
    factorization: Option<TridiagonalFactorization>,
    matrix_rebuilds: usize,
    soc: f64,
}

impl MultiNodeHotWaterTank {
    pub fn new(name: &str, params: &MultiNodeParams) -> Result<Self, SimError> {
        params.tank.validate(name)?;
        if params.layers < 3 {
            return Err(SimError::invalid_parameter(name, "at least 3 layers are needed"));
        }
        if !(params.convection_effect_coefficient >= 1.0) {
            return Err(SimError::invalid_parameter(
                name,
                "convection effect coefficient must be >= 1",
            ));
        }
        let n = params.layers;
        let geometry = TankGeometry::new(params.tank.volume_l, params.tank.height_m);
        let layer_height = geometry.height / n as f64;

        let mut loss_surface = vec![geometry.lateral_surface / n as f64; n];
        loss_surface[0] += geometry.cross_section;
        loss_surface[n - 1] += geometry.cross_section;

        let main_heat_split = heat_split(name, params.main_heat_input, n, geometry.height)?;
        let aux_heat_split = heat_split(name, params.aux_heat_input, n, geometry.height)?;
        let initial_temperature = c_to_k(params.tank.initial_temperature_c);

        let mut tank = Self {
            name: name.to_string(),
            ports: TankPorts::new(name),
            geometry,
            n,
            layer_height,
            layer_mass: geometry.mass() / n as f64,
            loss_surface,
            loss_coefficient: params.tank.loss_coefficient,
            convection_effect_coefficient: params.convection_effect_coefficient,
            located_inside: params.tank.located_inside,
            indoor_temperature: c_to_k(params.tank.indoor_temperature_c),
            max_temperature: c_to_k(params.tank.max_temperature_c),
            initial_temperature,
            main_heat_split,
            aux_heat_split,
            temperatures: Vec::new(),
            unstable: Vec::new(),
            matrix_mass_flow: 0.0,
            factorization: None,
            matrix_rebuilds: 0,
            soc: 0.0,
        };
        tank.reset();
        Ok(tank)
    }

    fn reset(&mut self) {
        // slight initial stratification so the top starts hottest
        self.temperatures = (0..self.n)
            .map(|i| self.initial_temperature - 0.01 * i as f64)
            .collect();
        self.unstable = vec![false; self.n + 1];
        self.matrix_mass_flow = 0.0;
        self.factorization = None;
        self.matrix_rebuilds = 0;
    }

    pub fn geometry(&self) -> &TankGeometry {
        &self.geometry
    }

    /// Layer temperatures from top to bottom (K).
    pub fn layer_temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    /// Mean temperature (K).
    pub fn mean_temperature(&self) -> f64 {
        self.temperatures.iter().sum::<f64>() / self.n as f64
    }

    pub fn main_heat_split(&self) -> &[f64] {
        &self.main_heat_split
    }

    /// How many times the system matrix was assembled and factorized.
    pub fn matrix_rebuilds(&self) -> usize {
        self.matrix_rebuilds
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

    fn stratification_flags(&self) -> Vec<bool> {
        let mut flags = vec![false; self.n + 1];
        for j in 1..self.n {
            flags[j] = self.temperatures[j] > self.temperatures[j - 1];
        }
        flags
    }

    /// Assembles the system matrix for the current flags and mass flow.
    fn system_matrix(&self, time_step: f64) -> Tridiagonal {
        let n = self.n;
        let area_over_dz = self.geometry.cross_section / self.layer_height;
        // kW/K across each interface; the outer two never conduct
        let conductance: Vec<f64> = (0..=n)
            .map(|j| {
                if j == 0 || j == n {
                    0.0
                } else if self.unstable[j] {
                    WATER.k * self.convection_effect_coefficient * area_over_dz * 1e-3
                } else {
                    WATER.k * area_over_dz * 1e-3
                }
            })
            .collect();
        let capacity_rate = self.layer_mass * WATER.cp / time_step;
        let advection = self.matrix_mass_flow * WATER.cp;

        let diag = (0..n)
            .map(|i| {
                capacity_rate
                    + advection
                    + conductance[i]
                    + conductance[i + 1]
                    + self.loss_coefficient * self.loss_surface[i] * 1e-3
            })
            .collect();
        let lower = (1..n).map(|i| -conductance[i]).collect();
        let upper = (0..n - 1)
            .map(|i| -(advection + conductance[i + 1]))
            .collect();
        Tridiagonal::new(lower, diag, upper)
    }

    fn surroundings(&self, state: &SimulationState) -> f64 {
        if self.located_inside {
            self.indoor_temperature
        } else {
            state.environmental_data.ambient_temperature
        }
    }

    fn soc_at(&self, cold_water_temperature: f64) -> f64 {
        (self.mean_temperature() - cold_water_temperature)
            / (self.max_temperature - cold_water_temperature)
    }
}

/// Splits a heat input over the layers of a tank of height `height`.
fn heat_split(
    name: &str,
    input: Option<HeatInputHeight>,
    n: usize,
    height: f64,
) -> Result<Vec<f64>, SimError> {
    let dz = height / n as f64;
    let mut split = vec![0.0; n];
    match input {
        None => split[n - 1] = 1.0,
        Some(HeatInputHeight::At(h)) => {
            if !(0.0..=height).contains(&h) {
                return Err(SimError::invalid_parameter(
                    name,
                    format!("heat input height {h} m is outside the tank (0 to {height:.3} m)"),
                ));
            }
            let from_bottom = ((h / dz).floor() as usize).min(n - 1);
            split[n - 1 - from_bottom] = 1.0;
        }
        Some(HeatInputHeight::Range([low, high])) => {
            if !(low < high) {
                return Err(SimError::invalid_parameter(
                    name,
                    "heat input range must be increasing",
                ));
            }
            for (i, share) in split.iter_mut().enumerate() {
                let bottom = height - (i + 1) as f64 * dz;
                let top = height - i as f64 * dz;
                *share = (top.min(high) - bottom.max(low)).max(0.0) / dz;
            }
            let total: f64 = split.iter().sum();
            if total <= 0.0 {
                return Err(SimError::invalid_parameter(
                    name,
                    format!("heat input range [{low}, {high}] m does not overlap the tank"),
                ));
            }
            split.iter_mut().for_each(|s| *s /= total);
        }
    }
    Ok(split)
}

impl Component for MultiNodeHotWaterTank {
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
        self.reset();
        self.soc = self.soc_at(state.environmental_data.cold_water_temperature);
        Ok(())
    }

    fn inherited_port_values(&self, _state: &SimulationState) -> Vec<InheritedValue> {
        let heat_port_temperature = self
            .temperatures
            .iter()
            .zip(&self.main_heat_split)
            .filter(|(_, share)| **share > 0.0)
            .map(|(t, _)| *t)
            .fold(f64::NEG_INFINITY, f64::max);
        vec![
            InheritedValue {
                port: self.ports.hot_water_output.clone(),
                temperature: self.temperatures[0],
            },
            InheritedValue {
                port: self.ports.main_heat_input.clone(),
                temperature: heat_port_temperature,
            },
        ]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>, _action: Option<f64>) -> Result<(), SimError> {
        let dt = ctx.time_step();
        let env = *ctx.environmental_data();

        let mass_flow = -ctx.flow(&self.ports.hot_water_output, Layer::Mass)? / dt;
        let flow_changed = (mass_flow - self.matrix_mass_flow).abs() > MASS_FLOW_TOLERANCE;

        let flags = self.stratification_flags();
        let rebuild = flow_changed || flags != self.unstable;
        let factorization = match self.factorization.take() {
            Some(factorization) if !rebuild => factorization,
            _ => {
                self.unstable = flags;
                self.matrix_mass_flow = mass_flow;
                self.matrix_rebuilds += 1;
                tracing::debug!(
                    component = %self.name,
                    tick = ctx.state.time_id,
                    mass_flow,
                    "rebuilding tank system matrix"
                );
                self.system_matrix(dt).factorize()?
            }
        };

        let t_cold = ctx
            .temperature(&self.ports.cold_water_input)?
            .unwrap_or(env.cold_water_temperature);
        let t_surroundings = self.surroundings(ctx.state);
        let main_heat = ctx.flow(&self.ports.main_heat_input, Layer::Heat)? / dt;
        let aux_heat = ctx.flow(&self.ports.aux_heat_input, Layer::Heat)? / dt;
        let capacity_rate = self.layer_mass * WATER.cp / dt;

        let mut rhs: Vec<f64> = (0..self.n)
            .map(|i| {
                capacity_rate * self.temperatures[i]
                    + self.loss_coefficient * self.loss_surface[i] * t_surroundings * 1e-3
                    + main_heat * self.main_heat_split[i]
                    + aux_heat * self.aux_heat_split[i]
            })
            .collect();
        rhs[self.n - 1] += self.matrix_mass_flow * WATER.cp * t_cold;

        self.temperatures = factorization.solve(&rhs);
        self.factorization = Some(factorization);

        self.soc = self.soc_at(env.cold_water_temperature);
        check_soc(ctx, self.soc, 0.0, 1.0);

        ctx.set_flow(
            &self.ports.cold_water_input,
            Layer::Mass,
            self.matrix_mass_flow * dt,
        )?;
        ctx.set_flow(
            &self.ports.cold_water_input,
            Layer::Heat,
            self.matrix_mass_flow * WATER.cp * t_cold * dt,
        )
    }

    fn quantity(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Temperature => Some(self.mean_temperature()),
            Quantity::StateOfCharge => Some(self.soc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::types::testing::Harness;
    use crate::constants::k_to_c;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rstest::rstest;

    fn tank(params: MultiNodeParams) -> (MultiNodeHotWaterTank, Harness) {
        let mut tank = MultiNodeHotWaterTank::new("tank", &params).unwrap();
        let h = Harness::new(&tank, 0.1);
        tank.initialize(&h.state).unwrap();
        (tank, h)
    }

    fn adiabatic() -> MultiNodeParams {
        MultiNodeParams {
            tank: TankParams {
                loss_coefficient: 0.0,
                ..TankParams::default()
            },
            ..MultiNodeParams::default()
        }
    }

    #[test]
    fn initial_profile_is_slightly_stratified() {
        let (tank, _) = tank(MultiNodeParams::default());
        let t = tank.layer_temperatures();
        assert_eq!(t.len(), 5);
        assert!(t.windows(2).all(|w| w[0] > w[1]));
        assert_abs_diff_eq!(k_to_c(t[0]), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_layers_are_rejected() {
        let params = MultiNodeParams {
            layers: 2,
            ..MultiNodeParams::default()
        };
        assert!(MultiNodeHotWaterTank::new("tank", &params).is_err());
    }

    #[test]
    fn single_height_picks_one_layer() {
        let params = MultiNodeParams {
            main_heat_input: Some(HeatInputHeight::At(0.0)),
            ..MultiNodeParams::default()
        };
        let tank = MultiNodeHotWaterTank::new("tank", &params).unwrap();
        assert_eq!(tank.main_heat_split(), &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn height_range_is_split_by_overlap() {
        let (tank, _) = tank(MultiNodeParams::default());
        let h = tank.geometry().height;
        let dz = h / 5.0;
        // half of layer 4, all of layer 3
        let split = heat_split("tank", Some(HeatInputHeight::Range([0.5 * dz, 2.0 * dz])), 5, h)
            .unwrap();
        assert_abs_diff_eq!(split[4], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(split[3], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(split.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[rstest]
    #[case(HeatInputHeight::At(-0.1))]
    #[case(HeatInputHeight::Range([0.5, 0.2]))]
    #[case(HeatInputHeight::Range([5.0, 6.0]))]
    fn bad_heat_input_is_rejected(#[case] input: HeatInputHeight) {
        let params = MultiNodeParams {
            main_heat_input: Some(input),
            ..MultiNodeParams::default()
        };
        assert!(MultiNodeHotWaterTank::new("tank", &params).is_err());
    }

    #[test]
    fn heating_conserves_energy_without_losses() {
        let (mut tank, mut h) = tank(adiabatic());
        let start = tank.mean_temperature();
        for _ in 0..10 {
            h.set_flow("tank_main_heat_input_port", Layer::Heat, 1.5 * 360.0);
            h.step(&mut tank, None).unwrap();
            h.advance();
        }
        let mass = tank.geometry().mass();
        let expected = start + 1.5 * 3600.0 / (mass * WATER.cp);
        assert_relative_eq!(tank.mean_temperature(), expected, max_relative = 1e-9);
    }

    #[test]
    fn bottom_heating_mixes_upward() {
        let (mut tank, mut h) = tank(adiabatic());
        for _ in 0..10 {
            h.set_flow("tank_main_heat_input_port", Layer::Heat, 3.0 * 360.0);
            h.step(&mut tank, None).unwrap();
            h.advance();
        }
        let t = tank.layer_temperatures();
        // with convection the heat reaches the top layer
        assert!(t[0] > c_to_k(40.5));
    }

    #[test]
    fn matrix_is_reused_while_nothing_changes() {
        let (mut tank, mut h) = tank(adiabatic());
        for _ in 0..5 {
            h.step(&mut tank, None).unwrap();
            h.advance();
        }
        assert_eq!(tank.matrix_rebuilds(), 1);

        h.set_flow("tank_hot_water_output_port", Layer::Mass, -10.0);
        h.step(&mut tank, None).unwrap();
        assert_eq!(tank.matrix_rebuilds(), 2);
    }

    #[test]
    fn cached_matrix_matches_fresh_assembly_under_slow_ramp() {
        let (mut lazy, mut h_lazy) = tank(adiabatic());
        let (mut fresh, mut h_fresh) = tank(adiabatic());
        // draw grows by 0.9e-4 kg/s per tick, then holds
        let draw = |i: usize| 0.9e-4 * i.min(150) as f64 * 360.0;
        for i in 0..200 {
            h_lazy.set_flow("tank_hot_water_output_port", Layer::Mass, -draw(i));
            h_lazy.step(&mut lazy, None).unwrap();
            h_lazy.advance();

            fresh.factorization = None;
            h_fresh.set_flow("tank_hot_water_output_port", Layer::Mass, -draw(i));
            h_fresh.step(&mut fresh, None).unwrap();
            h_fresh.advance();
        }
        assert!(lazy.matrix_rebuilds() < fresh.matrix_rebuilds());
        assert_eq!(fresh.matrix_rebuilds(), 200);
        for (a, b) in lazy.layer_temperatures().iter().zip(fresh.layer_temperatures()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn draw_is_replaced_with_cold_water() {
        let (mut tank, mut h) = tank(adiabatic());
        h.set_temperature("tank_cold_water_input_port", c_to_k(10.0));
        h.set_flow("tank_hot_water_output_port", Layer::Mass, -20.0);
        h.step(&mut tank, None).unwrap();

        assert_relative_eq!(h.flow("tank_cold_water_input_port", Layer::Mass), 20.0);
        assert_relative_eq!(
            h.flow("tank_cold_water_input_port", Layer::Heat),
            20.0 * WATER.cp * c_to_k(10.0),
            max_relative = 1e-12
        );
        let t = tank.layer_temperatures();
        assert!(t[4] < t[0]);
    }

    #[test]
    fn ports_expose_top_and_heated_layer() {
        let (tank, h) = tank(MultiNodeParams::default());
        let values = tank.inherited_port_values(&h.state);
        let t = tank.layer_temperatures();
        assert_eq!(values[0].port, "tank_hot_water_output_port");
        assert_eq!(values[0].temperature, t[0]);
        assert_eq!(values[1].port, "tank_main_heat_input_port");
        assert_eq!(values[1].temperature, t[4]);
    }

    #[test]
    fn heat_port_reports_hottest_targeted_layer() {
        let (mut tank, h) = tank(MultiNodeParams {
            main_heat_input: Some(HeatInputHeight::Range([0.0, 0.55])),
            ..MultiNodeParams::default()
        });
        let split = tank.main_heat_split().to_vec();
        assert_eq!(split[0], 0.0);
        assert_eq!(split[1], 0.0);
        assert!(split[2..].iter().all(|s| *s > 0.0));

        // the hottest layer overall is not targeted
        tank.temperatures = vec![345.0, 335.0, 318.0, 330.0, 312.0];
        let values = tank.inherited_port_values(&h.state);
        assert_eq!(values[1].port, "tank_main_heat_input_port");
        assert_eq!(values[1].temperature, 330.0);
    }

    #[test]
    fn soc_maps_mean_temperature() {
        let (tank, _) = tank(MultiNodeParams::default());
        let soc = tank.quantity(Quantity::StateOfCharge).unwrap();
        let expected = (tank.mean_temperature() - c_to_k(15.0)) / (80.0 - 15.0);
        assert_relative_eq!(soc, expected, max_relative = 1e-12);
    }
}
