//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use energy_system_sim::components::{
    BalancingUtility, Battery, BatteryParams, ColdWaterGrid, Component, ElectricityDemand,
    HeatInputHeight, HeatPumpLorentz, HotWaterDemand, Inverter, LorentzParams,
    MultiNodeHotWaterTank, MultiNodeParams, PvPanel, TankParams,
};
use energy_system_sim::controllers::{
    Controller, HeaterControllerWithBandwidth, InverterController,
};
use energy_system_sim::environment::Environment;
use energy_system_sim::ports::PortKind;
use energy_system_sim::sensors::{ComponentSensor, Sensor};
use energy_system_sim::sim::config::{EnvironmentConfig, SimulationConfig};
use energy_system_sim::sim::state::ConstantConditions;
use energy_system_sim::sim::{SimulationResults, Simulator};
use energy_system_sim::timeseries::TimeSeries;

/// Port pairs as expected by [`Environment::new`].
pub fn connections(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

/// Default conditions (20 °C ambient, 15 °C cold water).
pub fn default_environment() -> EnvironmentConfig {
    EnvironmentConfig::default()
}

/// Runs `env` over `config` under constant conditions.
pub fn run(
    env: Environment,
    config: SimulationConfig,
    environment: &EnvironmentConfig,
) -> SimulationResults {
    let mut sim = Simulator::new(
        env,
        config,
        Box::new(ConstantConditions::from(environment)),
    )
    .expect("valid timing");
    sim.run().expect("run succeeds")
}

/// A 200 l layered tank with its main heat input over the bottom 30 cm.
pub fn default_tank(name: &str) -> MultiNodeHotWaterTank {
    tank_with(name, TankParams::default())
}

pub fn tank_with(name: &str, tank: TankParams) -> MultiNodeHotWaterTank {
    MultiNodeHotWaterTank::new(
        name,
        &MultiNodeParams {
            tank,
            main_heat_input: Some(HeatInputHeight::Range([0.0, 0.3])),
            ..MultiNodeParams::default()
        },
    )
    .expect("valid tank")
}

/// Morning and evening hot water draws over one day (kWh per hour).
pub fn daily_draw_profile() -> TimeSeries {
    let mut values = vec![0.0; 24];
    values[7] = 1.5;
    values[8] = 0.8;
    values[12] = 0.4;
    values[19] = 1.2;
    values[20] = 0.6;
    TimeSeries::new(1.0, values).unwrap()
}

/// Domestic hot water system: a draw profile served by a layered tank that
/// a Lorentz heat pump keeps between 50 and 55 °C, with mains water and an
/// electricity grid balancing the rest.
pub fn dhw_system() -> Environment {
    let components: Vec<Box<dyn Component>> = vec![
        Box::new(HotWaterDemand::new("dhw", 45.0, daily_draw_profile())),
        Box::new(default_tank("tank")),
        Box::new(
            HeatPumpLorentz::new(
                "hp",
                &LorentzParams {
                    heat_output: 2.5,
                    ..LorentzParams::default()
                },
            )
            .expect("valid heat pump"),
        ),
        Box::new(ColdWaterGrid::new("mains")),
        Box::new(BalancingUtility::new("grid", PortKind::Electricity)),
    ];
    let sensors: Vec<Box<dyn Sensor>> = vec![Box::new(ComponentSensor::temperature(
        "tank_temperature",
        "tank",
    ))];
    let controllers: Vec<Box<dyn Controller>> = vec![Box::new(
        HeaterControllerWithBandwidth::new("hp_ctrl", "hp", "tank_temperature", 50.0, 5.0),
    )];
    Environment::new(
        components,
        controllers,
        sensors,
        &connections(&[
            ("dhw_fluid_port", "tank_hot_water_output_port"),
            ("tank_cold_water_input_port", "mains_fluid_port"),
            ("hp_heat_output_port", "tank_main_heat_input_port"),
            ("hp_electricity_input_port", "grid_electricity_port"),
        ]),
    )
    .expect("valid dhw system")
}

/// Bell-shaped PV capacity factor over one day.
pub fn pv_profile() -> TimeSeries {
    let values = (0..24)
        .map(|h| {
            let x = (h as f64 - 12.5) / 4.0;
            if x.abs() < 1.5 { (1.0 - (x / 1.5).powi(2)) * 0.8 } else { 0.0 }
        })
        .collect();
    TimeSeries::new(1.0, values).unwrap()
}

/// House load behind a PV inverter with a lithium-ion battery.
pub fn pv_battery_system() -> Environment {
    let components: Vec<Box<dyn Component>> = vec![
        Box::new(ElectricityDemand::new(
            "house",
            TimeSeries::new(1.0, vec![0.6; 24]).unwrap(),
        )),
        Box::new(PvPanel::new("pv", 4.0, pv_profile()).expect("valid pv")),
        Box::new(Inverter::new("inv", 0.96).expect("valid inverter")),
        Box::new(Battery::new("bat", BatteryParams::lithium_ion(10.0)).expect("valid battery")),
        Box::new(BalancingUtility::new("grid", PortKind::Electricity)),
    ];
    let sensors: Vec<Box<dyn Sensor>> =
        vec![Box::new(ComponentSensor::state_of_charge("soc", "bat"))];
    let controllers: Vec<Box<dyn Controller>> = vec![Box::new(InverterController::new(
        "inv_ctrl",
        "inv",
        Some("bat"),
        0.3,
        0.9,
    ))];
    Environment::new(
        components,
        controllers,
        sensors,
        &connections(&[
            ("pv_electricity_port", "inv_pv_input_port"),
            ("house_electricity_port", "inv_output_port"),
            ("inv_ess_port", "bat_electricity_port"),
            ("inv_grid_input_port", "grid_electricity_port"),
        ]),
    )
    .expect("valid pv system")
}

/// A lone tank losing heat to the ambient air.
pub fn cooling_tank(initial_temperature_c: f64) -> Environment {
    let tank = tank_with(
        "tank",
        TankParams {
            initial_temperature_c,
            located_inside: false,
            ..TankParams::default()
        },
    );
    let sensors: Vec<Box<dyn Sensor>> =
        vec![Box::new(ComponentSensor::temperature("t", "tank"))];
    Environment::new(vec![Box::new(tank)], vec![], sensors, &[]).expect("valid tank")
}
