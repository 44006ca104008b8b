//! Integration tests for the layered hot water tank inside a running
//! environment.

mod common;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use energy_system_sim::components::{Component, ConstantPowerProducer, TankParams};
use energy_system_sim::constants::{WATER, c_to_k};
use energy_system_sim::environment::Environment;
use energy_system_sim::ports::{Layer, PortKind};
use energy_system_sim::sensors::{ComponentSensor, Sensor};
use energy_system_sim::sim::config::{EnvironmentConfig, SimulationConfig};

/// Tank heated by a constant 1.5 kW source on its main heat input.
fn heated_tank(params: TankParams) -> Environment {
    let components: Vec<Box<dyn Component>> = vec![
        Box::new(ConstantPowerProducer::new("heater", PortKind::Heat, 1.5).unwrap()),
        Box::new(common::tank_with("tank", params)),
    ];
    let sensors: Vec<Box<dyn Sensor>> =
        vec![Box::new(ComponentSensor::temperature("t", "tank"))];
    Environment::new(
        components,
        vec![],
        sensors,
        &common::connections(&[("heater_heat_port", "tank_main_heat_input_port")]),
    )
    .unwrap()
}

#[test]
fn heating_raises_mean_temperature_by_delivered_energy() {
    let params = TankParams::default();
    let initial_mean = c_to_k(params.initial_temperature_c) - 0.02;
    let results = common::run(
        heated_tank(params),
        SimulationConfig::new(0.0, 1.0, 0.1),
        &common::default_environment(),
    );

    assert_eq!(results.ticks(), 10);
    let delivered = results.cumulated("tank_main_heat_input_port", Layer::Heat).unwrap();
    assert_abs_diff_eq!(delivered, 5_400.0, epsilon = 1e-6);

    // 1.5 kW for 1 h into 200 l of water
    let expected = 5_400.0 / (0.2 * WATER.rho * WATER.cp);
    assert_abs_diff_eq!(expected, 6.46, epsilon = 0.01);

    let readings = results.sensor_readings("t").unwrap();
    let rise = readings[readings.len() - 1] - initial_mean;
    assert_abs_diff_eq!(rise, expected, epsilon = 1.0);
    assert!(rise < expected);
    assert!(results.diagnostics().is_empty());
}

#[test]
fn lossless_tank_stores_exactly_what_it_receives() {
    let params = TankParams {
        loss_coefficient: 0.0,
        ..TankParams::default()
    };
    let initial_mean = c_to_k(params.initial_temperature_c) - 0.02;
    let results = common::run(
        heated_tank(params),
        SimulationConfig::new(0.0, 1.0, 0.1),
        &common::default_environment(),
    );
    let readings = results.sensor_readings("t").unwrap();
    let stored = (readings[readings.len() - 1] - initial_mean) * 0.2 * WATER.rho * WATER.cp;
    assert_abs_diff_eq!(stored, 5_400.0, epsilon = 1.0);
}

fn cooling_run(time_step_h: f64, hours: f64) -> Vec<f64> {
    let environment = EnvironmentConfig {
        ambient_temperature_c: 20.0,
        ..EnvironmentConfig::default()
    };
    let results = common::run(
        common::cooling_tank(60.0),
        SimulationConfig::new(0.0, hours, time_step_h),
        &environment,
    );
    results.sensor_readings("t").unwrap()
}

#[rstest]
#[case(0.1)]
#[case(1.0)]
fn idle_tank_cools_monotonically_towards_ambient(#[case] time_step_h: f64) {
    let readings = cooling_run(time_step_h, 48.0);
    let ambient = c_to_k(20.0);

    assert!(readings.windows(2).all(|w| w[1] <= w[0]));
    assert!(readings.iter().all(|t| *t > ambient));
    assert!(readings[0] < c_to_k(60.0));
    assert!(readings[readings.len() - 1] < c_to_k(55.0));
}

#[test]
fn cooling_is_consistent_across_tick_lengths() {
    let fine = cooling_run(0.1, 48.0);
    let coarse = cooling_run(1.0, 48.0);
    assert_eq!(fine.len(), 480);
    assert_eq!(coarse.len(), 48);
    assert_abs_diff_eq!(fine[fine.len() - 1], coarse[coarse.len() - 1], epsilon = 0.2);
}

#[test]
fn cold_water_drawn_is_replaced_from_the_mains() {
    let results = common::run(
        common::dhw_system(),
        SimulationConfig::new(0.0, 24.0, 0.25),
        &common::default_environment(),
    );
    let drawn = results.cumulated("dhw_fluid_port", Layer::Mass).unwrap();
    let supplied = results.cumulated("mains_fluid_port", Layer::Mass).unwrap();
    assert!(drawn > 0.0);
    assert_abs_diff_eq!(drawn, -supplied, epsilon = 1e-6 * drawn);
}
