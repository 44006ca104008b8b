//! End-to-end runs of complete heat and electricity systems.

mod common;

use std::path::Path;

use approx::assert_abs_diff_eq;

use energy_system_sim::ScenarioConfig;
use energy_system_sim::constants::c_to_k;
use energy_system_sim::ports::Layer;
use energy_system_sim::sim::config::SimulationConfig;
use energy_system_sim::sim::{EnergyUnit, SignFilter};

#[test]
fn heat_pump_keeps_tank_in_comfort_band() {
    let results = common::run(
        common::dhw_system(),
        SimulationConfig::new(0.0, 24.0, 0.25),
        &common::default_environment(),
    );
    assert_eq!(results.ticks(), 96);

    let actions = results.controller_actions("hp_ctrl", "hp").unwrap();
    assert!(actions.iter().all(|a| *a == 0.0 || *a == 1.0));
    // starts at 40 °C, below comfort
    assert_eq!(actions[0], 1.0);
    assert!(actions.contains(&0.0));

    let temperatures = results.sensor_readings("tank_temperature").unwrap();
    assert!(temperatures.iter().all(|t| *t > c_to_k(15.0) && *t < c_to_k(80.0)));
    // once charged the band holds within one tick of heating or drawing
    let last_half = &temperatures[48..];
    assert!(last_half.iter().all(|t| *t > c_to_k(44.0) && *t < c_to_k(59.0)));
}

#[test]
fn heat_pump_converts_grid_electricity_at_its_cop() {
    let results = common::run(
        common::dhw_system(),
        SimulationConfig::new(0.0, 24.0, 0.25),
        &common::default_environment(),
    );
    let heat = results.port_flow("hp_heat_output_port", Layer::Heat).unwrap();
    let power = results
        .port_flow("hp_electricity_input_port", Layer::Electricity)
        .unwrap();
    for (q, p) in heat.iter().zip(&power) {
        assert!(*q <= 0.0);
        assert!(*p >= 0.0);
        if *p > 0.0 {
            let cop = -q / p;
            assert!(cop > 1.0 && cop < 10.0, "cop {cop}");
        }
    }

    let consumed = results
        .cumulated_electricity("hp_electricity_input_port", EnergyUnit::KWh, SignFilter::Net)
        .unwrap();
    let supplied = results
        .cumulated_electricity("grid_electricity_port", EnergyUnit::KWh, SignFilter::OnlyNegative)
        .unwrap();
    assert!(consumed > 0.0);
    assert_abs_diff_eq!(consumed, -supplied, epsilon = 1e-9);
}

#[test]
fn battery_shifts_pv_surplus_within_its_window() {
    let results = common::run(
        common::pv_battery_system(),
        SimulationConfig::new(0.0, 24.0, 0.5),
        &common::default_environment(),
    );
    let soc = results.sensor_readings("soc").unwrap();
    // discharge losses may carry the last tick slightly below the window
    assert!(soc.iter().all(|s| *s >= 0.29 && *s <= 0.9 + 1e-9));
    assert!(soc.iter().cloned().fold(f64::INFINITY, f64::min) < 0.31);

    // night: battery discharges, midday: it charges
    assert!(soc[10] < 0.5);
    let noon = 25;
    assert!(soc[noon] > soc[noon - 4]);

    let battery = results.port_flow("bat_electricity_port", Layer::Electricity).unwrap();
    assert!(battery.iter().any(|f| *f > 0.0));
    assert!(battery.iter().any(|f| *f < 0.0));

    let exchange = results.controller_actions("inv_ctrl", "inv").unwrap();
    assert_eq!(exchange.len(), 48);
    let battery_action = results.controller_actions("inv_ctrl", "bat").unwrap();
    assert!(battery_action.iter().all(|a| a.is_nan()));
}

#[test]
fn grid_covers_what_pv_and_battery_cannot() {
    let results = common::run(
        common::pv_battery_system(),
        SimulationConfig::new(0.0, 24.0, 0.5),
        &common::default_environment(),
    );
    let imported = results
        .cumulated_electricity("inv_grid_input_port", EnergyUnit::KWh, SignFilter::OnlyPositive)
        .unwrap();
    let load = -results
        .cumulated_electricity("inv_output_port", EnergyUnit::KWh, SignFilter::Net)
        .unwrap();
    assert_abs_diff_eq!(load, 0.6 * 24.0, epsilon = 1e-9);
    assert!(imported >= 0.0);
    assert!(imported < load);
}

#[test]
fn scenario_file_runs_end_to_end() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/dhw_heat_pump.toml");
    let cfg = ScenarioConfig::from_toml_file(&path).unwrap();
    assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());

    let mut sim = cfg.build_simulator().unwrap();
    let results = sim.run().unwrap();
    assert_eq!(results.ticks(), 96);
    assert_eq!(results.time_h()[4], 1.0);

    let hp_power = results.sensor_readings("hp_power").unwrap();
    let consumed: f64 = hp_power.iter().map(|p| p * results.time_step()).sum();
    let cumulated = results
        .cumulated("hp_electricity_input_port", Layer::Electricity)
        .unwrap();
    assert_abs_diff_eq!(consumed, cumulated, epsilon = 1e-6);
    assert!(
        results
            .port_temperature("tank_hot_water_output_port")
            .unwrap()
            .iter()
            .all(|t| t.is_finite())
    );
}

#[test]
fn missing_scenario_file_is_a_config_error() {
    let err = ScenarioConfig::from_toml_file(Path::new("does/not/exist.toml")).unwrap_err();
    assert_eq!(err.field, "scenario");
}
