//! Demands, producers, conversion units and storage connected through ports.

/// Hot water and electricity consumption profiles.
pub mod demands;
/// On/off heat pumps with constant or Lorentz efficiency.
pub mod heat_pumps;
/// Profile-driven and constant producers.
pub mod producers;
/// Perfectly mixed hot water tank and electric battery.
pub mod storage;
/// Layered hot water tank with an implicit tridiagonal solve.
pub mod stratified_tank;
pub mod types;
/// Dispatchable utilities, inverter and balancing connections.
pub mod utilities;

// Re-export the main types for convenience
pub use demands::{ElectricityDemand, HotWaterDemand};
pub use heat_pumps::{HeatPumpConstantEfficiency, HeatPumpLorentz, LorentzDesign, LorentzParams};
pub use producers::{ConstantPowerProducer, PvPanel};
pub use storage::{Battery, BatteryParams, Chemistry, HotWaterStorage, TankGeometry, TankParams};
pub use stratified_tank::{HeatInputHeight, MultiNodeHotWaterTank, MultiNodeParams};
pub use types::{Category, Component, InheritedValue, Quantity, StepContext};
pub use utilities::{
    BalancingUtility, ColdWaterGrid, GenericUtility, Inverter, SimplifiedHeatSource,
    UtilityDirection,
};
