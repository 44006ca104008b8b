/// Simulation clock for tick management.
pub mod clock;
/// Run timing and ambient conditions.
pub mod config;
pub mod results;
pub mod simulator;
pub mod state;

pub use results::{EnergyUnit, SignFilter, SimulationResults};
pub use simulator::Simulator;
