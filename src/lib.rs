//! Tick-based simulator for small heat, water and electricity systems.

pub mod components;
pub mod constants;
pub mod controllers;
pub mod environment;
pub mod error;
pub mod ports;
pub mod scenario;
pub mod sensors;
/// Step engine, timing, state and results.
pub mod sim;
pub mod solvers;
pub mod timeseries;

pub use environment::Environment;
pub use error::{ConfigError, SimError};
pub use scenario::ScenarioConfig;
pub use sim::{SimulationResults, Simulator};
