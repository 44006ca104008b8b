//! The step engine driving an [`Environment`] tick by tick.

use super::clock::{Clock, Tick};
use super::config::SimulationConfig;
use super::results::SimulationResults;
use super::state::{Diagnostic, EnvironmentalDataSource, SimulationState};
use crate::components::types::Category;
use crate::environment::Environment;
use crate::error::{ConfigError, SimError};

/// Categories stepped before any controller acts.
const UNCONTROLLED: [Category; 2] = [Category::Demand, Category::Producer];
/// Categories stepped after every controller, skipping components a
/// controller already stepped.
const REMAINING: [Category; 3] = [
    Category::Utility,
    Category::StorageUnit,
    Category::BalancingUtility,
];

/// Deterministic step engine.
///
/// Each tick runs, in order: reset, environmental data refresh, inherited
/// port temperatures, demands, producers, every controller (each immediately
/// followed by the components it commands), utilities, storage units,
/// balancing utilities. Every component is stepped exactly once per tick.
pub struct Simulator {
    env: Environment,
    config: SimulationConfig,
    conditions: Box<dyn EnvironmentalDataSource>,
}

impl Simulator {
    /// Creates a simulator after validating the timing.
    ///
    /// # Arguments
    ///
    /// * `env` - Assembled environment
    /// * `config` - Run timing
    /// * `conditions` - Provider of ambient and cold water temperatures
    ///
    /// # Errors
    ///
    /// Every timing problem found, if any.
    pub fn new(
        env: Environment,
        config: SimulationConfig,
        conditions: Box<dyn EnvironmentalDataSource>,
    ) -> Result<Self, Vec<ConfigError>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            env,
            config,
            conditions,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs every tick of the configured horizon.
    ///
    /// Components are re-sampled and initialized first, so a simulator can
    /// be run more than once from the same initial state.
    ///
    /// # Errors
    ///
    /// The first fatal condition raised by a component, a controller or a
    /// post-tick check. The run stops at that tick.
    pub fn run(&mut self) -> Result<SimulationResults, SimError> {
        let mut clock = Clock::new(&self.config);
        let start = self.conditions.at(self.config.time_start_s());
        let mut state = SimulationState::new(&self.config, start);
        self.env.initialize(&state, self.config.time_end_s())?;

        tracing::info!(
            components = self.env.component_count(),
            ports = self.env.ports().len(),
            ticks = clock.total(),
            time_step_s = state.time_step,
            "simulation started"
        );

        let mut results = SimulationResults::new(&self.env, clock.total(), state.time_step);
        while let Some(tick) = clock.tick() {
            self.step(tick, &mut state, &mut results)?;
        }

        tracing::info!(
            ticks = results.ticks(),
            diagnostics = results.diagnostics().len(),
            "simulation finished"
        );
        Ok(results)
    }

    /// Executes one full tick and appends it to `results`.
    fn step(
        &mut self,
        tick: Tick,
        state: &mut SimulationState,
        results: &mut SimulationResults,
    ) -> Result<(), SimError> {
        state.time = tick.time_s;
        state.time_id = tick.index;
        state.environmental_data = self.conditions.at(tick.time_s);
        state.control_actions.clear();
        tracing::debug!(tick = tick.index, time_h = state.time_h(), "tick");

        self.env.reset_tick();
        let mut pending = vec![true; self.env.component_count()];
        let mut diagnostics = Vec::new();

        self.env.apply_inherited_values(state)?;

        for category in UNCONTROLLED {
            self.step_category(category, state, &mut pending, &mut diagnostics)?;
        }

        let mut issued = Vec::with_capacity(self.env.controller_count());
        for idx in 0..self.env.controller_count() {
            let (controller, actions) = self.env.controller_actions(idx, state)?;
            for (component, &action) in &actions {
                let target = self
                    .env
                    .component_index(component)
                    .ok_or_else(|| SimError::UnknownComponent(component.clone()))?;
                if !pending[target] {
                    return Err(SimError::OrderViolation {
                        controller: controller.clone(),
                        component: component.clone(),
                        tick: tick.index,
                    });
                }
                state.control_actions.insert(component.clone(), action);
                self.env.step_component(target, state, action, &mut diagnostics)?;
                pending[target] = false;
            }
            issued.push((controller, actions));
        }

        for category in REMAINING {
            self.step_category(category, state, &mut pending, &mut diagnostics)?;
        }

        let unstepped: Vec<String> = pending
            .iter()
            .enumerate()
            .filter(|(_, p)| **p)
            .map(|(idx, _)| self.env.component_name(idx).to_string())
            .collect();
        if !unstepped.is_empty() {
            return Err(SimError::IncompleteStep {
                tick: tick.index,
                time: tick.time_s,
                pending: unstepped,
            });
        }

        self.env.ports().check_conservation(tick.index)?;

        self.env.clear_sensor_cache();
        let readings = self.env.sensor_readings(state)?;
        results.record(state.time_h(), self.env.ports(), &issued, &readings);
        results.push_diagnostics(diagnostics);
        Ok(())
    }

    /// Steps the still pending components of `category` without action.
    fn step_category(
        &mut self,
        category: Category,
        state: &SimulationState,
        pending: &mut [bool],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), SimError> {
        let indices = self.env.classification().indices(category).to_vec();
        for idx in indices {
            if pending[idx] {
                self.env.step_component(idx, state, None, diagnostics)?;
                pending[idx] = false;
            }
        }
        Ok(())
    }
}
