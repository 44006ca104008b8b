//! In-memory result tables and post-hoc aggregation.

use std::fmt;

use indexmap::{Equivalent, IndexMap};

use super::state::Diagnostic;
use crate::constants::SECONDS_PER_HOUR;
use crate::controllers::Actions;
use crate::environment::Environment;
use crate::error::SimError;
use crate::ports::{Layer, PortGraph, PortKind};

/// Secondary key of port temperature columns.
pub const TEMPERATURE_KEY: &str = "temperature";
/// Secondary key of sensor columns.
pub const MEASUREMENT_KEY: &str = "measurement";

/// Column identity: (port, layer), (controller, component) or
/// (sensor, measurement).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub main: String,
    pub secondary: String,
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.main, self.secondary)
    }
}

// Hashes like the derived `Hash` of `SignalKey`, so lookups need no owned key.
impl Equivalent<SignalKey> for (&str, &str) {
    fn equivalent(&self, key: &SignalKey) -> bool {
        self.0 == key.main && self.1 == key.secondary
    }
}

/// Bidirectional mapping between signal keys and table columns.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    columns: IndexMap<SignalKey, usize>,
}

impl SignalRegistry {
    /// Registers a key and returns its column.
    pub fn register(&mut self, main: &str, secondary: &str) -> usize {
        let key = SignalKey {
            main: main.to_string(),
            secondary: secondary.to_string(),
        };
        let next = self.columns.len();
        *self.columns.entry(key).or_insert(next)
    }

    pub fn col_index(&self, main: &str, secondary: &str) -> Option<usize> {
        self.columns.get(&(main, secondary)).copied()
    }

    /// Keys in column order.
    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.columns.keys()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Dense row-major table with one row per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: usize,
    data: Vec<f64>,
}

impl Table {
    fn with_capacity(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            data: Vec::with_capacity(rows * columns),
        }
    }

    fn push_row(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.columns);
        self.data.extend_from_slice(row);
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.data.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.columns..(row + 1) * self.columns]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().skip(col).step_by(self.columns.max(1)).copied()
    }

    /// Raw row-major data.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Unit for [`SimulationResults::cumulated_electricity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyUnit {
    KWh,
    MWh,
}

impl EnergyUnit {
    /// Factor from kJ.
    fn scale(self) -> f64 {
        match self {
            EnergyUnit::KWh => 1.0 / SECONDS_PER_HOUR,
            EnergyUnit::MWh => 1.0 / (SECONDS_PER_HOUR * 1000.0),
        }
    }
}

/// Which flow samples are summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignFilter {
    Net,
    OnlyPositive,
    OnlyNegative,
}

/// Output of a run: port, controller and sensor tables on a shared time axis.
///
/// Port columns hold flow rates (kW, kg/s) and temperatures (K); controller
/// columns hold actions; sensor columns hold readings. Missing values are
/// NaN.
#[derive(Debug, Clone)]
pub struct SimulationResults {
    time_h: Vec<f64>,
    /// s
    time_step: f64,
    port_signals: SignalRegistry,
    controller_signals: SignalRegistry,
    sensor_signals: SignalRegistry,
    ports: Table,
    controllers: Table,
    sensors: Table,
    diagnostics: Vec<Diagnostic>,
}

impl SimulationResults {
    pub(crate) fn new(env: &Environment, ticks: usize, time_step: f64) -> Self {
        let mut port_signals = SignalRegistry::default();
        for (_, port) in env.ports().iter() {
            for layer in port.layers() {
                port_signals.register(port.name(), layer.as_str());
            }
            if port.kind() != PortKind::Electricity {
                port_signals.register(port.name(), TEMPERATURE_KEY);
            }
        }
        let mut controller_signals = SignalRegistry::default();
        for controller in env.controllers() {
            for component in controller.controlled_components() {
                controller_signals.register(controller.name(), component);
            }
        }
        let mut sensor_signals = SignalRegistry::default();
        for sensor in env.sensor_names() {
            sensor_signals.register(sensor, MEASUREMENT_KEY);
        }

        Self {
            time_h: Vec::with_capacity(ticks),
            time_step,
            ports: Table::with_capacity(ticks, port_signals.len()),
            controllers: Table::with_capacity(ticks, controller_signals.len()),
            sensors: Table::with_capacity(ticks, sensor_signals.len()),
            port_signals,
            controller_signals,
            sensor_signals,
            diagnostics: Vec::new(),
        }
    }

    /// Appends one tick.
    pub(crate) fn record(
        &mut self,
        time_h: f64,
        ports: &PortGraph,
        actions: &[(String, Actions)],
        readings: &[Option<f64>],
    ) {
        self.time_h.push(time_h);

        let mut row = Vec::with_capacity(self.port_signals.len());
        for (_, port) in ports.iter() {
            for &layer in port.layers() {
                row.push(port.flow(layer) / self.time_step);
            }
            if port.kind() != PortKind::Electricity {
                row.push(port.temperature().unwrap_or(f64::NAN));
            }
        }
        self.ports.push_row(&row);

        let mut row = vec![f64::NAN; self.controller_signals.len()];
        for (controller, issued) in actions {
            for (component, action) in issued {
                if let Some(col) = self.controller_signals.col_index(controller, component) {
                    row[col] = action.unwrap_or(f64::NAN);
                }
            }
        }
        self.controllers.push_row(&row);

        let row: Vec<f64> = readings.iter().map(|r| r.unwrap_or(f64::NAN)).collect();
        self.sensors.push_row(&row);
    }

    pub(crate) fn push_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Simulated time of each row (h).
    pub fn time_h(&self) -> &[f64] {
        &self.time_h
    }

    /// Tick length (s).
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn ticks(&self) -> usize {
        self.time_h.len()
    }

    pub fn port_signals(&self) -> &SignalRegistry {
        &self.port_signals
    }

    pub fn controller_signals(&self) -> &SignalRegistry {
        &self.controller_signals
    }

    pub fn sensor_signals(&self) -> &SignalRegistry {
        &self.sensor_signals
    }

    pub fn ports(&self) -> &Table {
        &self.ports
    }

    pub fn controllers(&self) -> &Table {
        &self.controllers
    }

    pub fn sensors(&self) -> &Table {
        &self.sensors
    }

    /// Recoverable conditions raised during the run, in order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Flow-rate series of a port layer.
    pub fn port_flow(&self, port: &str, layer: Layer) -> Result<Vec<f64>, SimError> {
        let col = self
            .port_signals
            .col_index(port, layer.as_str())
            .ok_or_else(|| SimError::UnknownPort(format!("{port}:{layer}")))?;
        Ok(self.ports.column(col).collect())
    }

    /// Temperature series of a heat or fluid port (K).
    pub fn port_temperature(&self, port: &str) -> Result<Vec<f64>, SimError> {
        let col = self
            .port_signals
            .col_index(port, TEMPERATURE_KEY)
            .ok_or_else(|| SimError::UnknownPort(format!("{port}:{TEMPERATURE_KEY}")))?;
        Ok(self.ports.column(col).collect())
    }

    /// Action series a controller issued for a component.
    pub fn controller_actions(&self, controller: &str, component: &str) -> Option<Vec<f64>> {
        let col = self.controller_signals.col_index(controller, component)?;
        Some(self.controllers.column(col).collect())
    }

    pub fn sensor_readings(&self, sensor: &str) -> Result<Vec<f64>, SimError> {
        let col = self
            .sensor_signals
            .col_index(sensor, MEASUREMENT_KEY)
            .ok_or_else(|| SimError::UnknownSensor(sensor.to_string()))?;
        Ok(self.sensors.column(col).collect())
    }

    /// Total quantity that crossed a port layer over the run (kJ or kg),
    /// positive when entering the owner.
    pub fn cumulated(&self, port: &str, layer: Layer) -> Result<f64, SimError> {
        self.cumulated_filtered(port, layer, SignFilter::Net)
    }

    /// Electricity that crossed a port over the run.
    pub fn cumulated_electricity(
        &self,
        port: &str,
        unit: EnergyUnit,
        sign: SignFilter,
    ) -> Result<f64, SimError> {
        Ok(self.cumulated_filtered(port, Layer::Electricity, sign)? * unit.scale())
    }

    fn cumulated_filtered(&self, port: &str, layer: Layer, sign: SignFilter) -> Result<f64, SimError> {
        let sum: f64 = self
            .port_flow(port, layer)?
            .into_iter()
            .filter(|rate| match sign {
                SignFilter::Net => true,
                SignFilter::OnlyPositive => *rate > 0.0,
                SignFilter::OnlyNegative => *rate < 0.0,
            })
            .sum();
        Ok(sum * self.time_step)
    }
}

impl fmt::Display for SimulationResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Results ===")?;
        writeln!(f, "Ticks:               {}", self.ticks())?;
        writeln!(f, "Tick length:         {:.0} s", self.time_step)?;
        writeln!(f, "Port signals:        {}", self.port_signals.len())?;
        writeln!(f, "Controller signals:  {}", self.controller_signals.len())?;
        writeln!(f, "Sensor signals:      {}", self.sensor_signals.len())?;
        write!(f, "Diagnostics:         {}", self.diagnostics.len())
    }
}
