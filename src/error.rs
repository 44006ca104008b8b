//! Error types raised while assembling or running a simulation.

use thiserror::Error;

use crate::ports::{Layer, PortKind};

/// Fatal conditions that abort assembly or a run.
///
/// Every variant is raised at the point of detection and propagated
/// unchanged; the engine never retries a tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("port `{port}` is already connected to `{existing}`, cannot connect it to `{requested}`")]
    ConnectionConflict {
        port: String,
        existing: String,
        requested: String,
    },
    #[error("ports `{a}` ({a_kind:?}) and `{b}` ({b_kind:?}) carry different layers")]
    PortKindMismatch {
        a: String,
        a_kind: PortKind,
        b: String,
        b_kind: PortKind,
    },
    #[error("unknown port `{0}`")]
    UnknownPort(String),
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    #[error("unknown sensor `{0}`")]
    UnknownSensor(String),
    #[error("name `{0}` is registered twice")]
    DuplicateName(String),
    #[error("port `{port}` does not carry the {layer:?} layer")]
    LayerNotCarried { port: String, layer: Layer },
    #[error("component `{component}` tried to access port `{port}` owned by `{owner}`")]
    ForeignPort {
        component: String,
        port: String,
        owner: String,
    },
    #[error(
        "controller `{controller}` targets component `{component}` which was already stepped or is not pending at tick {tick}"
    )]
    OrderViolation {
        controller: String,
        component: String,
        tick: usize,
    },
    #[error("tick {tick} (t = {time} s) concluded but components {pending:?} were not stepped")]
    IncompleteStep {
        tick: usize,
        time: f64,
        pending: Vec<String>,
    },
    #[error("controller `{controller}` returned no action for controlled component `{component}`")]
    MissingAction {
        controller: String,
        component: String,
    },
    #[error("component `{component}` received invalid action {action:?}: {reason}")]
    InvalidAction {
        component: String,
        action: Option<f64>,
        reason: String,
    },
    #[error("flow mismatch on {layer:?} between `{a}` ({a_flow}) and `{b}` ({b_flow}) at tick {tick}")]
    FlowMismatch {
        a: String,
        a_flow: f64,
        b: String,
        b_flow: f64,
        layer: Layer,
        tick: usize,
    },
    #[error("invalid parameter for `{component}`: {message}")]
    InvalidParameter { component: String, message: String },
    #[error("invalid time series: {0}")]
    InvalidTimeSeries(String),
    #[error("profile of `{component}` has no value for tick {tick}")]
    ProfileTooShort { component: String, tick: usize },
    #[error("tridiagonal system is singular at row {row}")]
    SingularSystem { row: usize },
}

impl SimError {
    pub(crate) fn invalid_parameter(component: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            component: component.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.time_step_h"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<SimError> for ConfigError {
    fn from(err: SimError) -> Self {
        Self::new("scenario", err.to_string())
    }
}
