//! Error types for perfscope

use crate::exporter::LifecycleState;
use thiserror::Error;

/// Result type alias for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A different view is already registered under the same name
    #[error("View conflict: a different view named '{0}' is already registered")]
    ViewConflict(String),

    /// View definition rejected
    #[error("Invalid view: {0}")]
    InvalidView(String),

    /// Lifecycle operation not allowed in the current state
    #[error("Cannot {operation} exporter in state {state:?}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State the exporter was in
        state: LifecycleState,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exporter error
    #[error("Exporter error: {0}")]
    Exporter(String),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Several independent failures
    #[error("{}", join_errors(.0))]
    Multiple(Vec<TelemetryError>),

    /// Generic error
    #[error("Telemetry error: {0}")]
    Other(String),
}

impl TelemetryError {
    /// Fold a list of errors into one, or `None` when the list is empty.
    pub fn combine(mut errors: Vec<TelemetryError>) -> Option<TelemetryError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(TelemetryError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[TelemetryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<String> for TelemetryError {
    fn from(s: String) -> Self {
        TelemetryError::Other(s)
    }
}

impl From<&str> for TelemetryError {
    fn from(s: &str) -> Self {
        TelemetryError::Other(s.to_string())
    }
}
