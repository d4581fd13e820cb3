//! Error Types
//!
//! Errors surfaced by the orchestration engine, the step executors and
//! the workflow catalog loader. None of these are fatal to the process;
//! callers map them to responses, bursts log them.

use thiserror::Error;

use crate::workflow::validator::ValidationError;

/// Errors returned by engine, store and registry operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("No workflow instance for order: {0}")]
    InstanceNotFound(String),

    #[error("Workflow instance already active for order: {0}")]
    InstanceAlreadyActive(String),

    #[error("Cursor for order '{order_id}' cannot move from {current} to {requested}")]
    CursorRegression {
        order_id: String,
        current: usize,
        requested: usize,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl EngineError {
    /// Returns true for the recoverable "unknown order or instance" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound(_) | Self::InstanceNotFound(_))
    }
}

/// Errors raised while running a single workflow step.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error("No executor registered under '{0}'")]
    UnknownExecutor(String),

    #[error("Executor '{executor}' does not support {kind} steps")]
    Unsupported { executor: String, kind: String },

    #[error("Step '{step}' failed: {reason}")]
    Failed { step: String, reason: String },
}

/// Errors raised while loading a workflow catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid workflow catalog: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
