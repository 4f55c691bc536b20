//! Infrastructure error types.
//!
//! These cover load-time and dispatch-time failures of the engine itself.
//! Failures *inside* a workflow execution are not errors in this sense —
//! they are [`GlobalError`](crate::response::GlobalError) values carried
//! in the terminal response.

use thiserror::Error;

/// Errors raised while loading and validating workflow definitions.
#[derive(Debug, Error)]
pub enum WorkflowLoadError {
    #[error("workflow '{workflow}' failed validation: {}", errors.join("; "))]
    Invalid {
        workflow: String,
        errors: Vec<String>,
    },
    #[error("duplicate workflow name: {name}")]
    DuplicateWorkflow { name: String },
    #[error(
        "trigger conflict on {method} {path}: claimed by '{first}' and '{second}'"
    )]
    TriggerConflict {
        method: String,
        path: String,
        first: String,
        second: String,
    },
}

/// Errors raised when dispatching an inbound event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No trigger matches — the transport boundary renders its 404 analogue.
    #[error("no trigger matches {method} {path}")]
    NoRoute { method: String, path: String },
    #[error("unknown workflow: {name}")]
    UnknownWorkflow { name: String },
}
