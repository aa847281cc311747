//! ABOUTME: Error taxonomy for the loader, registry, executor and engine
//! ABOUTME: One enum per concern, structured fields instead of opaque strings

use thiserror::Error;

/// Errors raised while parsing or validating a `WorkflowFile`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoaderError {
    #[error("{path}: {reason}")]
    Schema { path: String, reason: String },

    #[error("duplicate step name '{name}'")]
    DuplicateName { name: String },

    #[error("stage profile '{key}' not found in validation config")]
    StageProfileMissing { key: String },

    #[error("workflow '{name}' not found (searched {searched_paths:?})")]
    Discovery {
        name: String,
        searched_paths: Vec<String>,
    },
}

/// Errors raised by the Component Registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{name}'")]
pub struct RegistryError {
    pub kind: &'static str,
    pub name: String,
}

/// Step-level failures surfaced by the Executor. These are caught
/// at the Engine's dispatch loop and turned into a failed `StepResult`; they
/// never unwind past a single step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Expr(#[from] maverick_expr::ExprError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("action failed: {0}")]
    Action(String),

    #[error("context builder failed: {0}")]
    ContextBuilder(String),

    #[error("context builder returned a non-object value")]
    ContextNotObject,

    #[error("no branch option matched")]
    NoBranchMatched,

    #[error("stage profile '{key}' not found in validation config")]
    StageProfileMissing { key: String },

    #[error("validation failed after {attempts} attempt(s)")]
    ValidationFailed {
        attempts: u32,
        /// The last `run_stages` result (`{passed, stages}`), carried so the
        /// failing `StepResult.output` reflects what actually ran instead of
        /// being null.
        output: serde_json::Value,
    },

    #[error("sub-workflow '{name}' failed: {reason}")]
    SubWorkflow { name: String, reason: String },

    #[error(transparent)]
    Checkpoint(#[from] maverick_checkpoint::CheckpointError),

    #[error("{0}")]
    Other(String),
}

/// Workflow-level (whole-run) failures. Distinct from `StepError`: these
/// either precede step dispatch entirely (`InvalidInput`, `InputMismatch`) or
/// are the Engine's own invariant violations (`DuplicateName`).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("duplicate step name '{name}'")]
    DuplicateName { name: String },

    #[error("resuming '{workflow}' with different inputs (checkpoint hash {checkpoint_hash}, current {current_hash})")]
    InputMismatch {
        workflow: String,
        checkpoint_hash: String,
        current_hash: String,
    },

    #[error("no checkpoint found for workflow '{workflow}'")]
    NoCheckpoint { workflow: String },

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Checkpoint(#[from] maverick_checkpoint::CheckpointError),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
