//! ABOUTME: Workflow DSL engine: loader, registry, executor and engine
//! ABOUTME: Parses a YAML workflow file, validates it, and runs its steps to completion or checkpoint

pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod loader;
pub mod registry;
pub mod steps;

pub use context::{
    IterationFrame, PendingRollback, RollbackError, SkipReason, StepResult, WorkflowContext,
    WorkflowResult,
};
pub use engine::Engine;
pub use error::{LoaderError, RegistryError, Result, StepError, WorkflowError};
pub use loader::{Discovery, Loader};
pub use registry::{Agent, ContextBuilder, Generator, Registry, RegistryBuilder};
pub use steps::{
    BranchOption, ContextSpec, InputDecl, InputType, Source, StagesSpec, Step, StepKind,
    WorkflowFile,
};
