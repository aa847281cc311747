//! ABOUTME: Validated workflow and step record types
//! ABOUTME: Produced solely by the loader's parse + validate passes; never mutated after

mod record;

pub use record::{
    BranchOption, ContextSpec, InputDecl, InputType, Source, StagesSpec, Step, StepKind,
    WorkflowFile,
};
