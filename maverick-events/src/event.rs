//! ABOUTME: The workflow progress event union consumed by the UI collaborator
//! ABOUTME: Transport-agnostic — the core only ever constructs and emits these

use serde::{Deserialize, Serialize};

/// Events emitted by the Workflow Engine, consumed by a UI or logging
/// collaborator. The core imposes no transport; `ProgressSink` is the seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    WorkflowStarted {
        workflow_name: String,
        run_id: String,
    },
    StepStarted {
        step_name: String,
    },
    StepCompleted {
        step_name: String,
        success: bool,
        duration_ms: u64,
    },
    AgentStreamChunk {
        step_name: String,
        text: String,
    },
    RollbackStarted {
        step_name: String,
    },
    RollbackCompleted {
        step_name: String,
        ok: bool,
    },
    CheckpointSaved {
        checkpoint_id: String,
    },
    WorkflowCompleted {
        workflow_name: String,
        success: bool,
        total_duration_ms: u64,
    },
}
