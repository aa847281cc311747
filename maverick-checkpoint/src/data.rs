//! ABOUTME: On-disk checkpoint data shapes
//! ABOUTME: Immutable once constructed; the store treats these as opaque blobs to persist

use serde::{Deserialize, Serialize};

/// A serialized step result, exactly as it appears in a checkpoint's
/// `step_results` array. This is a checkpoint-store-local shape, not
/// the workflow engine's live `StepResult` — the engine converts between the
/// two at the checkpoint boundary, keeping this crate ignorant of the
/// workflow type graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedStepResult {
    pub name: String,
    pub step_type: String,
    pub success: bool,
    pub output: serde_json::Value,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Resumable checkpoint state. Immutable after construction; the
/// store never mutates a saved checkpoint in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointData {
    pub checkpoint_id: String,
    pub workflow_name: String,
    /// First 16 hex characters of SHA-256 over canonically-sorted-JSON
    /// inputs. Preserved byte-for-byte by the store.
    pub inputs_hash: String,
    pub step_results: Vec<SerializedStepResult>,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}
