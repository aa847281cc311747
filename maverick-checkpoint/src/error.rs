//! ABOUTME: Errors for the checkpoint store (C6)
//! ABOUTME: Structured, per-cause variants rather than a single opaque message string

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("checkpoint '{checkpoint_id}' not found for workflow '{workflow_name}'")]
    NotFound {
        workflow_name: String,
        checkpoint_id: String,
    },
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
