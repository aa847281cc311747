//! ABOUTME: Shared error type for the Maverick workflow engine
//! ABOUTME: Crate-specific errors (expression, loader, workflow, checkpoint) convert into this

use thiserror::Error;

/// Top-level error type shared across the `maverick-*` crates.
///
/// Individual crates define their own narrower error enums (see
/// `maverick_expr::ExprError`, `maverick_workflows::LoaderError`, etc.) and
/// convert into this one at crate boundaries.
#[derive(Debug, Error)]
pub enum MaverickError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("component lookup error ({kind}): {name}")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<std::io::Error> for MaverickError {
    fn from(err: std::io::Error) -> Self {
        MaverickError::Storage {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MaverickError>;
