//! ABOUTME: Error type for expression parsing and evaluation
//! ABOUTME: Parse errors carry a byte offset; evaluation errors cover missing inputs, type mismatches, iteration scope

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("expression parse error at offset {offset}: expected {expected}")]
    Parse { offset: usize, expected: String },

    #[error("unterminated ${{{{ ... }}}} template")]
    UnterminatedTemplate,

    #[error("missing input '{name}'")]
    MissingInput { name: String },

    #[error("'item'/'index' referenced outside a loop iteration")]
    IterationScope,

    #[error("type mismatch in {op}: {actual_type}")]
    TypeMismatch { op: String, actual_type: String },

    #[error("predicate must evaluate to a boolean, got {actual_type}")]
    PredicateMustBeBoolean { actual_type: String },
}

pub type Result<T> = std::result::Result<T, ExprError>;
