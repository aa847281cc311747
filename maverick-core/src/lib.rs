//! ABOUTME: Shared foundation types for the Maverick workflow engine
//! ABOUTME: Error type, run identifiers, and the Logger collaborator trait

pub mod error;
pub mod ids;
pub mod logging;

pub use error::{MaverickError, Result};
pub use ids::RunId;
pub use logging::{Logger, RecordingLogger, TracingLogger};
