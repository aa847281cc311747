//! ABOUTME: Progress event union and sink for Maverick workflow runs
//! ABOUTME: Default sink is a single-purpose broadcast channel, no pattern matching or persistence

pub mod event;
pub mod sink;

pub use event::WorkflowEvent;
pub use sink::{BroadcastProgressSink, NullProgressSink, ProgressSink};
