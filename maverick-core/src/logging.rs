//! ABOUTME: Logger collaborator trait for the workflow core
//! ABOUTME: Default implementation forwards to `tracing`; tests can swap in a recorder

use std::sync::{Arc, Mutex};

/// Structured warning sink consumed by the executor and engine.
///
/// The core never decides where logs end up — that's the host's job. This
/// trait exists so tests can assert a warning fired without scraping
/// `tracing`'s global subscriber.
pub trait Logger: Send + Sync {
    fn warn(&self, message: &str);
}

/// Default logger: forwards to `tracing::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "maverick", "{message}");
    }
}

/// Test logger: records every warning for assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.records.lock().expect("logger lock poisoned").clone()
    }
}

impl Logger for RecordingLogger {
    fn warn(&self, message: &str) {
        self.records
            .lock()
            .expect("logger lock poisoned")
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_accumulates_in_order() {
        let logger = RecordingLogger::new();
        logger.warn("first");
        logger.warn("second");
        assert_eq!(logger.warnings(), vec!["first", "second"]);
    }

    #[tracing_test::traced_test]
    #[test]
    fn tracing_logger_emits_through_tracing() {
        TracingLogger.warn("disk usage above threshold");
        assert!(logs_contain("disk usage above threshold"));
    }
}
