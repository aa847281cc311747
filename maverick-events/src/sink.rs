//! ABOUTME: ProgressSink collaborator trait plus a broadcast-channel default impl
//! ABOUTME: A callback-shaped trait plus a broadcast-channel default implementation

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::event::WorkflowEvent;

/// Progress event sink: a callback accepting the event union. The engine
/// holds one of these and calls `emit` at every event point in a run; it
/// never inspects subscribers or blocks on delivery.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: WorkflowEvent);
}

/// Sink that drops every event. Useful for engines run without a UI attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: WorkflowEvent) {}
}

/// Default sink: a `tokio::sync::broadcast` channel, with no pattern
/// matching or persistence of its own (those are UI/transport concerns,
/// out of scope here).
pub struct BroadcastProgressSink {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastProgressSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// A `Stream` view over the same channel, for UI collaborators that
    /// prefer `futures::Stream` combinators over a raw receiver.
    #[must_use]
    pub fn subscribe_stream(&self) -> BroadcastStream<WorkflowEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

impl Default for BroadcastProgressSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is a normal, non-error state (e.g. a headless run).
        if self.tx.send(event).is_err() {
            tracing::trace!("progress event emitted with no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let sink = BroadcastProgressSink::default();
        let mut rx = sink.subscribe();

        sink.emit(WorkflowEvent::StepStarted {
            step_name: "build".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            WorkflowEvent::StepStarted {
                step_name: "build".to_string()
            }
        );
    }

    #[test]
    fn emitting_with_no_subscribers_does_not_panic() {
        let sink = BroadcastProgressSink::default();
        sink.emit(WorkflowEvent::WorkflowCompleted {
            workflow_name: "wf".to_string(),
            success: true,
            total_duration_ms: 10,
        });
    }
}
