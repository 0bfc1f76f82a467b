//! Best-effort diagnostics channel.
//!
//! Correlation handling swallows most failures on purpose; this channel is
//! how a host finds out they happened. A process-global listener receives
//! structured events, and without one attached emission is a no-op. Nothing
//! here may ever influence the outcome of a request.

use serde::Serialize;
use std::sync::{Arc, OnceLock};

/// Structured failure events observable by an attached listener.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticsEvent {
    /// Writing the correlation header onto a response failed (invalid
    /// header data, or the response could no longer be modified).
    ResponseHeaderWriteFailed { header_name: String, reason: String },

    /// Writing propagation headers onto an outbound request failed.
    OutboundHeaderWriteFailed { header_name: String, reason: String },

    /// An inbound correlation id failed format validation and was replaced.
    CorrelationIdRejected { rejected: String },
}

/// Receiver for [`DiagnosticsEvent`]s.
pub trait DiagnosticsListener: Send + Sync {
    fn on_event(&self, event: &DiagnosticsEvent);
}

static LISTENER: OnceLock<Arc<dyn DiagnosticsListener>> = OnceLock::new();

/// Attach the process-global diagnostics listener.
///
/// Only the first registration wins; returns `false` if a listener was
/// already attached.
pub fn set_diagnostics_listener(listener: Arc<dyn DiagnosticsListener>) -> bool {
    LISTENER.set(listener).is_ok()
}

/// Emit an event to the attached listener, if any.
pub fn emit(event: DiagnosticsEvent) {
    if let Some(listener) = LISTENER.get() {
        listener.on_event(&event);
    }
    tracing::debug!(event = ?event, "traceability diagnostics event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<DiagnosticsEvent>>,
    }

    impl DiagnosticsListener for RecordingListener {
        fn on_event(&self, event: &DiagnosticsEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_emit_without_listener_is_silent() {
        // Must not panic or block; there is nothing else to observe.
        emit(DiagnosticsEvent::CorrelationIdRejected {
            rejected: "abc def".to_string(),
        });
    }

    #[test]
    fn test_listener_receives_events() {
        let listener = Arc::new(RecordingListener::default());
        // Registration may lose the race to another test; emission still
        // goes to whichever listener won.
        let installed = set_diagnostics_listener(listener.clone());

        emit(DiagnosticsEvent::ResponseHeaderWriteFailed {
            header_name: "X-Correlation-Id".to_string(),
            reason: "response already committed".to_string(),
        });

        if installed {
            let events = listener.events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert!(matches!(
                events[0],
                DiagnosticsEvent::ResponseHeaderWriteFailed { .. }
            ));
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = DiagnosticsEvent::CorrelationIdRejected {
            rejected: "bad id".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("correlation_id_rejected"));
        assert!(json.contains("bad id"));
    }
}
