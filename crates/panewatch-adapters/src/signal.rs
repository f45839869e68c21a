//! Adapter input/output types and event-type canonicalization.

use panewatch_core::types::{ActivityState, Confidence, EventSource};

/// Raw input to an adapter.
#[derive(Debug, Clone)]
pub struct Signal<'a> {
    /// Canonicalized event-type token (see [`canonical_event_type`]).
    pub event_type: String,
    pub source: EventSource,
    /// Raw payload text; adapters are the only place that interprets it.
    pub payload: &'a str,
}

impl<'a> Signal<'a> {
    pub fn new(event_type: &str, source: EventSource, payload: &'a str) -> Self {
        Self {
            event_type: canonical_event_type(event_type),
            source,
            payload,
        }
    }
}

/// Canonical adapter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub state: ActivityState,
    pub reason: &'static str,
    pub confidence: Confidence,
}

impl Normalized {
    pub fn new(state: ActivityState, reason: &'static str, confidence: Confidence) -> Self {
        Self {
            state,
            reason,
            confidence,
        }
    }
}

/// Canonicalize an event-type token: trim, lowercase, underscores become
/// dashes.
pub fn canonical_event_type(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_rules() {
        assert_eq!(canonical_event_type("  Task_Started "), "task-started");
        assert_eq!(canonical_event_type("hook-done"), "hook-done");
        assert_eq!(canonical_event_type("NEEDS_APPROVAL"), "needs-approval");
        assert_eq!(canonical_event_type(""), "");
    }

    #[test]
    fn signal_canonicalizes_on_construction() {
        let signal = Signal::new(" Hook_Start ", EventSource::Hook, "{}");
        assert_eq!(signal.event_type, "hook-start");
    }
}
