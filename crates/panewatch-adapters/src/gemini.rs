//! Gemini adapter: normalizes parser and wrapper events.

use panewatch_core::types::{
    ActivityState, AdapterCapabilities, AgentType, Confidence, EventSource,
};

use crate::signal::{Normalized, Signal};
use crate::Adapter;

#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiAdapter;

impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini-parser"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Gemini
    }

    fn contract_version(&self) -> &'static str {
        "1.0"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            event_driven: true,
            polling_required: true,
            supports_waiting_approval: true,
            supports_waiting_input: true,
            supports_completed: true,
        }
    }

    fn normalize(&self, signal: &Signal<'_>) -> Option<Normalized> {
        if !matches!(signal.source, EventSource::Notify | EventSource::Wrapper) {
            return None;
        }
        match signal.event_type.as_str() {
            "parser-error" | "wrapper-error" => Some(Normalized::new(
                ActivityState::Error,
                "runtime_error",
                Confidence::High,
            )),
            "parser-input-needed" | "parser-needs-input" => Some(Normalized::new(
                ActivityState::WaitingInput,
                "input_required",
                Confidence::High,
            )),
            "parser-approval-needed" => Some(Normalized::new(
                ActivityState::WaitingApproval,
                "approval_requested",
                Confidence::High,
            )),
            "wrapper-start" => Some(Normalized::new(
                ActivityState::Running,
                "wrapper_start",
                Confidence::Medium,
            )),
            "wrapper-exit" => Some(Normalized::new(
                ActivityState::Completed,
                "wrapper_exit",
                Confidence::Medium,
            )),
            _ => None,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(event_type: &str, source: EventSource) -> Option<Normalized> {
        GeminiAdapter.normalize(&Signal::new(event_type, source, ""))
    }

    #[test]
    fn parser_errors_map_error() {
        for token in ["parser-error", "wrapper-error"] {
            let out = normalize(token, EventSource::Notify).expect("handled");
            assert_eq!(out.state, ActivityState::Error, "token: {token}");
            assert_eq!(out.confidence, Confidence::High);
        }
    }

    #[test]
    fn parser_input_variants_map_waiting_input() {
        for token in ["parser-input-needed", "parser-needs-input"] {
            let out = normalize(token, EventSource::Notify).expect("handled");
            assert_eq!(out.state, ActivityState::WaitingInput, "token: {token}");
        }
    }

    #[test]
    fn parser_approval_maps_waiting_approval() {
        let out = normalize("parser-approval-needed", EventSource::Notify).expect("handled");
        assert_eq!(out.state, ActivityState::WaitingApproval);
        assert_eq!(out.reason, "approval_requested");
    }

    #[test]
    fn wrapper_start_exit_map_running_completed() {
        let start = normalize("wrapper_start", EventSource::Wrapper).expect("handled");
        assert_eq!(start.state, ActivityState::Running);
        let exit = normalize("wrapper-exit", EventSource::Wrapper).expect("handled");
        assert_eq!(exit.state, ActivityState::Completed);
    }

    #[test]
    fn hook_source_not_handled() {
        assert!(normalize("parser-error", EventSource::Hook).is_none());
        assert!(normalize("parser-error", EventSource::Poller).is_none());
    }

    #[test]
    fn unknown_tokens_not_handled() {
        assert!(normalize("parser-idle", EventSource::Notify).is_none());
    }
}
