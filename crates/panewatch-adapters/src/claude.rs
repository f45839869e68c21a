//! Claude adapter: normalizes Claude Code hook events.

use panewatch_core::types::{
    ActivityState, AdapterCapabilities, AgentType, Confidence, EventSource,
};

use crate::signal::{Normalized, Signal};
use crate::Adapter;

#[derive(Debug, Default, Clone, Copy)]
pub struct ClaudeAdapter;

const APPROVAL_EVENTS: &[&str] = &["needs-approval", "wait-approval", "approval-requested"];
const INPUT_EVENTS: &[&str] = &["needs-input", "user-intervention-needed", "prompt-user"];
const START_EVENTS: &[&str] = &["hook-start", "task-started", "session-started"];
const DONE_EVENTS: &[&str] = &["hook-done", "task-finished", "session-finished"];
const ERROR_EVENTS: &[&str] = &["hook-error", "runtime-error", "runtime-fail", "runtime-panic"];

impl Adapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude-hooks"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Claude
    }

    fn contract_version(&self) -> &'static str {
        "1.0"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            event_driven: true,
            polling_required: false,
            supports_waiting_approval: true,
            supports_waiting_input: true,
            supports_completed: true,
        }
    }

    fn normalize(&self, signal: &Signal<'_>) -> Option<Normalized> {
        if signal.source != EventSource::Hook {
            return None;
        }
        let token = signal.event_type.as_str();

        if APPROVAL_EVENTS.contains(&token) {
            return Some(Normalized::new(
                ActivityState::WaitingApproval,
                "approval_requested",
                Confidence::High,
            ));
        }
        if INPUT_EVENTS.contains(&token) {
            return Some(Normalized::new(
                ActivityState::WaitingInput,
                "input_required",
                Confidence::High,
            ));
        }
        if START_EVENTS.contains(&token) {
            return Some(Normalized::new(
                ActivityState::Running,
                "active",
                Confidence::Medium,
            ));
        }
        if DONE_EVENTS.contains(&token) {
            return Some(Normalized::new(
                ActivityState::Completed,
                "task_completed",
                Confidence::Medium,
            ));
        }
        if ERROR_EVENTS.contains(&token) {
            return Some(Normalized::new(
                ActivityState::Error,
                "runtime_error",
                Confidence::High,
            ));
        }
        None
    }
}

// ─── Tests ────────────────────────────────────────────────────────
