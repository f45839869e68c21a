//! Codex adapter: normalizes notify and wrapper events.
//!
//! Codex notify payloads are JSON of loosely-specified shape, so the
//! event-type token may be overridden by peeking at the payload. The peek
//! is restricted to a small declarative key set and explores nested
//! objects; string values and arrays of strings under those keys become
//! classification tokens. When nothing usable is found, the whole payload
//! is matched lowercased.
//!
//! Bare "error" substrings deliberately do not classify as error;
//! messages like "no errors found" would otherwise false-positive. Only
//! strong markers (`"status":"failed"`, runtime-error tokens, quoted
//! error fields) win.

use panewatch_core::types::{
    ActivityState, AdapterCapabilities, AgentType, Confidence, EventSource,
};

use crate::signal::{Normalized, Signal, canonical_event_type};
use crate::Adapter;

/// Keys whose values are examined during the JSON peek.
const PEEK_KEYS: &[&str] = &["type", "event", "status", "result", "state", "kind"];

const APPROVAL_TOKENS: &[&str] = &["approval", "permission"];
const INPUT_TOKENS: &[&str] = &["input", "question", "(y/n)"];
const COMPLETED_TOKENS: &[&str] = &["complete", "finished", "done", "success"];
/// Strong error markers. Bare "error" is intentionally absent.
const ERROR_TOKENS: &[&str] = &["failed", "runtime-error", "panic"];

#[derive(Debug, Default, Clone, Copy)]
pub struct CodexAdapter;

impl Adapter for CodexAdapter {
    fn name(&self) -> &'static str {
        "codex-notify"
    }

    fn agent_type(&self) -> AgentType {
        AgentType::Codex
    }

    fn contract_version(&self) -> &'static str {
        "1.1"
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
        match signal.source {
            EventSource::Notify => normalize_notify(signal),
            EventSource::Wrapper => normalize_wrapper(&signal.event_type),
            _ => None,
        }
    }
}

fn normalize_notify(signal: &Signal<'_>) -> Option<Normalized> {
    let peeked = peek_payload_tokens(signal.payload);
    let mut haystacks = if peeked.is_empty() {
        vec![signal.payload.to_ascii_lowercase()]
    } else {
        peeked
    };
    // The event-type token itself competes alongside payload tokens.
    if !signal.event_type.is_empty() {
        haystacks.push(signal.event_type.clone());
    }

    classify(&haystacks, signal.payload)
}

/// Wrapper start/exit markers bias toward running/completed.
fn normalize_wrapper(event_type: &str) -> Option<Normalized> {
    match event_type {
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

/// Ordered precedence: approval, then input, then completed, then error.
fn classify(haystacks: &[String], raw_payload: &str) -> Option<Normalized> {
    if any_contains(haystacks, APPROVAL_TOKENS) {
        return Some(Normalized::new(
            ActivityState::WaitingApproval,
            "approval_requested",
            Confidence::High,
        ));
    }
    if any_contains(haystacks, INPUT_TOKENS) {
        return Some(Normalized::new(
            ActivityState::WaitingInput,
            "input_required",
            Confidence::High,
        ));
    }
    if any_contains(haystacks, COMPLETED_TOKENS) {
        return Some(Normalized::new(
            ActivityState::Completed,
            "task_completed",
            Confidence::Medium,
        ));
    }
    if any_contains(haystacks, ERROR_TOKENS) || has_quoted_error_field(raw_payload) {
        return Some(Normalized::new(
            ActivityState::Error,
            "runtime_error",
            Confidence::High,
        ));
    }
    None
}

fn any_contains(haystacks: &[String], tokens: &[&str]) -> bool {
    haystacks
        .iter()
        .any(|hay| tokens.iter().any(|token| hay.contains(token)))
}

/// A quoted, non-empty error field is a strong marker; a bare "error"
/// substring is not.
fn has_quoted_error_field(payload: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return false;
    };
    quoted_error_in(&value)
}

fn quoted_error_in(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => map.iter().any(|(key, inner)| {
            (key == "error" && inner.as_str().is_some_and(|s| !s.is_empty()))
                || quoted_error_in(inner)
        }),
        serde_json::Value::Array(items) => items.iter().any(quoted_error_in),
        _ => false,
    }
}

/// Collect canonicalized tokens from the payload's declared key set,
/// exploring nested objects and arrays.
fn peek_payload_tokens(payload: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return Vec::new();
    };
    let mut tokens = Vec::new();
    collect_tokens(&value, &mut tokens);
    tokens
}

fn collect_tokens(value: &serde_json::Value, tokens: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                if PEEK_KEYS.contains(&key.as_str()) {
                    push_string_values(inner, tokens);
                }
                collect_tokens(inner, tokens);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_tokens(item, tokens);
            }
        }
        _ => {}
    }
}

fn push_string_values(value: &serde_json::Value, tokens: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => tokens.push(canonical_event_type(s)),
        serde_json::Value::Array(items) => {
            for item in items {
                if let Some(s) = item.as_str() {
                    tokens.push(canonical_event_type(s));
                }
            }
        }
        _ => {}
    }
}

// ─── Tests ────────────────────────────────────────────────────────
