//! Pane activity inference from captured terminal output.
//!
//! Classifies the *latest non-empty* line of a capture with a fixed
//! precedence, falling back to a whole-buffer pass in the same order.
//! The intent: a fresh prompt at the bottom overrides an older "running"
//! marker, and a newer runtime error overrides stale approval hints.
//!
//! Also computes an FNV-1a signature of the normalized capture so the
//! stabilizer can detect output movement.

use serde::{Deserialize, Serialize};

use crate::types::{ActivityState, AgentType, Confidence};

// ─── Token tables ─────────────────────────────────────────────────

/// Bare prompt markers; a trimmed line equal to one of these is idle.
const PROMPT_MARKERS: &[&str] = &[">", "\u{276F}", "\u{203A}"];

/// Completion / ready phrases that also classify a line as idle.
const IDLE_TOKENS: &[&str] = &[
    "task completed",
    "completed successfully",
    "all done",
    "ready for input",
    "? for shortcuts",
];

const ERROR_TOKENS: &[&str] = &[
    "fatal:",
    "panic:",
    "traceback",
    "exception",
    "runtime error",
];

const APPROVAL_TOKENS: &[&str] = &[
    "approval required",
    "needs approval",
    "waiting for approval",
    "approve this",
    "do you want to proceed",
    "allow this command",
];

const INPUT_TOKENS: &[&str] = &[
    "input required",
    "needs input",
    "waiting for input",
    "please provide",
    "enter your",
    "(y/n)",
];

const RUNNING_TOKENS: &[&str] = &[
    "esc to interrupt",
    "ctrl+c to interrupt",
    "processing",
    "thinking",
    "generating",
    "crunched for",
    "clauding",
];

// ─── Activity hint ────────────────────────────────────────────────

/// Inferred pane activity. Also the vocabulary of direct poller
/// event-types accepted by the ingest engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityHint {
    Running,
    Idle,
    InputRequired,
    ApprovalRequested,
    RuntimeError,
    #[default]
    Unknown,
    #[serde(rename = "no-agent")]
    NoAgent,
}

impl ActivityHint {
    pub fn as_event_type(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Idle => "idle",
            Self::InputRequired => "input_required",
            Self::ApprovalRequested => "approval_requested",
            Self::RuntimeError => "runtime_error",
            Self::Unknown => "unknown",
            Self::NoAgent => "no-agent",
        }
    }

    pub fn from_event_type(token: &str) -> Option<Self> {
        match token {
            "running" => Some(Self::Running),
            "idle" => Some(Self::Idle),
            "input_required" => Some(Self::InputRequired),
            "approval_requested" => Some(Self::ApprovalRequested),
            "runtime_error" => Some(Self::RuntimeError),
            "unknown" => Some(Self::Unknown),
            "no-agent" | "no_agent" => Some(Self::NoAgent),
            _ => None,
        }
    }

    /// Projection triple for a poller-sourced hint.
    ///
    /// A "no-agent" pane must project `unknown`, never running or idle.
    pub fn to_state(self) -> (ActivityState, &'static str, Confidence) {
        match self {
            Self::Running => (ActivityState::Running, "active", Confidence::Medium),
            Self::Idle => (ActivityState::Idle, "prompt_idle", Confidence::Medium),
            Self::InputRequired => (
                ActivityState::WaitingInput,
                "input_required",
                Confidence::Medium,
            ),
            Self::ApprovalRequested => (
                ActivityState::WaitingApproval,
                "approval_requested",
                Confidence::Medium,
            ),
            Self::RuntimeError => (ActivityState::Error, "runtime_error", Confidence::Medium),
            Self::Unknown => (ActivityState::Unknown, "no_signal", Confidence::Low),
            Self::NoAgent => (ActivityState::Unknown, "no_agent", Confidence::Low),
        }
    }
}

/// Result of one capture inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityInference {
    pub hint: ActivityHint,
    /// FNV-1a signature of the normalized capture; `None` when the capture
    /// produced no output.
    pub signature: Option<u64>,
}

// ─── Inference ────────────────────────────────────────────────────

/// Infer pane activity from captured lines.
///
/// `agent_type == None` short-circuits to `no-agent`; a failed or empty
/// capture yields `unknown` with no signature.
pub fn infer_activity(agent_type: AgentType, lines: &[String]) -> ActivityInference {
    if agent_type == AgentType::None {
        return ActivityInference {
            hint: ActivityHint::NoAgent,
            signature: None,
        };
    }

    let normalized = normalize(lines);
    if normalized.is_empty() {
        return ActivityInference {
            hint: ActivityHint::Unknown,
            signature: None,
        };
    }
    let signature = Some(fnv1a64(normalized.join("\n").as_bytes()));

    // Latest non-empty line, walking bottom to top.
    let hint = normalized
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| classify_line(line))
        .or_else(|| classify_buffer(&normalized))
        .unwrap_or(ActivityHint::Unknown);

    ActivityInference { hint, signature }
}

/// Classify a single line with the fixed precedence.
fn classify_line(line: &str) -> Option<ActivityHint> {
    let trimmed = line.trim();
    let lower = trimmed.to_ascii_lowercase();

    if is_prompt_like(trimmed) || contains_any(&lower, IDLE_TOKENS) {
        return Some(ActivityHint::Idle);
    }
    if contains_any(&lower, ERROR_TOKENS) {
        return Some(ActivityHint::RuntimeError);
    }
    if contains_any(&lower, APPROVAL_TOKENS) {
        return Some(ActivityHint::ApprovalRequested);
    }
    if contains_any(&lower, INPUT_TOKENS) {
        return Some(ActivityHint::InputRequired);
    }
    if contains_any(&lower, RUNNING_TOKENS) {
        return Some(ActivityHint::Running);
    }
    None
}

/// Whole-buffer fallback: apply each precedence class in order across all
/// lines before moving to the next class.
fn classify_buffer(lines: &[String]) -> Option<ActivityHint> {
    let lowered: Vec<String> = lines.iter().map(|l| l.trim().to_ascii_lowercase()).collect();

    if lines.iter().any(|l| is_prompt_like(l.trim()))
        || lowered.iter().any(|l| contains_any(l, IDLE_TOKENS))
    {
        return Some(ActivityHint::Idle);
    }
    if lowered.iter().any(|l| contains_any(l, ERROR_TOKENS)) {
        return Some(ActivityHint::RuntimeError);
    }
    if lowered.iter().any(|l| contains_any(l, APPROVAL_TOKENS)) {
        return Some(ActivityHint::ApprovalRequested);
    }
    if lowered.iter().any(|l| contains_any(l, INPUT_TOKENS)) {
        return Some(ActivityHint::InputRequired);
    }
    if lowered.iter().any(|l| contains_any(l, RUNNING_TOKENS)) {
        return Some(ActivityHint::Running);
    }
    None
}

fn is_prompt_like(trimmed: &str) -> bool {
    PROMPT_MARKERS.iter().any(|marker| {
        trimmed == *marker
            || trimmed
                .strip_prefix(marker)
                .is_some_and(|rest| rest.starts_with(' '))
    })
}

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| haystack.contains(token))
}

/// Trim trailing whitespace per line and drop trailing empty lines.
fn normalize(lines: &[String]) -> Vec<String> {
    let mut out: Vec<String> = lines.iter().map(|l| l.trim_end().to_string()).collect();
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

/// FNV-1a 64-bit hash.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

// ─── Tests ────────────────────────────────────────────────────────
