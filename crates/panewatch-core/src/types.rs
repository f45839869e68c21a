use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ─── Agent type ───────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum AgentType {
    Codex,
    Claude,
    Gemini,
    /// No agent is hosted by the pane (shell, editor, ...).
    None,
    #[default]
    Unknown,
}

impl AgentType {
    pub const ALL: [Self; 5] = [
        Self::Codex,
        Self::Claude,
        Self::Gemini,
        Self::None,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }

    /// True for types that identify a concrete agent program.
    pub fn is_agent(self) -> bool {
        matches!(self, Self::Codex | Self::Claude | Self::Gemini)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "codex" => Ok(Self::Codex),
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "none" => Ok(Self::None),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::InvalidEvent(format!(
                "unknown agent type: {other}"
            ))),
        }
    }
}

// ─── Activity state ───────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ActivityState {
    Running,
    WaitingInput,
    WaitingApproval,
    Completed,
    Error,
    Idle,
    #[default]
    Unknown,
}

impl ActivityState {
    /// Precedence order (descending): higher-priority states win projection.
    pub const PRECEDENCE_DESC: [Self; 7] = [
        Self::Error,
        Self::WaitingApproval,
        Self::WaitingInput,
        Self::Running,
        Self::Completed,
        Self::Idle,
        Self::Unknown,
    ];

    /// Numeric precedence rank; larger values outrank smaller ones.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Error => 6,
            Self::WaitingApproval => 5,
            Self::WaitingInput => 4,
            Self::Running => 3,
            Self::Completed => 2,
            Self::Idle => 1,
            Self::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WaitingInput => "waiting_input",
            Self::WaitingApproval => "waiting_approval",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Idle => "idle",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "waiting_input" => Ok(Self::WaitingInput),
            "waiting_approval" => Ok(Self::WaitingApproval),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "idle" => Ok(Self::Idle),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::InvalidEvent(format!("unknown state: {other}"))),
        }
    }
}

// ─── Confidence ───────────────────────────────────────────────────

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Multiplicative factor used in weight x confidence tie-breaking.
    pub fn factor(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CoreError::InvalidEvent(format!(
                "unknown confidence: {other}"
            ))),
        }
    }
}

// ─── Targets ──────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Local,
    Ssh,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ssh => "ssh",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ssh" => Ok(Self::Ssh),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown target kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    #[default]
    Ok,
    Degraded,
    Down,
}

impl TargetHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for TargetHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetHealth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "degraded" => Ok(Self::Degraded),
            "down" => Ok(Self::Down),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown target health: {other}"
            ))),
        }
    }
}

/// A named destination for tmux invocations (local host or ssh remote).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub target_id: String,
    pub name: String,
    pub kind: TargetKind,
    /// ssh destination argument. Must never begin with `-`.
    pub connection: Option<String>,
    pub health: TargetHealth,
    pub is_default: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ─── Panes & runtimes ─────────────────────────────────────────────

/// Key addressing a pane within the whole deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneKey {
    pub target_id: String,
    pub pane_id: String,
}

impl PaneKey {
    pub fn new(target_id: impl Into<String>, pane_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            pane_id: pane_id.into(),
        }
    }
}

impl fmt::Display for PaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target_id, self.pane_id)
    }
}

/// A tmux pane as observed at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pane {
    pub target_id: String,
    pub pane_id: String,
    pub session_name: String,
    pub window_id: String,
    pub window_name: String,
    pub current_cmd: String,
    pub current_pid: Option<i64>,
    pub tty: String,
    pub current_path: String,
    pub history_bytes: u64,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl Pane {
    pub fn key(&self) -> PaneKey {
        PaneKey::new(self.target_id.clone(), self.pane_id.clone())
    }
}

/// A single lifetime of one agent within one pane.
///
/// At most one runtime per (target, pane) may be active (`ended_at = None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub runtime_id: String,
    pub target_id: String,
    pub pane_id: String,
    /// Monotone integer per pane; rotates when the runtime identity changes.
    pub pane_epoch: i64,
    pub agent_type: AgentType,
    /// tmux server boot identity the runtime was observed under.
    pub boot_id: String,
    pub pid: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Runtime {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn key(&self) -> PaneKey {
        PaneKey::new(self.target_id.clone(), self.pane_id.clone())
    }
}

// ─── Events ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    #[default]
    Poller,
    Hook,
    Notify,
    Wrapper,
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poller => "poller",
            Self::Hook => "hook",
            Self::Notify => "notify",
            Self::Wrapper => "wrapper",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poller" => Ok(Self::Poller),
            "hook" => Ok(Self::Hook),
            "notify" => Ok(Self::Notify),
            "wrapper" => Ok(Self::Wrapper),
            other => Err(CoreError::InvalidEvent(format!(
                "unknown event source: {other}"
            ))),
        }
    }
}

/// An immutable ingestion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    /// Short event-type token, interpreted by the adapters.
    pub event_type: String,
    pub source: EventSource,
    /// Unique across the system; collisions are idempotency conflicts.
    pub dedupe_key: String,
    pub event_time: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    /// None at ingest time means the event is pending bind.
    pub runtime_id: Option<String>,
    pub target_id: String,
    pub pane_id: String,
    /// Optional pid hint used by the inbox resolver.
    pub pid: Option<i64>,
    /// Optional start-timestamp hint used by the inbox resolver.
    pub start_hint: Option<DateTime<Utc>>,
    /// Redacted raw payload (empty when scrubbed by retention).
    pub raw_payload: String,
}

impl EventEnvelope {
    pub fn key(&self) -> PaneKey {
        PaneKey::new(self.target_id.clone(), self.pane_id.clone())
    }
}

// ─── Event inbox ──────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    #[default]
    PendingBind,
    Bound,
    DroppedUnbound,
}

impl InboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingBind => "pending_bind",
            Self::Bound => "bound",
            Self::DroppedUnbound => "dropped_unbound",
        }
    }
}

impl FromStr for InboxStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_bind" => Ok(Self::PendingBind),
            "bound" => Ok(Self::Bound),
            "dropped_unbound" => Ok(Self::DroppedUnbound),
            other => Err(CoreError::InvalidEvent(format!(
                "unknown inbox status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxDropReason {
    BindNoCandidate,
    BindAmbiguous,
    BindTtlExpired,
}

impl InboxDropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BindNoCandidate => "bind_no_candidate",
            Self::BindAmbiguous => "bind_ambiguous",
            Self::BindTtlExpired => "bind_ttl_expired",
        }
    }
}

impl FromStr for InboxDropReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bind_no_candidate" => Ok(Self::BindNoCandidate),
            "bind_ambiguous" => Ok(Self::BindAmbiguous),
            "bind_ttl_expired" => Ok(Self::BindTtlExpired),
            other => Err(CoreError::InvalidEvent(format!(
                "unknown drop reason: {other}"
            ))),
        }
    }
}

/// A parked event awaiting runtime binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxRow {
    pub inbox_id: i64,
    pub event: EventEnvelope,
    pub status: InboxStatus,
    pub drop_reason: Option<InboxDropReason>,
    pub bound_runtime_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ─── State projection ─────────────────────────────────────────────

/// Reason codes written by the reconciler.
pub const REASON_STALE_SIGNAL: &str = "stale_signal";
pub const REASON_TARGET_UNREACHABLE: &str = "target_unreachable";
pub const REASON_DEMOTED_COMPLETED: &str = "demoted_completed";

/// Authoritative latest state per (target, pane).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRow {
    pub target_id: String,
    pub pane_id: String,
    pub state: ActivityState,
    pub reason_code: String,
    pub confidence: Confidence,
    /// Monotone; stale writes (lower version) are rejected by the store.
    pub state_version: i64,
    pub runtime_id: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StateRow {
    pub fn key(&self) -> PaneKey {
        PaneKey::new(self.target_id.clone(), self.pane_id.clone())
    }
}

// ─── Adapter registry records ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    pub event_driven: bool,
    pub polling_required: bool,
    pub supports_waiting_approval: bool,
    pub supports_waiting_input: bool,
    pub supports_completed: bool,
}

/// Registry row for a per-agent-type adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterRecord {
    pub name: String,
    pub agent_type: AgentType,
    /// Major-version-compatible contract string, e.g. "1.2".
    pub contract_version: String,
    pub capabilities: AdapterCapabilities,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_serde_roundtrip() {
        for a in AgentType::ALL {
            let json = serde_json::to_string(&a).expect("serialize");
            let back: AgentType = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(a, back);
        }
    }

    #[test]
    fn agent_type_display_and_parse() {
        for a in AgentType::ALL {
            let parsed = a.to_string().parse::<AgentType>().expect("parse");
            assert_eq!(a, parsed);
        }
    }

    #[test]
    fn agent_type_is_agent() {
        assert!(AgentType::Codex.is_agent());
        assert!(AgentType::Claude.is_agent());
        assert!(AgentType::Gemini.is_agent());
        assert!(!AgentType::None.is_agent());
        assert!(!AgentType::Unknown.is_agent());
    }

    #[test]
    fn activity_state_precedence_order() {
        let prec = ActivityState::PRECEDENCE_DESC;
        assert_eq!(prec[0], ActivityState::Error);
        assert_eq!(prec[1], ActivityState::WaitingApproval);
        assert_eq!(prec[2], ActivityState::WaitingInput);
        assert_eq!(prec[3], ActivityState::Running);
        assert_eq!(prec[4], ActivityState::Completed);
        assert_eq!(prec[5], ActivityState::Idle);
        assert_eq!(prec[6], ActivityState::Unknown);

        // Numeric ranks must agree with the declared order.
        for pair in prec.windows(2) {
            assert!(pair[0].precedence() > pair[1].precedence());
        }
    }

    #[test]
    fn activity_state_serde_names_are_snake_case() {
        let json = serde_json::to_string(&ActivityState::WaitingApproval).expect("serialize");
        assert_eq!(json, r#""waiting_approval""#);
        let json = serde_json::to_string(&ActivityState::WaitingInput).expect("serialize");
        assert_eq!(json, r#""waiting_input""#);
    }

    #[test]
    fn activity_state_parse_roundtrip() {
        for s in ActivityState::PRECEDENCE_DESC {
            let parsed = s.as_str().parse::<ActivityState>().expect("parse");
            assert_eq!(s, parsed);
        }
    }

    #[test]
    fn confidence_ordering_and_factor() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
        assert!(Confidence::Low.factor() < Confidence::Medium.factor());
        assert!(Confidence::Medium.factor() < Confidence::High.factor());
    }

    #[test]
    fn target_health_default_is_ok() {
        assert_eq!(TargetHealth::default(), TargetHealth::Ok);
        assert_eq!(TargetHealth::Down.as_str(), "down");
    }

    #[test]
    fn event_source_parse() {
        assert_eq!("hook".parse::<EventSource>().expect("parse"), EventSource::Hook);
        assert!("webhook".parse::<EventSource>().is_err());
    }

    #[test]
    fn pane_key_display() {
        let key = PaneKey::new("local", "%3");
        assert_eq!(key.to_string(), "local/%3");
    }

    #[test]
    fn event_envelope_serde_roundtrip() {
        let event = EventEnvelope {
            event_id: "evt-001".into(),
            event_type: "task-started".into(),
            source: EventSource::Hook,
            dedupe_key: "hook:evt-001".into(),
            event_time: Utc::now(),
            ingested_at: Utc::now(),
            runtime_id: None,
            target_id: "local".into(),
            pane_id: "%1".into(),
            pid: Some(4242),
            start_hint: Some(Utc::now()),
            raw_payload: r#"{"status":"running"}"#.into(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: EventEnvelope = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, back);
    }

    #[test]
    fn inbox_status_names() {
        assert_eq!(InboxStatus::PendingBind.as_str(), "pending_bind");
        assert_eq!(InboxStatus::DroppedUnbound.as_str(), "dropped_unbound");
        assert_eq!(InboxDropReason::BindTtlExpired.as_str(), "bind_ttl_expired");
    }

    #[test]
    fn runtime_is_active() {
        let runtime = Runtime {
            runtime_id: "r1".into(),
            target_id: "local".into(),
            pane_id: "%0".into(),
            pane_epoch: 0,
            agent_type: AgentType::Codex,
            boot_id: "boot-1".into(),
            pid: Some(100),
            started_at: Utc::now(),
            ended_at: None,
        };
        assert!(runtime.is_active());
        let ended = Runtime {
            ended_at: Some(Utc::now()),
            ..runtime
        };
        assert!(!ended.is_active());
    }
}
