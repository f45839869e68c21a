//! panewatch-core: pure domain library for the panewatch daemon.
//!
//! Types, configuration, and the side-effect-free state machines that the
//! engine composes: target health, runtime identity, capture activity
//! heuristics, the pane stabilizer, and evidence scoring. No IO, no async.

pub mod activity;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod scoring;
pub mod stability;
pub mod types;

pub use activity::{ActivityHint, ActivityInference, fnv1a64, infer_activity};
pub use config::{Config, TargetSeed};
pub use error::CoreError;
pub use health::{ExecOutcome, HealthPolicy, TargetHealthState, transition_target_health};
pub use identity::{epoch_rotation_due, runtime_id, validate_runtime_freshness};
pub use scoring::{Evidence, claude_poller_demotion, select_winner, source_weight};
pub use stability::PaneStabilizer;
pub use types::{
    ActivityState, AdapterCapabilities, AdapterRecord, AgentType, Confidence, EventEnvelope,
    EventSource, InboxDropReason, InboxRow, InboxStatus, Pane, PaneKey, Runtime, StateRow, Target,
    TargetHealth, TargetKind,
};
