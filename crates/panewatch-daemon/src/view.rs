//! Client-visible pane view: State x Pane x Runtime joined per pane.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use panewatch_core::types::{
    ActivityState, AgentType, Confidence, Pane, PaneKey, Runtime, StateRow,
};
use panewatch_store::ops::Store;
use panewatch_store::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneView {
    pub target_id: String,
    pub pane_id: String,
    pub session_name: String,
    pub window_name: String,
    pub title: String,
    pub current_cmd: String,
    pub agent_type: AgentType,
    pub state: ActivityState,
    pub reason_code: String,
    pub confidence: Confidence,
    pub state_version: i64,
    pub runtime_id: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PaneView {
    /// States that want a human's eyes.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.state,
            ActivityState::WaitingApproval | ActivityState::WaitingInput | ActivityState::Error
        )
    }
}

/// Join panes with their projected state and active runtime.
pub fn build_pane_views(store: &dyn Store) -> Result<Vec<PaneView>, StoreError> {
    let panes = store.list_panes()?;
    let states: HashMap<PaneKey, StateRow> = store
        .list_states()?
        .into_iter()
        .map(|row| (row.key(), row))
        .collect();

    let mut views = Vec::with_capacity(panes.len());
    for pane in panes {
        let key = pane.key();
        let runtime = active_runtime(store, &pane)?;
        views.push(join_one(&pane, states.get(&key), runtime.as_ref()));
    }
    Ok(views)
}

fn active_runtime(store: &dyn Store, pane: &Pane) -> Result<Option<Runtime>, StoreError> {
    Ok(store
        .list_active_runtimes(&pane.target_id, &pane.pane_id)?
        .into_iter()
        .next())
}

fn join_one(pane: &Pane, state: Option<&StateRow>, runtime: Option<&Runtime>) -> PaneView {
    PaneView {
        target_id: pane.target_id.clone(),
        pane_id: pane.pane_id.clone(),
        session_name: pane.session_name.clone(),
        window_name: pane.window_name.clone(),
        title: pane.title.clone(),
        current_cmd: pane.current_cmd.clone(),
        agent_type: runtime.map(|r| r.agent_type).unwrap_or_default(),
        state: state.map(|s| s.state).unwrap_or_default(),
        reason_code: state
            .map(|s| s.reason_code.clone())
            .unwrap_or_else(|| "unobserved".to_string()),
        confidence: state.map(|s| s.confidence).unwrap_or_default(),
        state_version: state.map(|s| s.state_version).unwrap_or(0),
        runtime_id: runtime.map(|r| r.runtime_id.clone()),
        last_seen_at: state.map(|s| s.last_seen_at),
        updated_at: state.map(|s| s.updated_at).unwrap_or(pane.updated_at),
    }
}

// ─── Tests ────────────────────────────────────────────────────────
