//! Reconciler: the system's backstop.
//!
//! Injects synthetic events so that projected state converges to safe
//! defaults when signals stop arriving: target down → unknown, completed
//! past its demotion age → idle, silent panes → unknown. Each synthetic
//! event's dedupe key embeds the state version, making every rewrite
//! idempotent per version.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use panewatch_core::config::Config;
use panewatch_core::types::{
    ActivityState, EventEnvelope, EventSource, REASON_DEMOTED_COMPLETED, REASON_STALE_SIGNAL,
    REASON_TARGET_UNREACHABLE, StateRow, TargetHealth,
};
use panewatch_store::ops::Store;

use crate::error::EngineError;
use crate::ingest::IngestEngine;

const RECONCILE_TARGET_HEALTH: &str = "reconcile_target_health_change";
const RECONCILE_DEMOTION_DUE: &str = "reconcile_demotion_due";
const RECONCILE_STALE_DETECTED: &str = "reconcile_stale_detected";

pub struct Reconciler {
    store: Arc<dyn Store>,
    ingest: Arc<IngestEngine>,
    stale_signal_ttl: TimeDelta,
    completed_demotion_after: TimeDelta,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, ingest: Arc<IngestEngine>, config: &Config) -> Self {
        Self {
            store,
            ingest,
            stale_signal_ttl: TimeDelta::seconds(config.stale_signal_ttl_secs as i64),
            completed_demotion_after: TimeDelta::seconds(
                config.completed_demotion_after_secs as i64,
            ),
        }
    }

    /// Sweep every state row once; returns the number of synthetic events
    /// emitted.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let health: HashMap<String, TargetHealth> = self
            .store
            .list_targets()?
            .into_iter()
            .map(|t| (t.target_id, t.health))
            .collect();

        let mut emitted = 0;
        for row in self.store.list_states()? {
            let target_down = health.get(&row.target_id) == Some(&TargetHealth::Down);

            let plan = if target_down {
                (row.state != ActivityState::Unknown || row.reason_code != REASON_TARGET_UNREACHABLE)
                    .then_some((
                        RECONCILE_TARGET_HEALTH,
                        ActivityState::Unknown,
                        REASON_TARGET_UNREACHABLE,
                    ))
            } else if row.state == ActivityState::Completed
                && now.signed_duration_since(row.updated_at) > self.completed_demotion_after
            {
                Some((
                    RECONCILE_DEMOTION_DUE,
                    ActivityState::Idle,
                    REASON_DEMOTED_COMPLETED,
                ))
            } else if now.signed_duration_since(row.last_seen_at) > self.stale_signal_ttl
                && (row.state != ActivityState::Unknown || row.reason_code != REASON_STALE_SIGNAL)
            {
                Some((
                    RECONCILE_STALE_DETECTED,
                    ActivityState::Unknown,
                    REASON_STALE_SIGNAL,
                ))
            } else {
                None
            };

            let Some((event_type, state, reason)) = plan else {
                continue;
            };

            let event = synthetic_event(&row, event_type, now);
            match self.ingest.ingest_synthetic(event, state, reason, now).await {
                Ok(_) => emitted += 1,
                Err(error) => {
                    tracing::warn!(
                        target_id = %row.target_id,
                        pane_id = %row.pane_id,
                        %error,
                        "reconcile event failed; will retry next tick"
                    );
                }
            }
        }

        Ok(emitted)
    }
}

fn synthetic_event(row: &StateRow, event_type: &str, now: DateTime<Utc>) -> EventEnvelope {
    let runtime = row.runtime_id.as_deref().unwrap_or("");
    let dedupe_key = format!(
        "reconcile:{event_type}:{runtime}:{pane}:state-v{version}",
        pane = row.pane_id,
        version = row.state_version,
    );
    EventEnvelope {
        event_id: dedupe_key.clone(),
        event_type: event_type.to_string(),
        source: EventSource::Poller,
        dedupe_key,
        event_time: now,
        ingested_at: now,
        runtime_id: row.runtime_id.clone(),
        target_id: row.target_id.clone(),
        pane_id: row.pane_id.clone(),
        pid: None,
        start_hint: None,
        raw_payload: String::new(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────
