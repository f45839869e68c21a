//! Event ingest engine.
//!
//! Accepts events from every source, deduplicates them by dedupe key,
//! validates runtime freshness, enforces per-runtime ordering, persists
//! the envelope, and projects the authoritative per-pane state.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use panewatch_adapters::{AdapterRegistry, Normalized, Signal};
use panewatch_core::activity::ActivityHint;
use panewatch_core::config::Config;
use panewatch_core::error::CoreError;
use panewatch_core::identity::validate_runtime_freshness;
use panewatch_core::scoring::{Evidence, claude_poller_demotion, select_winner, source_weight};
use panewatch_core::types::{
    ActivityState, AgentType, Confidence, EventEnvelope, EventSource, StateRow,
};
use panewatch_store::error::StoreError;
use panewatch_store::ops::{PurgeStats, Store};

use crate::error::EngineError;

/// Weight granted to the currently projected state when it competes with
/// incoming evidence.
const STANDING_WEIGHT: f64 = 1.0;

/// Result of one ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event accepted and the pane state transitioned.
    Projected(StateRow),
    /// Event accepted; the existing state absorbed it without transition.
    Accepted,
    /// Event had no runtime id and was parked in the inbox.
    Parked { inbox_id: i64 },
    /// Dedupe key already ingested. Benign.
    IdempotencyConflict,
    /// Event is older than the last accepted one for its runtime. Soft.
    OutOfOrder,
    /// Event addressed an outdated runtime and was dropped.
    RuntimeStale,
}

pub struct IngestEngine {
    store: Arc<dyn Store>,
    registry: Arc<AdapterRegistry>,
    config: Config,
    /// Serializes the read-check-write ingest path per process; together
    /// with the store transactions this keeps (target, pane) single-writer.
    write_lock: tokio::sync::Mutex<()>,
}

impl IngestEngine {
    pub fn new(store: Arc<dyn Store>, registry: Arc<AdapterRegistry>, config: Config) -> Self {
        Self {
            store,
            registry,
            config,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Ingest one event; see the module docs for the acceptance rules.
    pub async fn ingest(&self, event: EventEnvelope) -> Result<IngestOutcome, EngineError> {
        let _guard = self.write_lock.lock().await;
        self.ingest_locked(event)
    }

    fn ingest_locked(&self, event: EventEnvelope) -> Result<IngestOutcome, EngineError> {
        // ── Pending bind ─────────────────────────────────────────
        if event.runtime_id.is_none() {
            if event.target_id.is_empty() || event.pane_id.is_empty() {
                return Err(CoreError::InvalidEvent(
                    "event carries neither runtime id nor target+pane".into(),
                )
                .into());
            }
            return match self.store.insert_pending(&event) {
                Ok(inbox_id) => Ok(IngestOutcome::Parked { inbox_id }),
                Err(StoreError::IdempotencyConflict(_)) => Ok(IngestOutcome::IdempotencyConflict),
                Err(error) => Err(error.into()),
            };
        }

        // ── Runtime freshness ────────────────────────────────────
        let runtime_id = event.runtime_id.clone().unwrap_or_default();
        let actives = self
            .store
            .list_active_runtimes(&event.target_id, &event.pane_id)?;
        let current = actives.first();
        let current_id = current.map(|r| r.runtime_id.as_str()).unwrap_or("");
        if validate_runtime_freshness(&runtime_id, current_id).is_err() {
            tracing::debug!(
                runtime_id,
                current_id,
                dedupe_key = %event.dedupe_key,
                "dropping event for stale runtime"
            );
            return Ok(IngestOutcome::RuntimeStale);
        }
        let agent_type = current.map(|r| r.agent_type).unwrap_or_default();

        // ── Per-runtime ordering ─────────────────────────────────
        if let Some((last_time, _seq)) = self.store.last_event_for_runtime(&runtime_id)?
            && event.event_time < last_time
        {
            return Ok(IngestOutcome::OutOfOrder);
        }

        // ── Persist ──────────────────────────────────────────────
        match self.store.insert_event(&event) {
            Ok(_seq) => {}
            Err(StoreError::IdempotencyConflict(_)) => {
                return Ok(IngestOutcome::IdempotencyConflict);
            }
            Err(error) => return Err(error.into()),
        }

        // ── Project ──────────────────────────────────────────────
        self.project(&event, agent_type)
    }

    fn project(
        &self,
        event: &EventEnvelope,
        agent_type: AgentType,
    ) -> Result<IngestOutcome, EngineError> {
        let existing = self.store.get_state(&event.target_id, &event.pane_id)?;
        let now = event.ingested_at;

        let Some(incoming) = self.incoming_evidence(event, agent_type) else {
            // Event type mapped to nothing; keep the envelope, touch the row.
            if let Some(row) = existing {
                self.touch(&row, event)?;
            }
            return Ok(IngestOutcome::Accepted);
        };

        // The standing state competes only against weaker poller readings.
        // Deterministic sources (hook, notify, wrapper) speak for the agent
        // itself and transition immediately; a pane must never linger in a
        // hook-confirmed state once the agent has moved on.
        let mut candidates = Vec::with_capacity(2);
        if let Some(row) = &existing
            && event.source == EventSource::Poller
            && row.confidence > incoming.confidence
        {
            candidates.push(Evidence {
                state: row.state,
                weight: STANDING_WEIGHT,
                confidence: row.confidence,
                ttl: TimeDelta::seconds(self.config.stale_signal_ttl_secs as i64),
                reason: row.reason_code.clone(),
                event_time: row.updated_at,
            });
        }
        candidates.push(incoming.clone());

        // When every candidate has expired, the incoming reading is still
        // the best information available.
        let incoming_wins = match select_winner(&candidates, now) {
            Some(winner) => {
                winner.state == incoming.state
                    && winner.reason == incoming.reason
                    && winner.event_time == incoming.event_time
            }
            None => true,
        };

        match existing {
            Some(row) if !incoming_wins => {
                // The standing state absorbed the event.
                self.touch(&row, event)?;
                Ok(IngestOutcome::Accepted)
            }
            Some(row)
                if row.state == incoming.state && row.reason_code == incoming.reason =>
            {
                // Same state re-affirmed: no transition, no version bump.
                self.touch(&row, event)?;
                Ok(IngestOutcome::Accepted)
            }
            Some(row) => {
                let next = StateRow {
                    state: incoming.state,
                    reason_code: incoming.reason.clone(),
                    confidence: incoming.confidence,
                    state_version: row.state_version + 1,
                    runtime_id: event.runtime_id.clone(),
                    last_seen_at: event.event_time,
                    updated_at: now,
                    ..row
                };
                self.store.upsert_state(&next)?;
                Ok(IngestOutcome::Projected(next))
            }
            None => {
                let next = StateRow {
                    target_id: event.target_id.clone(),
                    pane_id: event.pane_id.clone(),
                    state: incoming.state,
                    reason_code: incoming.reason.clone(),
                    confidence: incoming.confidence,
                    state_version: 1,
                    runtime_id: event.runtime_id.clone(),
                    last_seen_at: event.event_time,
                    updated_at: now,
                };
                self.store.upsert_state(&next)?;
                Ok(IngestOutcome::Projected(next))
            }
        }
    }

    /// Turn an event into evidence: adapter normalization first, then the
    /// direct poller event-type vocabulary.
    fn incoming_evidence(&self, event: &EventEnvelope, agent_type: AgentType) -> Option<Evidence> {
        let ttl = TimeDelta::seconds(self.config.stale_signal_ttl_secs as i64);

        let signal = Signal::new(&event.event_type, event.source, &event.raw_payload);
        if let Some(Normalized {
            state,
            reason,
            confidence,
        }) = self.registry.normalize(agent_type, &signal)
        {
            return Some(
                Evidence::new(
                    state,
                    source_weight(event.source),
                    confidence,
                    reason,
                    event.event_time,
                )
                .with_ttl(ttl),
            );
        }

        let hint = ActivityHint::from_event_type(&event.event_type)?;
        let (mut state, mut reason, mut confidence) = hint.to_state();

        // Claude-specific de-dup: a poller "running" that was promoted
        // without a running token in the capture reads as idle instead.
        if claude_poller_demotion(
            agent_type,
            event.source,
            state,
            raw_capture_hint(event) == Some(ActivityHint::Running),
        ) {
            state = ActivityState::Idle;
            reason = "poller_running_unconfirmed";
            confidence = Confidence::Low;
        }

        Some(
            Evidence::new(
                state,
                source_weight(event.source),
                confidence,
                reason,
                event.event_time,
            )
            .with_ttl(ttl),
        )
    }

    /// Refresh liveness fields without a state transition.
    fn touch(&self, row: &StateRow, event: &EventEnvelope) -> Result<(), EngineError> {
        let next = StateRow {
            last_seen_at: row.last_seen_at.max(event.event_time),
            ..row.clone()
        };
        self.store.upsert_state(&next)?;
        Ok(())
    }

    /// Ingest a synthetic reconciler event: the projection is an
    /// authoritative rewrite, bypassing freshness and scoring.
    pub async fn ingest_synthetic(
        &self,
        event: EventEnvelope,
        state: ActivityState,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, EngineError> {
        let _guard = self.write_lock.lock().await;

        match self.store.insert_event(&event) {
            Ok(_) => {}
            Err(StoreError::IdempotencyConflict(_)) => {
                return Ok(IngestOutcome::IdempotencyConflict);
            }
            Err(error) => return Err(error.into()),
        }

        let existing = self.store.get_state(&event.target_id, &event.pane_id)?;
        let next = match existing {
            Some(row) => StateRow {
                state,
                reason_code: reason.to_string(),
                confidence: Confidence::Low,
                state_version: row.state_version + 1,
                updated_at: now,
                ..row
            },
            None => StateRow {
                target_id: event.target_id.clone(),
                pane_id: event.pane_id.clone(),
                state,
                reason_code: reason.to_string(),
                confidence: Confidence::Low,
                state_version: 1,
                runtime_id: event.runtime_id.clone(),
                last_seen_at: now,
                updated_at: now,
            },
        };
        self.store.upsert_state(&next)?;
        Ok(IngestOutcome::Projected(next))
    }

    /// Retention: scrub payloads past the payload TTL, delete events past
    /// the metadata TTL.
    pub async fn purge(&self, now: DateTime<Utc>) -> Result<PurgeStats, EngineError> {
        let _guard = self.write_lock.lock().await;
        let payload_cutoff = now - TimeDelta::seconds(self.config.event_payload_ttl_secs as i64);
        let metadata_cutoff = now - TimeDelta::seconds(self.config.event_metadata_ttl_secs as i64);
        Ok(self.store.purge_events(payload_cutoff, metadata_cutoff)?)
    }
}

/// The poller embeds the pre-stabilizer hint under `"raw"` in its payload.
fn raw_capture_hint(event: &EventEnvelope) -> Option<ActivityHint> {
    if event.source != EventSource::Poller {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&event.raw_payload).ok()?;
    ActivityHint::from_event_type(value.get("raw")?.as_str()?)
}

// ─── Tests ────────────────────────────────────────────────────────
