//! Topology observer: enumerates panes per target, classifies agents,
//! stabilizes activity, reconciles runtimes, and emits poller events.
//!
//! Targets are observed sequentially within a tick so per-target state
//! machines stay single-writer. A failing target never halts the others;
//! its failures flow into the health FSM and the reconciler converges its
//! panes to safe defaults.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use panewatch_core::activity::infer_activity;
use panewatch_core::config::Config;
use panewatch_core::error::CoreError;
use panewatch_core::health::{
    ExecOutcome, HealthPolicy, TargetHealthState, transition_target_health,
};
use panewatch_core::identity::{epoch_rotation_due, runtime_id};
use panewatch_core::stability::PaneStabilizer;
use panewatch_core::types::{AgentType, EventEnvelope, EventSource, Pane, PaneKey, Runtime, Target};
use panewatch_store::error::StoreError;
use panewatch_store::ops::Store;
use panewatch_tmux::capture::capture_pane;
use panewatch_tmux::classify::classify_agent;
use panewatch_tmux::executor::{CommandSpawner, TargetExecutor};
use panewatch_tmux::pane_info::list_panes;

use crate::error::EngineError;
use crate::ingest::{IngestEngine, IngestOutcome};

pub struct TopologyObserver<S> {
    store: Arc<dyn Store>,
    ingest: Arc<IngestEngine>,
    executor: Arc<TargetExecutor<S>>,
    stabilizer: PaneStabilizer,
    health_policy: HealthPolicy,
    /// Per-target health cache, owned by this loop.
    health: HashMap<String, TargetHealthState>,
}

impl<S: CommandSpawner> TopologyObserver<S> {
    pub fn new(
        store: Arc<dyn Store>,
        ingest: Arc<IngestEngine>,
        executor: Arc<TargetExecutor<S>>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            ingest,
            executor,
            stabilizer: PaneStabilizer::new(config.poll_interval_secs()),
            health_policy: HealthPolicy::from_config(config),
            health: HashMap::new(),
        }
    }

    /// One topology pass over every known target.
    pub async fn tick(
        &mut self,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let targets = self.store.list_targets()?;
        for target in targets {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(error) = self.observe_target(&target, cancel, now).await {
                tracing::warn!(
                    target_id = %target.target_id,
                    %error,
                    "target observation failed"
                );
            }
        }
        self.stabilizer.sweep(now);
        Ok(())
    }

    async fn observe_target(
        &mut self,
        target: &Target,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        // Boot identity anchors runtime ids across tmux server restarts.
        let boot_argv: Vec<String> = ["tmux", "display-message", "-p", "#{pid}-#{start_time}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let boot_id = match self.executor.run(target, &boot_argv, cancel).await {
            Ok(output) => output.output_text.trim().to_string(),
            Err(error) => {
                self.record_health(&target.target_id, ExecOutcome::Failure, now)?;
                return Err(error.into());
            }
        };

        let rows = match list_panes(self.executor.as_ref(), target, cancel).await {
            Ok(rows) => rows,
            Err(error) => {
                self.record_health(&target.target_id, ExecOutcome::Failure, now)?;
                return Err(error.into());
            }
        };
        self.record_health(&target.target_id, ExecOutcome::Success, now)?;

        let panes: Vec<Pane> = rows
            .into_iter()
            .map(|row| row.into_pane(&target.target_id, now))
            .collect();
        let outcome = self.store.sync_target_panes(&target.target_id, &panes)?;
        if !outcome.removed.is_empty() {
            tracing::debug!(
                target_id = %target.target_id,
                removed = outcome.removed.len(),
                "panes vanished from target"
            );
        }

        for pane in &panes {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(error) = self.observe_pane(target, pane, &boot_id, cancel, now).await {
                tracing::warn!(
                    target_id = %target.target_id,
                    pane_id = %pane.pane_id,
                    %error,
                    "pane observation failed"
                );
            }
        }

        Ok(())
    }

    async fn observe_pane(
        &mut self,
        target: &Target,
        pane: &Pane,
        boot_id: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let agent = classify_agent(
            self.executor.as_ref(),
            target,
            &pane.current_cmd,
            &pane.tty,
            cancel,
        )
        .await;

        // Capture only agent panes; a failed capture degrades to unknown.
        let lines = if agent.is_agent() {
            match capture_pane(self.executor.as_ref(), target, &pane.pane_id, cancel).await {
                Ok(lines) => lines,
                Err(error) => {
                    tracing::debug!(pane_id = %pane.pane_id, %error, "capture failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let inference = infer_activity(agent, &lines);
        let key = PaneKey::new(target.target_id.clone(), pane.pane_id.clone());
        let stabilized = self.stabilizer.observe(&key, &inference, now);

        let runtime = self.reconcile_runtime(target, pane, agent, boot_id, now)?;

        let payload = serde_json::json!({
            "raw": inference.hint.as_event_type(),
            "signature": inference.signature,
        })
        .to_string();
        let event = EventEnvelope {
            event_id: format!(
                "poller:{}:{}:{}",
                target.target_id,
                pane.pane_id,
                now.timestamp_millis()
            ),
            event_type: stabilized.as_event_type().to_string(),
            source: EventSource::Poller,
            dedupe_key: format!(
                "poller:{}:{}:{}",
                target.target_id,
                pane.pane_id,
                now.timestamp_millis()
            ),
            event_time: now,
            ingested_at: now,
            runtime_id: Some(runtime.runtime_id.clone()),
            target_id: target.target_id.clone(),
            pane_id: pane.pane_id.clone(),
            pid: pane.current_pid,
            start_hint: None,
            raw_payload: payload,
        };

        match self.ingest.ingest(event).await? {
            IngestOutcome::Projected(_) | IngestOutcome::Accepted => {}
            other => {
                tracing::debug!(
                    pane_id = %pane.pane_id,
                    outcome = ?other,
                    "poller event not projected"
                );
            }
        }
        Ok(())
    }

    /// Active-runtime reconciliation (see runtime identity rules): keep at
    /// most one active runtime per pane, reuse it while its identity
    /// holds, rotate the epoch otherwise.
    fn reconcile_runtime(
        &self,
        target: &Target,
        pane: &Pane,
        agent: AgentType,
        boot_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Runtime, EngineError> {
        let mut actives = self
            .store
            .list_active_runtimes(&target.target_id, &pane.pane_id)?;

        // More than one active runtime violates the invariant; keep the
        // newest and terminate the rest.
        for extra in actives.iter().skip(1) {
            self.store.end_runtime(&extra.runtime_id, now)?;
        }
        actives.truncate(1);

        if let Some(current) = actives.into_iter().next() {
            if current.agent_type == agent
                && !epoch_rotation_due(&current, pane.current_pid, boot_id)
            {
                return Ok(current);
            }
            self.store.end_runtime(&current.runtime_id, now)?;
        }

        let pane_epoch = self
            .store
            .next_pane_epoch(&target.target_id, &pane.pane_id)?;
        let runtime = Runtime {
            runtime_id: runtime_id(
                &target.target_id,
                boot_id,
                &pane.pane_id,
                pane_epoch,
                agent,
                now,
            ),
            target_id: target.target_id.clone(),
            pane_id: pane.pane_id.clone(),
            pane_epoch,
            agent_type: agent,
            boot_id: boot_id.to_string(),
            pid: pane.current_pid,
            started_at: now,
            ended_at: None,
        };

        match self.store.insert_runtime(&runtime) {
            Ok(()) => Ok(runtime),
            Err(StoreError::Duplicate(_)) => {
                // Lost a race to another opener: recover by re-reading.
                self.store
                    .list_active_runtimes(&target.target_id, &pane.pane_id)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        CoreError::NotFound(format!(
                            "active runtime for {}/{}",
                            target.target_id, pane.pane_id
                        ))
                        .into()
                    })
            }
            Err(error) => Err(error.into()),
        }
    }

    fn record_health(
        &mut self,
        target_id: &str,
        outcome: ExecOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let prev = self
            .health
            .entry(target_id.to_string())
            .or_insert_with(|| TargetHealthState::ok(now));
        let next = transition_target_health(prev, outcome, &self.health_policy, now);
        let changed = next.health != prev.health;
        *prev = next.clone();

        let last_seen = (outcome == ExecOutcome::Success).then_some(now);
        if changed || last_seen.is_some() {
            self.store
                .set_target_health(target_id, next.health, last_seen, now)?;
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────
