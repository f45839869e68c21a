//! Pending-bind inbox resolver.
//!
//! Events that arrive identified only by target+pane (plus optional pid
//! and start-hint) are parked in the inbox. Each tick, the resolver tries
//! to bind every pending row to exactly one active runtime; ambiguous or
//! hopeless rows are dropped with a reason, and rows past the TTL expire.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use panewatch_core::config::Config;
use panewatch_core::types::{InboxDropReason, InboxRow, InboxStatus, Runtime};
use panewatch_store::ops::Store;

use crate::error::EngineError;
use crate::ingest::{IngestEngine, IngestOutcome};

/// Tick counters, surfaced for logs and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub bound: usize,
    pub dropped_ttl: usize,
    pub dropped_no_candidate: usize,
    pub dropped_ambiguous: usize,
}

pub struct InboxResolver {
    store: Arc<dyn Store>,
    ingest: Arc<IngestEngine>,
    pending_bind_ttl: TimeDelta,
    bind_window: TimeDelta,
}

impl InboxResolver {
    pub fn new(store: Arc<dyn Store>, ingest: Arc<IngestEngine>, config: &Config) -> Self {
        Self {
            store,
            ingest,
            pending_bind_ttl: TimeDelta::milliseconds(config.pending_bind_ttl_ms as i64),
            bind_window: TimeDelta::milliseconds(config.bind_window_ms as i64),
        }
    }

    /// Resolve every pending inbox row once.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<ResolveStats, EngineError> {
        let mut stats = ResolveStats::default();

        for row in self.store.list_pending()? {
            match self.resolve_row(&row, now).await {
                Ok(resolution) => match resolution {
                    Resolution::Bound => stats.bound += 1,
                    Resolution::Dropped(InboxDropReason::BindTtlExpired) => stats.dropped_ttl += 1,
                    Resolution::Dropped(InboxDropReason::BindNoCandidate) => {
                        stats.dropped_no_candidate += 1;
                    }
                    Resolution::Dropped(InboxDropReason::BindAmbiguous) => {
                        stats.dropped_ambiguous += 1;
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        inbox_id = row.inbox_id,
                        %error,
                        "inbox resolution failed; will retry next tick"
                    );
                }
            }
        }

        Ok(stats)
    }

    async fn resolve_row(
        &self,
        row: &InboxRow,
        now: DateTime<Utc>,
    ) -> Result<Resolution, EngineError> {
        // TTL first: a row nobody could bind in time is dropped.
        if now.signed_duration_since(row.event.ingested_at) > self.pending_bind_ttl {
            self.drop_row(row, InboxDropReason::BindTtlExpired, now)?;
            return Ok(Resolution::Dropped(InboxDropReason::BindTtlExpired));
        }

        let actives = self
            .store
            .list_active_runtimes(&row.event.target_id, &row.event.pane_id)?;
        let candidates: Vec<&Runtime> = actives
            .iter()
            .filter(|candidate| self.matches(candidate, row))
            .collect();

        match candidates.as_slice() {
            [] => {
                self.drop_row(row, InboxDropReason::BindNoCandidate, now)?;
                Ok(Resolution::Dropped(InboxDropReason::BindNoCandidate))
            }
            [only] => {
                let runtime_id = only.runtime_id.clone();
                let mut bound_event = row.event.clone();
                bound_event.runtime_id = Some(runtime_id.clone());

                // Downstream out-of-order or duplicate results are benign;
                // the row still counts as bound.
                let outcome = self.ingest.ingest(bound_event).await?;
                if matches!(outcome, IngestOutcome::Parked { .. }) {
                    // Cannot happen with a runtime id set; guard anyway.
                    return Ok(Resolution::Dropped(InboxDropReason::BindNoCandidate));
                }

                self.store.update_binding(
                    row.inbox_id,
                    Some(&runtime_id),
                    InboxStatus::Bound,
                    None,
                    now,
                )?;
                Ok(Resolution::Bound)
            }
            _ => {
                self.drop_row(row, InboxDropReason::BindAmbiguous, now)?;
                Ok(Resolution::Dropped(InboxDropReason::BindAmbiguous))
            }
        }
    }

    fn matches(&self, candidate: &Runtime, row: &InboxRow) -> bool {
        if let Some(pid) = row.event.pid
            && candidate.pid != Some(pid)
        {
            return false;
        }
        if let Some(start_hint) = row.event.start_hint {
            let skew = candidate
                .started_at
                .signed_duration_since(start_hint)
                .abs();
            if skew > self.bind_window {
                return false;
            }
        }
        true
    }

    fn drop_row(
        &self,
        row: &InboxRow,
        reason: InboxDropReason,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.store.update_binding(
            row.inbox_id,
            None,
            InboxStatus::DroppedUnbound,
            Some(reason),
            now,
        )?;
        Ok(())
    }
}

enum Resolution {
    Bound,
    Dropped(InboxDropReason),
}

// ─── Tests ────────────────────────────────────────────────────────
