//! The typed store contract the engine depends on.

use chrono::{DateTime, Utc};

use panewatch_core::types::{
    AdapterRecord, EventEnvelope, InboxDropReason, InboxRow, InboxStatus, Pane, Runtime, StateRow,
    Target, TargetHealth,
};

use crate::error::StoreError;

/// Result of a target-scoped pane sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub upserted: usize,
    /// Pane ids removed because they vanished from the target.
    pub removed: Vec<String>,
}

/// Result of a retention purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub payloads_scrubbed: usize,
    pub events_deleted: usize,
    pub inbox_deleted: usize,
}

/// Typed storage operations. All implementations must be safe to call from
/// multiple tasks; mutations for a given (target, pane) are serialized.
pub trait Store: Send + Sync {
    // ── Targets ──────────────────────────────────────────────────
    fn list_targets(&self) -> Result<Vec<Target>, StoreError>;
    fn upsert_target(&self, target: &Target) -> Result<(), StoreError>;
    fn set_target_health(
        &self,
        target_id: &str,
        health: TargetHealth,
        last_seen_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // ── Panes ────────────────────────────────────────────────────
    fn list_panes(&self) -> Result<Vec<Pane>, StoreError>;
    fn list_panes_by_target(&self, target_id: &str) -> Result<Vec<Pane>, StoreError>;
    fn upsert_pane(&self, pane: &Pane) -> Result<(), StoreError>;
    /// Upsert `panes` and delete this target's panes that are absent from
    /// the list. Panes of other targets are never touched.
    fn sync_target_panes(
        &self,
        target_id: &str,
        panes: &[Pane],
    ) -> Result<SyncOutcome, StoreError>;

    // ── Runtimes ─────────────────────────────────────────────────
    fn next_pane_epoch(&self, target_id: &str, pane_id: &str) -> Result<i64, StoreError>;
    /// Unique on runtime id; a collision is `duplicate`.
    fn insert_runtime(&self, runtime: &Runtime) -> Result<(), StoreError>;
    fn end_runtime(&self, runtime_id: &str, ended_at: DateTime<Utc>) -> Result<(), StoreError>;
    fn list_active_runtimes(
        &self,
        target_id: &str,
        pane_id: &str,
    ) -> Result<Vec<Runtime>, StoreError>;

    // ── Events ───────────────────────────────────────────────────
    /// Insert an event row, returning its ingest sequence. Unique on
    /// dedupe key; a collision is `idempotency_conflict`.
    fn insert_event(&self, event: &EventEnvelope) -> Result<i64, StoreError>;
    /// `(event_time, ingest_seq)` of the last accepted event for a runtime.
    fn last_event_for_runtime(
        &self,
        runtime_id: &str,
    ) -> Result<Option<(DateTime<Utc>, i64)>, StoreError>;
    /// Scrub payloads older than `payload_cutoff`, delete events older
    /// than `metadata_cutoff`, and drop terminal inbox rows past the
    /// metadata cutoff.
    fn purge_events(
        &self,
        payload_cutoff: DateTime<Utc>,
        metadata_cutoff: DateTime<Utc>,
    ) -> Result<PurgeStats, StoreError>;

    // ── Event inbox ──────────────────────────────────────────────
    /// Park a runtime-less event as pending-bind. Unique on dedupe key.
    fn insert_pending(&self, event: &EventEnvelope) -> Result<i64, StoreError>;
    fn list_pending(&self) -> Result<Vec<InboxRow>, StoreError>;
    fn update_binding(
        &self,
        inbox_id: i64,
        runtime_id: Option<&str>,
        status: InboxStatus,
        reason: Option<InboxDropReason>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // ── State ────────────────────────────────────────────────────
    fn get_state(&self, target_id: &str, pane_id: &str) -> Result<Option<StateRow>, StoreError>;
    fn list_states(&self) -> Result<Vec<StateRow>, StoreError>;
    /// Compare-and-set on `state_version`: writes carrying a lower version
    /// than stored are rejected.
    fn upsert_state(&self, row: &StateRow) -> Result<(), StoreError>;

    // ── Adapters ─────────────────────────────────────────────────
    fn list_adapters(&self) -> Result<Vec<AdapterRecord>, StoreError>;
    /// Upsert preserving a previously persisted `enabled` flag.
    fn upsert_adapter(&self, record: &AdapterRecord) -> Result<(), StoreError>;
    fn get_adapter(&self, name: &str) -> Result<Option<AdapterRecord>, StoreError>;
    /// Admin toggle; the only path that flips `enabled`.
    fn set_adapter_enabled(&self, name: &str, enabled: bool) -> Result<(), StoreError>;
}
